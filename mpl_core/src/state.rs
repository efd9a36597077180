//! The per-cell search record and its arena handle.

use crate::heap::Handle as HeapHandle;
use crate::key::Key;

/// An arena slot reference. Stable for as long as the node remains
/// reachable from the state map — pruning (see
/// [`crate::state_space::StateSpace::get_sub_state_space`]) is the only
/// thing that invalidates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub(crate) usize);

/// One lattice cell's worth of LPA*/A* bookkeeping: its relaxation
/// state (`g`, `rhs`), its heuristic, its place in the open set, and its
/// edges to neighbouring cells.
///
/// `pred_*` and `succ_*` are kept as parallel vectors rather than a
/// single vector of structs — edge arrays are rebuilt wholesale on every
/// expansion (`reset_successors`) and scanned linearly for the common
/// case of a handful of successors per cell, so the cache-friendliness
/// of flat arrays outweighs reaching for a tiny edge struct.
#[derive(Debug, Clone)]
pub struct StateNode<W> {
    pub hashkey: Key,
    pub coord: W,
    pub t: f64,
    pub g: f64,
    pub rhs: f64,
    pub h: f64,
    pub iteration_opened: bool,
    pub iteration_closed: bool,
    pub(crate) heap_handle: Option<HeapHandle>,

    pub pred_hashkey: Vec<Key>,
    pub pred_action_id: Vec<usize>,
    pub pred_action_cost: Vec<f64>,

    pub succ_hashkey: Vec<Key>,
    pub succ_action_cost: Vec<f64>,
}

impl<W> StateNode<W> {
    pub fn new(hashkey: Key, coord: W) -> Self {
        StateNode {
            hashkey,
            coord,
            t: 0.0,
            g: f64::INFINITY,
            rhs: f64::INFINITY,
            h: 0.0,
            iteration_opened: false,
            iteration_closed: false,
            heap_handle: None,
            pred_hashkey: Vec::new(),
            pred_action_id: Vec::new(),
            pred_action_cost: Vec::new(),
            succ_hashkey: Vec::new(),
            succ_action_cost: Vec::new(),
        }
    }

    pub fn is_locally_consistent(&self) -> bool {
        self.g == self.rhs
    }

    /// Appends a predecessor edge, or overwrites it in place if one from
    /// the same parent already exists (re-expanding a node the open set
    /// revisits shouldn't grow this array without bound).
    pub fn upsert_predecessor(&mut self, parent_key: Key, action_id: usize, cost: f64) {
        match self.pred_hashkey.iter().position(|&k| k == parent_key) {
            Some(i) => {
                self.pred_action_id[i] = action_id;
                self.pred_action_cost[i] = cost;
            }
            None => {
                self.pred_hashkey.push(parent_key);
                self.pred_action_id.push(action_id);
                self.pred_action_cost.push(cost);
            }
        }
    }

    /// Resets every successor slot to the empty sentinel. Called before
    /// each expansion so that slots `get_succ` doesn't refill this round
    /// don't carry over a stale edge from a previous expansion.
    pub fn reset_successors(&mut self, num_actions: usize) {
        self.succ_hashkey = vec![Key::EMPTY; num_actions];
        self.succ_action_cost = vec![f64::INFINITY; num_actions];
    }

    pub fn set_successor(&mut self, action_id: usize, key: Key, cost: f64) {
        self.succ_hashkey[action_id] = key;
        self.succ_action_cost[action_id] = cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_node_is_at_infinite_cost() {
        let n = StateNode::new(Key::new(1), 42u32);
        assert!(!n.is_locally_consistent());
        assert_eq!(n.g, f64::INFINITY);
        assert_eq!(n.rhs, f64::INFINITY);
    }

    #[test]
    fn upsert_predecessor_overwrites_existing_parent() {
        let mut n = StateNode::new(Key::new(1), 0u32);
        n.upsert_predecessor(Key::new(2), 0, 5.0);
        n.upsert_predecessor(Key::new(3), 1, 7.0);
        n.upsert_predecessor(Key::new(2), 0, 3.0);
        assert_eq!(n.pred_hashkey.len(), 2);
        let i = n.pred_hashkey.iter().position(|&k| k == Key::new(2)).unwrap();
        assert_eq!(n.pred_action_cost[i], 3.0);
    }

    #[test]
    fn reset_successors_clears_stale_entries() {
        let mut n = StateNode::new(Key::new(1), 0u32);
        n.reset_successors(3);
        n.set_successor(1, Key::new(9), 4.0);
        n.reset_successors(3);
        assert!(n.succ_hashkey.iter().all(|k| k.is_empty()));
        assert!(n.succ_action_cost.iter().all(|c| c.is_infinite()));
    }
}
