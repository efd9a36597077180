//! The persistent, incrementally-maintained explicit graph.
//!
//! Nodes live in a `slab::Slab` arena and are addressed by `NodeIndex`;
//! `hm` maps a lattice `Key` to the arena slot holding it. This
//! arena-plus-index pattern takes the place of the `Rc<RefCell<_>>`
//! shared-node graphs common elsewhere in the corpus: every heap handle
//! and edge reference is a plain index, so there is no reference
//! cycle to reason about and pruning a subgraph is a matter of dropping
//! slab entries rather than waiting on a refcount.

use rustc_hash::{FxHashMap, FxHashSet};
use slab::Slab;

use crate::env::Environment;
use crate::error::{Diagnostic, ValidationIssue};
use crate::heap::IndexedPriorityQueue;
use crate::key::Key;
use crate::state::{NodeIndex, StateNode};

/// The shared graph both `Astar` and `LPAstar` read from and mutate.
///
/// `eps` is the weighted-A* inflation applied uniformly to every
/// node's heuristic (`f = g + eps*h`); `dt` is the nominal time step
/// used to stamp `StateNode::t` when no better estimate is available.
pub struct StateSpace<W> {
    arena: Slab<StateNode<W>>,
    hm: FxHashMap<Key, NodeIndex>,
    pq: IndexedPriorityQueue<NodeIndex>,
    pub eps: f64,
    pub dt: f64,
    goal_node: Option<NodeIndex>,
    need_to_reset_goal: bool,
    best_child: Vec<NodeIndex>,
}

impl<W: Clone> StateSpace<W> {
    pub fn new(eps: f64, dt: f64) -> Self {
        Self {
            arena: Slab::new(),
            hm: FxHashMap::default(),
            pq: IndexedPriorityQueue::new(),
            eps,
            dt,
            goal_node: None,
            need_to_reset_goal: true,
            best_child: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn node(&self, idx: NodeIndex) -> &StateNode<W> {
        &self.arena[idx.0]
    }

    pub fn get(&self, key: Key) -> Option<NodeIndex> {
        self.hm.get(&key).copied()
    }

    pub fn best_child(&self) -> &[NodeIndex] {
        &self.best_child
    }

    pub(crate) fn pq_is_empty(&self) -> bool {
        self.pq.is_empty()
    }

    pub(crate) fn pq_peek_key(&self) -> Option<f64> {
        self.pq.peek_key()
    }

    pub(crate) fn pq_pop(&mut self) -> Option<NodeIndex> {
        self.pq.pop().map(|(_, idx)| idx)
    }

    pub(crate) fn pq_push(&mut self, key: f64, idx: NodeIndex) {
        let handle = self.pq.push(key, idx);
        self.arena[idx.0].heap_handle = Some(handle);
    }

    pub(crate) fn goal_node(&self) -> Option<NodeIndex> {
        self.goal_node
    }

    pub(crate) fn set_goal_node(&mut self, idx: NodeIndex) {
        self.goal_node = Some(idx);
    }

    pub(crate) fn take_need_to_reset_goal(&mut self) -> bool {
        let v = self.need_to_reset_goal;
        self.need_to_reset_goal = false;
        v
    }

    pub(crate) fn clear_goal_node(&mut self) {
        self.goal_node = None;
    }

    pub(crate) fn push_best_child(&mut self, idx: NodeIndex) {
        self.best_child.push(idx);
    }

    pub(crate) fn clear_best_child(&mut self) {
        self.best_child.clear();
    }

    pub(crate) fn reverse_best_child(&mut self) {
        self.best_child.reverse();
    }

    pub(crate) fn get_or_create<F: FnOnce() -> StateNode<W>>(&mut self, key: Key, make: F) -> NodeIndex {
        if let Some(&idx) = self.hm.get(&key) {
            return idx;
        }
        let slot = self.arena.insert(make());
        let idx = NodeIndex(slot);
        self.hm.insert(key, idx);
        idx
    }

    pub(crate) fn reset_successors(&mut self, idx: NodeIndex, num_actions: usize) {
        self.arena[idx.0].reset_successors(num_actions);
    }

    pub(crate) fn set_successor(&mut self, idx: NodeIndex, action_id: usize, key: Key, cost: f64) {
        self.arena[idx.0].set_successor(action_id, key, cost);
    }

    pub(crate) fn upsert_predecessor(&mut self, idx: NodeIndex, parent_key: Key, action_id: usize, cost: f64) {
        self.arena[idx.0].upsert_predecessor(parent_key, action_id, cost);
    }

    pub(crate) fn g(&self, idx: NodeIndex) -> f64 {
        self.arena[idx.0].g
    }

    pub(crate) fn set_g(&mut self, idx: NodeIndex, g: f64) {
        self.arena[idx.0].g = g;
    }

    pub(crate) fn rhs(&self, idx: NodeIndex) -> f64 {
        self.arena[idx.0].rhs
    }

    pub(crate) fn set_rhs(&mut self, idx: NodeIndex, rhs: f64) {
        self.arena[idx.0].rhs = rhs;
    }

    pub(crate) fn h(&self, idx: NodeIndex) -> f64 {
        self.arena[idx.0].h
    }

    pub(crate) fn t(&self, idx: NodeIndex) -> f64 {
        self.arena[idx.0].t
    }

    pub(crate) fn set_t(&mut self, idx: NodeIndex, t: f64) {
        self.arena[idx.0].t = t;
    }

    pub(crate) fn hashkey(&self, idx: NodeIndex) -> Key {
        self.arena[idx.0].hashkey
    }

    pub(crate) fn coord(&self, idx: NodeIndex) -> W {
        self.arena[idx.0].coord.clone()
    }

    pub(crate) fn mark_closed(&mut self, idx: NodeIndex) {
        self.arena[idx.0].iteration_closed = true;
        self.arena[idx.0].heap_handle = None;
    }

    pub(crate) fn is_opened(&self, idx: NodeIndex) -> bool {
        self.arena[idx.0].iteration_opened
    }

    pub(crate) fn is_closed(&self, idx: NodeIndex) -> bool {
        self.arena[idx.0].iteration_closed
    }

    pub(crate) fn mark_opened(&mut self, idx: NodeIndex) {
        self.arena[idx.0].iteration_opened = true;
    }

    pub(crate) fn heap_handle(&self, idx: NodeIndex) -> Option<crate::heap::Handle> {
        self.arena[idx.0].heap_handle
    }

    pub(crate) fn decrease_heap_key(&mut self, idx: NodeIndex, key: f64) {
        if let Some(h) = self.arena[idx.0].heap_handle {
            self.pq.decrease_key(h, key);
        }
    }

    /// Recomputes `rhs` from the min over predecessors, closes the node
    /// out of the open set if it is in it, and re-opens it at the
    /// correct priority if it is now inconsistent.
    ///
    /// The LPA* `UpdateVertex` step. `rhs(start) == 0` is the one fixed
    /// point this never touches, matching the convention that the
    /// start's cost-to-come is pinned rather than derived.
    pub fn update_node(&mut self, idx: NodeIndex) {
        let mut parent_t = self.arena[idx.0].t - self.dt;

        if self.arena[idx.0].rhs != 0.0 {
            let preds: Vec<(Key, f64)> = self.arena[idx.0]
                .pred_hashkey
                .iter()
                .copied()
                .zip(self.arena[idx.0].pred_action_cost.iter().copied())
                .collect();

            let mut min_rhs = f64::INFINITY;
            for (pred_key, cost) in preds {
                if let Some(&pred_idx) = self.hm.get(&pred_key) {
                    let candidate = self.arena[pred_idx.0].g + cost;
                    if candidate < min_rhs {
                        min_rhs = candidate;
                        parent_t = self.arena[pred_idx.0].t;
                    }
                }
            }
            self.arena[idx.0].rhs = min_rhs;
        }

        if self.arena[idx.0].iteration_opened && !self.arena[idx.0].iteration_closed {
            if let Some(handle) = self.arena[idx.0].heap_handle.take() {
                self.pq.erase(handle);
            }
            self.arena[idx.0].iteration_closed = true;
        }

        if self.arena[idx.0].g != self.arena[idx.0].rhs {
            let g = self.arena[idx.0].g;
            let rhs = self.arena[idx.0].rhs;
            let h = self.arena[idx.0].h;
            let fval = g.min(rhs) + self.eps * h;
            let handle = self.pq.push(fval, idx);
            self.arena[idx.0].heap_handle = Some(handle);
            self.arena[idx.0].iteration_opened = true;
            self.arena[idx.0].iteration_closed = false;
            self.arena[idx.0].t = parent_t + self.dt;
        }
    }

    /// Applies an edge-cost increase for each `(node_key, pred_slot)`
    /// pair: the edge into `node_key` at predecessor slot `pred_slot`
    /// is set to infinite cost, the node is relaxed, and the mirrored
    /// successor slot on the parent is updated to match.
    pub fn increase_cost(&mut self, affected: &[(Key, usize)]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if affected.is_empty() {
            return diagnostics;
        }
        self.need_to_reset_goal = true;

        for &(key, pred_pos) in affected {
            let Some(&idx) = self.hm.get(&key) else {
                log::warn!("increase_cost: no state-map entry for key {key}");
                diagnostics.push(Diagnostic::MissingNode { key });
                continue;
            };

            self.arena[idx.0].pred_action_cost[pred_pos] = f64::INFINITY;
            let parent_key = self.arena[idx.0].pred_hashkey[pred_pos];
            let action_id = self.arena[idx.0].pred_action_id[pred_pos];

            self.update_node(idx);

            match self.hm.get(&parent_key) {
                Some(&parent_idx) => {
                    self.arena[parent_idx.0].succ_action_cost[action_id] = f64::INFINITY;
                }
                None => {
                    log::warn!("increase_cost: no state-map entry for predecessor key {parent_key}");
                    diagnostics.push(Diagnostic::MissingNode { key: parent_key });
                }
            }
        }

        diagnostics
    }

    /// Applies an edge-cost decrease for each `(node_key, pred_slot)`
    /// pair: the primitive connecting the predecessor to `node_key` is
    /// re-derived, and if it is now free its true cost replaces the
    /// edge's stale one before relaxing the node.
    pub fn decrease_cost<E>(&mut self, affected: &[(Key, usize)], env: &E) -> Vec<Diagnostic>
    where
        E: Environment<Waypoint = W>,
    {
        let mut diagnostics = Vec::new();
        if affected.is_empty() {
            return diagnostics;
        }
        self.need_to_reset_goal = true;

        for &(key, pred_pos) in affected {
            let Some(&idx) = self.hm.get(&key) else {
                log::warn!("decrease_cost: no state-map entry for key {key}");
                diagnostics.push(Diagnostic::MissingNode { key });
                continue;
            };

            let parent_key = self.arena[idx.0].pred_hashkey[pred_pos];
            let action_id = self.arena[idx.0].pred_action_id[pred_pos];

            let Some(&parent_idx) = self.hm.get(&parent_key) else {
                log::warn!("decrease_cost: no state-map entry for predecessor key {parent_key}");
                diagnostics.push(Diagnostic::MissingNode { key: parent_key });
                continue;
            };

            let parent_coord = self.arena[parent_idx.0].coord.clone();
            let primitive = env.forward_action(&parent_coord, action_id);
            if env.is_free(&primitive) {
                let cost = env.action_cost(&primitive);
                self.arena[idx.0].pred_action_cost[pred_pos] = cost;
                self.update_node(idx);
                self.arena[parent_idx.0].succ_action_cost[action_id] = cost;
            }
        }

        diagnostics
    }

    /// Reports every successor edge that points at a key absent from
    /// the state map. A clean graph reports no issues.
    pub fn check_validation(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for (_, node) in self.arena.iter() {
            for &succ_key in &node.succ_hashkey {
                if succ_key.is_empty() {
                    continue;
                }
                if !self.hm.contains_key(&succ_key) {
                    issues.push(ValidationIssue::MissingSuccessor {
                        from: node.hashkey,
                        to: succ_key,
                    });
                }
            }
        }
        for issue in &issues {
            log::warn!("{issue}");
        }
        issues
    }

    /// Commits to `best_child()[time_step]` as the new root: re-derives
    /// cost-to-come for everything still reachable from it via a
    /// forward Dijkstra pass over the cached successor edges, drops
    /// everything that falls out of reach, and re-seeds the open set so
    /// the next `plan()` call resumes warm rather than from scratch.
    pub fn get_sub_state_space(&mut self, time_step: usize) {
        if self.best_child.is_empty() || time_step >= self.best_child.len() {
            return;
        }
        let committed = self.best_child[time_step];

        self.arena[committed.0].pred_hashkey.clear();
        self.arena[committed.0].pred_action_id.clear();
        self.arena[committed.0].pred_action_cost.clear();
        self.arena[committed.0].t = 0.0;
        let committed_g = self.arena[committed.0].g;

        let all_indices: Vec<usize> = self.arena.iter().map(|(i, _)| i).collect();
        for &i in &all_indices {
            let node = &mut self.arena[i];
            node.g = f64::INFINITY;
            node.rhs = f64::INFINITY;
            node.iteration_opened = false;
            node.heap_handle = None;
            node.pred_hashkey.clear();
            node.pred_action_id.clear();
            node.pred_action_cost.clear();
        }
        self.arena[committed.0].g = committed_g;

        let mut epq: IndexedPriorityQueue<NodeIndex> = IndexedPriorityQueue::new();
        let handle = epq.push(committed_g, committed);
        self.arena[committed.0].heap_handle = Some(handle);
        self.arena[committed.0].iteration_opened = true;

        let mut new_hm: FxHashMap<Key, NodeIndex> = FxHashMap::default();

        while let Some((_, curr)) = epq.pop() {
            self.arena[curr.0].heap_handle = None;
            new_hm.insert(self.arena[curr.0].hashkey, curr);

            let succ_len = self.arena[curr.0].succ_hashkey.len();
            for i in 0..succ_len {
                let succ_key = self.arena[curr.0].succ_hashkey[i];
                if succ_key.is_empty() || succ_key == self.arena[curr.0].hashkey {
                    continue;
                }

                let succ_idx = match self.hm.get(&succ_key) {
                    Some(&idx) => idx,
                    None => {
                        log::warn!(
                            "get_sub_state_space: successor key {succ_key} missing, rebinding to cached goal"
                        );
                        match self.goal_node {
                            Some(g) => g,
                            None => continue,
                        }
                    }
                };

                let cost = self.arena[curr.0].succ_action_cost[i];
                let curr_key = self.arena[curr.0].hashkey;
                self.arena[succ_idx.0].pred_hashkey.push(curr_key);
                self.arena[succ_idx.0].pred_action_cost.push(cost);
                self.arena[succ_idx.0].pred_action_id.push(i);

                let tentative_g = self.arena[curr.0].g + cost;
                let succ_g = self.arena[succ_idx.0].g;
                let succ_opened = self.arena[succ_idx.0].iteration_opened;

                if tentative_g < succ_g || !succ_opened {
                    let curr_t = self.arena[curr.0].t;
                    self.arena[succ_idx.0].t = curr_t + self.dt;
                    self.arena[succ_idx.0].g = tentative_g;
                    if succ_opened {
                        if let Some(h) = self.arena[succ_idx.0].heap_handle {
                            epq.decrease_key(h, tentative_g);
                        }
                    } else {
                        let h = epq.push(tentative_g, succ_idx);
                        self.arena[succ_idx.0].heap_handle = Some(h);
                        self.arena[succ_idx.0].iteration_opened = true;
                    }
                }
            }
        }

        let visited_ids: FxHashSet<usize> = new_hm.values().map(|idx| idx.0).collect();
        for i in all_indices {
            if !visited_ids.contains(&i) {
                self.arena.remove(i);
            }
        }
        self.hm = new_hm;

        self.pq.clear();
        let remaining: Vec<NodeIndex> = self.arena.iter().map(|(i, _)| NodeIndex(i)).collect();
        for idx in remaining {
            if !self.arena[idx.0].iteration_closed {
                let g = self.arena[idx.0].g;
                let h = self.arena[idx.0].h;
                let fval = g + self.eps * h;
                let handle = self.pq.push(fval, idx);
                self.arena[idx.0].heap_handle = Some(handle);
                self.arena[idx.0].iteration_opened = true;
                self.arena[idx.0].rhs = g;
                self.arena[idx.0].g = f64::INFINITY;
            } else {
                self.arena[idx.0].heap_handle = None;
            }
        }

        self.need_to_reset_goal = true;
        self.best_child.clear();
    }
}
