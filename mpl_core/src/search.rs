//! The graph search drivers: weighted A* and Lifelong Planning A*.
//!
//! Both drivers pop from the same priority queue and share the same
//! trajectory-recovery tail; what differs is how they seed the start
//! node and what they do with `g`/`rhs` on each pop. `LPAstar` is the
//! one meant to be called repeatedly against a `StateSpace` that
//! persists across calls, reusing whatever the previous call (and any
//! `increase_cost`/`decrease_cost` in between) left behind.

use crate::env::Environment;
use crate::error::Diagnostic;
use crate::key::Key;
use crate::state::{NodeIndex, StateNode};
use crate::state_space::StateSpace;

/// Which driver `plan()` should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Astar,
    LPAstar,
}

/// The result of a `plan()` call.
#[derive(Debug, Clone)]
pub enum PlanOutcome<P> {
    /// A plan was produced, though `cost` may still be `f64::INFINITY`
    /// if the search exhausted its bound before confirming a route
    /// (see the `max_t` cases below) — callers should check
    /// `cost.is_finite()` rather than match on this variant alone.
    Found { cost: f64, trajectory: Vec<P> },
    /// The open set emptied or the expansion cap was hit before a
    /// trajectory was even attempted.
    Infeasible,
}

/// Dispatches to the requested driver.
///
/// `max_expand <= 0` and `max_t <= 0.0` both mean "no bound", matching
/// the convention that a non-positive bound disables the corresponding
/// check entirely.
pub fn plan<E: Environment>(
    algorithm: Algorithm,
    start_coord: E::Waypoint,
    start_key: Key,
    env: &E,
    sss: &mut StateSpace<E::Waypoint>,
    max_expand: i64,
    max_t: f64,
) -> (PlanOutcome<E::Primitive>, Vec<Diagnostic>) {
    match algorithm {
        Algorithm::Astar => astar(start_coord, start_key, env, sss, max_expand, max_t),
        Algorithm::LPAstar => lpastar(start_coord, start_key, env, sss, max_expand, max_t),
    }
}

fn astar<E: Environment>(
    start_coord: E::Waypoint,
    start_key: Key,
    env: &E,
    sss: &mut StateSpace<E::Waypoint>,
    max_expand: i64,
    max_t: f64,
) -> (PlanOutcome<E::Primitive>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    sss.clear_best_child();

    if env.is_goal(&start_coord) {
        return (
            PlanOutcome::Found {
                cost: 0.0,
                trajectory: Vec::new(),
            },
            diagnostics,
        );
    }

    if sss.pq_is_empty() {
        let mut node = StateNode::new(start_key, start_coord.clone());
        node.t = 0.0;
        node.g = 0.0;
        node.h = env.get_heur(&start_coord, 0.0);
        let fval = node.g + sss.eps * node.h;
        let idx = sss.get_or_create(start_key, || node);
        sss.pq_push(fval, idx);
        sss.mark_opened(idx);
    }

    let mut curr_idx: NodeIndex;
    let mut expand_iteration: i64 = 0;

    loop {
        curr_idx = match sss.pq_pop() {
            Some(idx) => idx,
            None => {
                log::error!("astar: priority queue exhausted before reaching the goal");
                return (PlanOutcome::Infeasible, diagnostics);
            }
        };
        expand_iteration += 1;
        sss.mark_closed(curr_idx);

        expand_successors(curr_idx, env, sss, &mut diagnostics, |sss, succ_idx, curr_idx, curr_g, cost| {
            let tentative_g = curr_g + cost;
            if tentative_g < sss.g(succ_idx) {
                let curr_t = sss.t(curr_idx);
                sss.set_t(succ_idx, curr_t + env.dt());
                sss.set_g(succ_idx, tentative_g);
                let h = sss.h(succ_idx);
                let fval = tentative_g + sss.eps * h;

                let opened = sss.is_opened(succ_idx);
                let closed = sss.is_closed(succ_idx);
                if opened && !closed {
                    sss.decrease_heap_key(succ_idx, fval);
                    None
                } else if opened && closed {
                    Some(Diagnostic::ConsistencyViolation {
                        key: sss.hashkey(succ_idx),
                    })
                } else {
                    sss.pq_push(fval, succ_idx);
                    sss.mark_opened(succ_idx);
                    None
                }
            } else {
                None
            }
        });

        let curr_t = sss.t(curr_idx);
        let curr_coord = sss.coord(curr_idx);
        if env.is_goal(&curr_coord) {
            break;
        }
        if max_t > 0.0 && curr_t >= max_t && sss.g(curr_idx).is_finite() {
            break;
        }
        if max_expand > 0 && expand_iteration >= max_expand {
            log::error!("astar: expansion cap ({max_expand}) reached before reaching the goal");
            return (PlanOutcome::Infeasible, diagnostics);
        }
        if sss.pq_is_empty() {
            log::error!("astar: priority queue exhausted before reaching the goal");
            return (PlanOutcome::Infeasible, diagnostics);
        }
    }

    let cost = sss.g(curr_idx);
    let trajectory = recover_trajectory(curr_idx, env, sss, start_key, &mut diagnostics);
    (PlanOutcome::Found { cost, trajectory }, diagnostics)
}

fn lpastar<E: Environment>(
    start_coord: E::Waypoint,
    start_key: Key,
    env: &E,
    sss: &mut StateSpace<E::Waypoint>,
    max_expand: i64,
    max_t: f64,
) -> (PlanOutcome<E::Primitive>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    sss.clear_best_child();

    if env.is_goal(&start_coord) {
        return (
            PlanOutcome::Found {
                cost: 0.0,
                trajectory: Vec::new(),
            },
            diagnostics,
        );
    }

    if sss.take_need_to_reset_goal() {
        sss.clear_goal_node();
    }

    if sss.pq_is_empty() {
        // Either a brand new search, or a resume right after
        // `get_sub_state_space` committed to a node: either way this key
        // is about to become the root, so its `rhs` is pinned to zero
        // unconditionally. A genuinely new node gets `g = inf` from
        // `StateNode::new`; a committed one keeps whatever cumulative
        // `g` `get_sub_state_space` carried over.
        let idx = sss.get_or_create(start_key, || {
            let mut node = StateNode::new(start_key, start_coord.clone());
            node.t = 0.0;
            node.h = env.get_heur(&start_coord, 0.0);
            node
        });
        sss.set_rhs(idx, 0.0);
        let g = sss.g(idx);
        let h = sss.h(idx);
        let fval = g.min(0.0) + sss.eps * h;
        sss.pq_push(fval, idx);
        sss.mark_opened(idx);
    } else {
        sss.get(start_key)
            .expect("resuming LPA* requires a previously created start node");
    }

    // The goal is identified lazily: the driver only ever learns it has
    // reached the goal when it pops a node whose coordinate satisfies
    // `is_goal`, never from a key supplied up front. Once found, its
    // identity is cached on the state space so the next call resumes
    // with the same reference instead of rediscovering it.
    let mut known_goal: Option<NodeIndex> = sss.goal_node();
    let (mut goal_g, mut goal_rhs) = match known_goal {
        Some(idx) => (sss.g(idx), sss.rhs(idx)),
        None => (f64::INFINITY, f64::INFINITY),
    };

    let mut expand_iteration: i64 = 0;

    loop {
        let top_key = match sss.pq_peek_key() {
            Some(k) => k,
            None => break,
        };
        if !(top_key < goal_g.min(goal_rhs) || goal_rhs != goal_g) {
            break;
        }

        expand_iteration += 1;
        let curr_idx = sss.pq_pop().expect("queue non-empty, just peeked");
        sss.mark_closed(curr_idx);

        if known_goal.is_none() && env.is_goal(&sss.coord(curr_idx)) {
            known_goal = Some(curr_idx);
        }

        let mut touched: Vec<NodeIndex> = Vec::new();
        expand_successors(curr_idx, env, sss, &mut diagnostics, |_sss, succ_idx, _curr_idx, _curr_g, _cost| {
            touched.push(succ_idx);
            None
        });

        let g = sss.g(curr_idx);
        let rhs = sss.rhs(curr_idx);
        if g > rhs {
            sss.set_g(curr_idx, rhs);
        } else {
            sss.set_g(curr_idx, f64::INFINITY);
            touched.push(curr_idx);
        }

        let curr_t = sss.t(curr_idx);
        if max_t > 0.0 && curr_t >= max_t && sss.rhs(curr_idx).is_finite() {
            if known_goal.is_none() {
                known_goal = Some(curr_idx);
            }
            break;
        }

        for idx in touched {
            sss.update_node(idx);
        }

        if max_expand > 0 && expand_iteration >= max_expand {
            log::error!("lpastar: expansion cap ({max_expand}) reached before reaching the goal");
            return (PlanOutcome::Infeasible, diagnostics);
        }

        if let Some(gidx) = known_goal {
            goal_g = sss.g(gidx);
            goal_rhs = sss.rhs(gidx);
        }
    }

    let Some(goal_idx) = known_goal else {
        log::error!("lpastar: priority queue exhausted without ever reaching the goal");
        return (PlanOutcome::Infeasible, diagnostics);
    };
    sss.set_goal_node(goal_idx);

    let cost = sss.g(goal_idx);
    let trajectory = recover_trajectory(goal_idx, env, sss, start_key, &mut diagnostics);
    (PlanOutcome::Found { cost, trajectory }, diagnostics)
}

/// Expands `curr_idx`, rebuilding its successor edges from scratch and
/// mirroring each one into the successor's predecessor edges, then
/// calls `relax` for every non-degenerate successor it finds.
fn expand_successors<E, F>(
    curr_idx: NodeIndex,
    env: &E,
    sss: &mut StateSpace<E::Waypoint>,
    diagnostics: &mut Vec<Diagnostic>,
    mut relax: F,
) where
    E: Environment,
    F: FnMut(&mut StateSpace<E::Waypoint>, NodeIndex, NodeIndex, f64, f64) -> Option<Diagnostic>,
{
    let curr_coord = sss.coord(curr_idx);
    let curr_key = sss.hashkey(curr_idx);
    let curr_t = sss.t(curr_idx);
    let curr_g = sss.g(curr_idx);

    let succs = env.get_succ(&curr_coord);
    sss.reset_successors(curr_idx, env.num_actions());

    for i in 0..succs.len() {
        let succ_key = succs.keys[i];
        let succ_coord = succs.coords[i].clone();
        let cost = succs.costs[i];
        let action_id = succs.action_ids[i];

        let succ_idx = sss.get_or_create(succ_key, || {
            let mut n = StateNode::new(succ_key, succ_coord.clone());
            n.t = curr_t + env.dt();
            n.h = env.get_heur(&succ_coord, n.t);
            n
        });

        if succ_idx == curr_idx {
            log::debug!("expand_successors: self-loop at key {succ_key} skipped");
            diagnostics.push(Diagnostic::SelfLoopSkipped { key: succ_key });
            continue;
        }

        sss.set_successor(curr_idx, action_id, succ_key, cost);
        sss.upsert_predecessor(succ_idx, curr_key, action_id, cost);

        if let Some(d) = relax(sss, succ_idx, curr_idx, curr_g, cost) {
            log::warn!("{d}");
            diagnostics.push(d);
        }
    }
}

/// Walks best-parent pointers from `curr_idx` back to `start_key`,
/// picking at each step the predecessor with the lowest
/// cost-to-come-plus-edge, breaking ties toward the predecessor with
/// the larger own `g` (the deeper-committed branch).
fn recover_trajectory<E: Environment>(
    mut curr_idx: NodeIndex,
    env: &E,
    sss: &mut StateSpace<E::Waypoint>,
    start_key: Key,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<E::Primitive> {
    let mut primitives = Vec::new();
    sss.clear_best_child();

    loop {
        let node = sss.node(curr_idx);
        if node.pred_hashkey.is_empty() {
            break;
        }

        let pred_count = node.pred_hashkey.len();
        let mut min_id: Option<usize> = None;
        let mut min_candidate = f64::INFINITY;
        let mut min_g = f64::NEG_INFINITY;

        for i in 0..pred_count {
            let node = sss.node(curr_idx);
            let pred_key = node.pred_hashkey[i];
            let pred_cost = node.pred_action_cost[i];
            let Some(pred_idx) = sss.get(pred_key) else {
                continue;
            };
            let pred_g = sss.g(pred_idx);
            let candidate = pred_g + pred_cost;

            if candidate < min_candidate {
                min_candidate = candidate;
                min_g = pred_g;
                min_id = Some(i);
            } else if pred_cost.is_finite() && candidate == min_candidate && pred_g > min_g {
                min_g = pred_g;
                min_id = Some(i);
            }
        }

        match min_id {
            Some(id) => {
                let node = sss.node(curr_idx);
                let pred_key = node.pred_hashkey[id];
                let action_id = node.pred_action_id[id];
                let pred_idx = sss
                    .get(pred_key)
                    .expect("validated reachable in the scan above");
                curr_idx = pred_idx;
                let pred_coord = sss.coord(curr_idx);
                primitives.push(env.forward_action(&pred_coord, action_id));
                sss.push_best_child(curr_idx);
            }
            None => {
                let key = sss.hashkey(curr_idx);
                log::warn!("trace-back dead end at key {key}");
                diagnostics.push(Diagnostic::TraceBackDeadEnd { key });
                break;
            }
        }

        if sss.hashkey(curr_idx) == start_key {
            break;
        }
    }

    primitives.reverse();
    sss.reverse_best_child();
    primitives
}
