//! Scenario coverage for the graph search drivers, exercised through a
//! small synthetic line/branch environment rather than a real
//! kinodynamic lattice — the drivers only ever see `Waypoint`,
//! `Primitive`, and the numbers `Environment` hands back, so a toy
//! weighted-DAG domain exercises exactly the same code paths.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use mpl_core::{Algorithm, Environment, Key, PlanOutcome, StateSpace, SuccessorSet};

#[derive(Debug, Clone)]
struct Edge {
    to: i64,
    cost: f64,
}

#[derive(Debug, Clone, Copy)]
struct Move {
    from: i64,
    to: i64,
    cost: f64,
    blocked: bool,
}

struct GraphEnv {
    edges: RefCell<HashMap<i64, Vec<Edge>>>,
    blocked: RefCell<HashSet<(i64, i64)>>,
    goal: i64,
    max_degree: usize,
}

impl GraphEnv {
    fn new(edges: Vec<(i64, i64, f64)>, goal: i64) -> Self {
        let mut adjacency: HashMap<i64, Vec<Edge>> = HashMap::new();
        for (from, to, cost) in edges {
            adjacency.entry(from).or_default().push(Edge { to, cost });
        }
        let max_degree = adjacency.values().map(|v| v.len()).max().unwrap_or(1);
        GraphEnv {
            edges: RefCell::new(adjacency),
            blocked: RefCell::new(HashSet::new()),
            goal,
            max_degree,
        }
    }

    fn block(&self, from: i64, to: i64) {
        self.blocked.borrow_mut().insert((from, to));
    }

    fn reprice(&self, from: i64, to: i64, new_cost: f64) {
        let mut edges = self.edges.borrow_mut();
        if let Some(list) = edges.get_mut(&from) {
            if let Some(e) = list.iter_mut().find(|e| e.to == to) {
                e.cost = new_cost;
            }
        }
    }
}

impl Environment for GraphEnv {
    type Waypoint = i64;
    type Primitive = Move;

    fn is_goal(&self, wp: &i64) -> bool {
        *wp == self.goal
    }

    fn get_heur(&self, wp: &i64, _t: f64) -> f64 {
        (self.goal - *wp).unsigned_abs() as f64
    }

    fn get_succ(&self, wp: &i64) -> SuccessorSet<i64> {
        let mut out = SuccessorSet::new();
        let edges = self.edges.borrow();
        let blocked = self.blocked.borrow();
        if let Some(list) = edges.get(wp) {
            for (action_id, e) in list.iter().enumerate() {
                if blocked.contains(&(*wp, e.to)) {
                    continue;
                }
                out.push(e.to, Key::new(e.to), e.cost, action_id);
            }
        }
        out
    }

    fn forward_action(&self, wp: &i64, action_id: usize) -> Move {
        let edges = self.edges.borrow();
        let e = &edges[wp][action_id];
        Move {
            from: *wp,
            to: e.to,
            cost: e.cost,
            blocked: self.blocked.borrow().contains(&(*wp, e.to)),
        }
    }

    fn is_free(&self, pr: &Move) -> bool {
        !pr.blocked
    }

    fn action_cost(&self, pr: &Move) -> f64 {
        pr.cost
    }

    fn num_actions(&self) -> usize {
        self.max_degree
    }

    fn dt(&self) -> f64 {
        1.0
    }

    fn w(&self) -> f64 {
        1.0
    }

    fn wi(&self) -> usize {
        0
    }
}

fn found(outcome: PlanOutcome<Move>) -> (f64, Vec<Move>) {
    match outcome {
        PlanOutcome::Found { cost, trajectory } => (cost, trajectory),
        PlanOutcome::Infeasible => panic!("expected a plan, got Infeasible"),
    }
}

#[test]
fn trivial_start_is_goal() {
    let env = GraphEnv::new(vec![], 5);
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, diagnostics) = mpl_core::plan(Algorithm::Astar, 5, Key::new(5), &env, &mut sss, 0, 0.0);
    assert!(diagnostics.is_empty());
    let (cost, trajectory) = found(outcome);
    assert_eq!(cost, 0.0);
    assert!(trajectory.is_empty());
}

#[test]
fn trivial_start_is_goal_lpastar_touches_nothing() {
    // Start == goal, but the start still has outgoing edges: if `lpastar`
    // ever ran `expand_successors` on it before returning, this would
    // grow the state space past its single start node.
    let env = GraphEnv::new(vec![(5, 6, 1.0), (5, 7, 1.0)], 5);
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, diagnostics) = mpl_core::plan(Algorithm::LPAstar, 5, Key::new(5), &env, &mut sss, 0, 0.0);
    assert!(diagnostics.is_empty());
    let (cost, trajectory) = found(outcome);
    assert_eq!(cost, 0.0);
    assert!(trajectory.is_empty());
    assert!(sss.is_empty(), "start-at-goal lpastar must not create or open any successor nodes");
}

#[test]
fn unit_line_graph_astar() {
    let env = GraphEnv::new(vec![(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)], 3);
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::Astar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, trajectory) = found(outcome);
    assert_eq!(cost, 3.0);
    assert_eq!(trajectory.len(), 3);
    assert_eq!(trajectory[0].from, 0);
    assert_eq!(trajectory.last().unwrap().to, 3);
}

#[test]
fn unit_line_graph_lpastar_matches_astar() {
    let env = GraphEnv::new(vec![(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)], 3);
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::LPAstar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, trajectory) = found(outcome);
    assert_eq!(cost, 3.0);
    assert_eq!(trajectory.len(), 3);
}

#[test]
fn branch_with_tie_prefers_deeper_committed_parent() {
    // 0 -> 1 (cost 2), 0 -> 2 (cost 2), 1 -> 3 (cost 1), 2 -> 3 (cost 1):
    // both routes to the goal cost exactly 3.
    let env = GraphEnv::new(
        vec![(0, 1, 2.0), (0, 2, 2.0), (1, 3, 1.0), (2, 3, 1.0)],
        3,
    );
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::Astar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, trajectory) = found(outcome);
    assert_eq!(cost, 3.0);
    assert_eq!(trajectory.len(), 2);
    // Either branch is a valid minimum-cost route.
    assert!(trajectory[0].to == 1 || trajectory[0].to == 2);
}

#[test]
fn increase_cost_reroutes_around_a_newly_blocked_edge() {
    let env = GraphEnv::new(vec![(0, 1, 1.0), (1, 3, 1.0), (0, 2, 5.0), (2, 3, 1.0)], 3);
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::LPAstar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, _) = found(outcome);
    assert_eq!(cost, 2.0);

    env.block(1, 3);
    let succ3 = sss.get(Key::new(3)).unwrap();
    let pred_pos = sss
        .node(succ3)
        .pred_hashkey
        .iter()
        .position(|&k| k == Key::new(1))
        .unwrap();
    let diagnostics = sss.increase_cost(&[(Key::new(3), pred_pos)]);
    assert!(diagnostics.is_empty());

    let (outcome, _) = mpl_core::plan(Algorithm::LPAstar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, trajectory) = found(outcome);
    assert_eq!(cost, 6.0);
    assert_eq!(trajectory[0].to, 2);
}

#[test]
fn decrease_cost_adopts_a_newly_cheaper_edge() {
    let env = GraphEnv::new(vec![(0, 1, 1.0), (1, 3, 1.0), (0, 2, 100.0), (2, 3, 1.0)], 3);
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::LPAstar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, _) = found(outcome);
    assert_eq!(cost, 2.0);

    env.reprice(0, 2, 0.25);
    let succ2 = sss.get(Key::new(2)).unwrap();
    let pred_pos = sss
        .node(succ2)
        .pred_hashkey
        .iter()
        .position(|&k| k == Key::new(0))
        .unwrap();
    let diagnostics = sss.decrease_cost(&[(Key::new(2), pred_pos)], &env);
    assert!(diagnostics.is_empty());

    let (outcome, _) = mpl_core::plan(Algorithm::LPAstar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, trajectory) = found(outcome);
    assert_eq!(cost, 1.25);
    assert_eq!(trajectory[0].to, 2);
}

#[test]
fn get_sub_state_space_prunes_the_abandoned_branch() {
    let env = GraphEnv::new(
        vec![(0, 1, 2.0), (0, 2, 5.0), (1, 3, 1.0), (2, 3, 1.0)],
        3,
    );
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::LPAstar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    let (cost, _) = found(outcome);
    assert_eq!(cost, 3.0);

    assert!(sss.get(Key::new(2)).is_some());
    sss.get_sub_state_space(1);
    assert!(sss.get(Key::new(1)).is_some());
    assert!(sss.get(Key::new(3)).is_some());
    assert!(sss.get(Key::new(2)).is_none());
}

#[test]
fn max_expand_bound_reports_infeasible() {
    let env = GraphEnv::new(
        vec![(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0)],
        4,
    );
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::Astar, 0, Key::new(0), &env, &mut sss, 1, 0.0);
    assert!(matches!(outcome, PlanOutcome::Infeasible));
}

#[test]
fn check_validation_reports_a_dangling_successor() {
    let env = GraphEnv::new(vec![(0, 1, 1.0)], 1);
    let mut sss = StateSpace::new(1.0, env.dt());
    let (outcome, _) = mpl_core::plan(Algorithm::Astar, 0, Key::new(0), &env, &mut sss, 0, 0.0);
    found(outcome);
    assert!(sss.check_validation().is_empty());
}
