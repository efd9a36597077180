//! Incremental motion-primitive lattice search core.
//!
//! This crate implements the graph-search half of a kinodynamic motion
//! planner: a persistent, incrementally-maintained explicit graph over
//! discretised states, searched with either weighted A* or Lifelong
//! Planning A* (LPA*). It deliberately knows nothing about dynamics,
//! collision geometry, or how a continuous state gets discretised —
//! all of that lives behind the [`Environment`] trait an embedder
//! implements.
//!
//! The four pieces, smallest to largest:
//! - [`key`] — the opaque lattice-cell identifier.
//! - [`state`] — a single cell's relaxation bookkeeping (`g`/`rhs`) and
//!   edge arrays.
//! - [`heap`] — the mutable-key priority queue both drivers share.
//! - [`state_space`] — the persistent graph and its incremental
//!   maintenance operations (`update_node`, `increase_cost`,
//!   `decrease_cost`, `get_sub_state_space`, `check_validation`).
//! - [`search`] — the drivers themselves (`Astar`, `LPAstar`) and
//!   trajectory recovery.

pub mod env;
pub mod error;
pub mod heap;
pub mod key;
pub mod search;
pub mod state;
pub mod state_space;

pub use env::{Environment, SuccessorSet};
pub use error::{Diagnostic, ValidationIssue};
pub use key::Key;
pub use search::{plan, Algorithm, PlanOutcome};
pub use state::{NodeIndex, StateNode};
pub use state_space::StateSpace;
