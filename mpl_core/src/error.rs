//! Diagnostics the search drivers emit along the way.
//!
//! None of these are fatal — the driver's contract is to keep going and
//! let the caller decide what to do with a degraded result. They are
//! returned alongside the plan outcome *and* logged through the `log`
//! facade, following the teacher's convention of surfacing the same
//! event both to the caller and to whatever subscriber is listening.

use thiserror::Error;

use crate::key::Key;

/// A non-fatal event raised during `plan()`, `increaseCost`, or
/// `decreaseCost`. Collected into a `Vec` and returned alongside the
/// planning outcome rather than aborting the search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    /// A node already in the closed set was relaxed again with a lower
    /// cost. The driver leaves it closed — per the design this stays a
    /// diagnostic, not a trigger to reopen the node.
    #[error("consistency violation: key {key} was relaxed again after closing")]
    ConsistencyViolation { key: Key },

    /// An edge referenced a key with no corresponding entry in the
    /// state map. Indicates the caller mutated the graph out from under
    /// the search (or a genuine bug) — the driver skips the edge and
    /// continues.
    #[error("structural corruption: key {key} is referenced but has no state-map entry")]
    MissingNode { key: Key },

    /// A successor edge that looped back to its own origin. Skipped
    /// rather than folded into the graph.
    #[error("degenerate successor: self-loop at key {key} skipped")]
    SelfLoopSkipped { key: Key },

    /// Trajectory recovery reached a node with no predecessor carrying
    /// a finite cost. The partial trajectory built so far is still
    /// returned.
    #[error("trace-back dead end at key {key}: no predecessor has a finite candidate cost")]
    TraceBackDeadEnd { key: Key },
}

/// A structural problem surfaced by
/// [`crate::state_space::StateSpace::check_validation`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("node {from} references successor {to}, which has no entry in the state map")]
    MissingSuccessor { from: Key, to: Key },
}
