//! Solver domain types

pub mod path_edge;
pub mod statistics;
pub mod termination;

pub use path_edge::{EndSummary, PathEdge};
pub use statistics::{SolverCounters, SolverStatistics};
pub use termination::{TerminationReason, TerminationState};
