// IFDS solver
//
// Hexagonal Architecture:
// - domain/         : path edges, end summaries, statistics, termination state
// - ports/          : IfdsProblem (flow functions), TerminatableSolver,
//                     MemoryEstimator
// - infrastructure/ : tabulation solver, shared executor, fact reuse,
//                     timeout and memory watchers, caller cancellation

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::{PathEdge, SolverStatistics, TerminationReason, TerminationState};
pub use infrastructure::{AbortHandle, IfdsSolver, SolverExecutor};
pub use ports::{FactSet, IfdsProblem, TerminatableSolver};
