//! Concurrent IFDS solver and its runtime support

pub mod abort;
pub mod executor;
pub mod memory_manager;
pub mod solver;
pub mod watchers;

pub use abort::AbortHandle;
pub use executor::SolverExecutor;
pub use memory_manager::FactMemoryManager;
pub use solver::IfdsSolver;
pub use watchers::{program_baseline_bytes, MemoryWatcher, SolverMemoryEstimator, TimeoutWatcher};
