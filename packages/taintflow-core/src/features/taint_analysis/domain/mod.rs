/*
 * Taint Analysis Domain
 *
 * Value types handed back to the caller of a run.
 *
 * Architecture:
 * - results.rs: InfoflowResults (source-sink connections, raw sink
 *   observations, termination flags, captured faults)
 * - performance.rs: PerformanceData (edge counts, seeds, timings)
 */

mod performance;
mod results;

pub use performance::PerformanceData;
pub use results::{DataFlowResult, InfoflowResults, ResultSinkInfo, ResultSourceInfo};
