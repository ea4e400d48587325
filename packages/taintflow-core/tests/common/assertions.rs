//! Assertion helpers

use taintflow_core::features::taint_analysis::InfoflowResults;
use taintflow_core::shared::ir::StmtId;

/// The run finished without hitting a budget or a fault
pub fn assert_complete(results: &InfoflowResults) {
    assert!(
        results.is_complete(),
        "run did not complete: state {}, faults {:?}",
        results.termination_state(),
        results.exceptions()
    );
}

pub fn assert_flow(results: &InfoflowResults, source: StmtId, sink: StmtId) {
    assert!(
        results.is_path_between(sink, source),
        "expected a flow {} -> {}, got:\n{}",
        source,
        sink,
        results
    );
}

pub fn assert_no_flows(results: &InfoflowResults) {
    assert!(results.is_empty(), "expected no flows, got:\n{}", results);
}
