//! Budget handling: every run returns, partial or not

mod common;

use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taintflow_core::features::abstraction::AbsRef;
use taintflow_core::features::ifds_solver::AbortHandle;
use taintflow_core::features::taint_analysis::{
    FlowFunctionType, Infoflow, InfoflowManager, TaintPropagationHandler,
};
use taintflow_core::shared::ir::{Program, StmtId, Type, Value};
use taintflow_core::TerminationState;

/// Cancels the analysis when the first fact reaches a flow function
struct CancelOnFirstFact {
    handle: AbortHandle,
    calls: AtomicUsize,
}

impl TaintPropagationHandler for CancelOnFirstFact {
    fn notify_flow_in(
        &self,
        _stmt: StmtId,
        _taint: &AbsRef,
        _manager: &InfoflowManager,
        _kind: FlowFunctionType,
    ) {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.handle.abort();
        }
    }
}

fn straight_line() -> Program {
    let mut pb = program_builder();
    let mut m = pb.method(&main_method(), true);
    let x = m.local("x", Type::string());
    let y = m.local("y", Type::string());
    m.assign_static_call(Value::local(&x), &source_method(), vec![]);
    m.assign(Value::local(&y), Value::local(&x));
    m.call_static(&sink_method(), vec![Value::local(&y)]);
    m.ret_void();
    let main = m.finish();
    pb.entry_point(main);
    pb.build()
}

#[test]
fn test_zero_timeout_reports_data_flow_timeout() {
    let results = analyze(straight_line(), test_config().with_data_flow_timeout(Some(0)));
    assert!(results.was_aborted_timeout());
    assert!(results.termination_state().contains(TerminationState::DATA_FLOW_TIMEOUT));
    assert!(!results.is_complete());
}

#[test]
fn test_tiny_memory_budget_reports_out_of_memory() {
    let results = analyze(straight_line(), test_config().with_memory_budget(1));
    assert!(results.was_terminated_out_of_memory());
    assert!(results.termination_state().contains(TerminationState::DATA_FLOW_OOM));
    assert!(!results.is_complete());
}

#[test]
fn test_generous_budgets_complete() {
    let config = test_config()
        .with_data_flow_timeout(Some(60))
        .with_memory_budget(1 << 30);
    let results = analyze(straight_line(), config);
    assert_complete(&results);
    assert_eq!(results.len(), 1);
}

#[test]
fn test_cancel_during_propagation_reports_data_flow_cancelled() {
    let infoflow = Infoflow::new(test_config(), icfg(straight_line()), Arc::new(oracle()))
        .expect("valid configuration");
    let handler = Arc::new(CancelOnFirstFact {
        handle: infoflow.abort_handle(),
        calls: AtomicUsize::new(0),
    });
    let infoflow = infoflow.with_propagation_handler(handler.clone());

    let results = infoflow.run();
    assert!(handler.calls.load(Ordering::SeqCst) >= 1);
    assert!(results.termination_state().contains(TerminationState::DATA_FLOW_CANCELLED));
    assert!(results.was_cancelled());
    assert!(!results.termination_state().contains(TerminationState::DATA_FLOW_TIMEOUT));
    assert!(!results.is_complete());
}

#[test]
fn test_abort_analysis_before_run_cancels() {
    let infoflow = Infoflow::new(test_config(), icfg(straight_line()), Arc::new(oracle()))
        .expect("valid configuration");
    infoflow.abort_analysis();
    let results = infoflow.run();
    assert!(results.termination_state().contains(TerminationState::DATA_FLOW_CANCELLED));
    assert!(results.is_empty());
}

#[test]
fn test_tiny_path_memory_budget_reports_path_reconstruction_oom() {
    let config = test_config()
        .with_memory_budget(1 << 30)
        .with_path_memory_budget(Some(1));
    let results = analyze(straight_line(), config);

    let state = results.termination_state();
    assert!(state.contains(TerminationState::PATH_RECON_OOM));
    assert!(!state.contains(TerminationState::DATA_FLOW_OOM));
    assert!(results.was_terminated_out_of_memory());
    // The sink was reached, only the source pairing was cut
    assert_eq!(results.abstractions_at_sink().len(), 1);
    assert!(results.is_empty());
}

#[test]
fn test_zero_path_timeout_reports_path_reconstruction_timeout() {
    let config = test_config().with_path_reconstruction_timeout(Some(0));
    let results = analyze(straight_line(), config);
    let state = results.termination_state();
    assert!(state.contains(TerminationState::PATH_RECON_TIMEOUT));
    assert!(!state.contains(TerminationState::DATA_FLOW_TIMEOUT));
    assert_eq!(results.abstractions_at_sink().len(), 1);
}
