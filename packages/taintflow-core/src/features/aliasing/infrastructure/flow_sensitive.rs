//! On-demand backward alias search
//!
//! A new heap taint is turned into an inactive copy and handed to the alias
//! solver at the predecessors of the statement that created it. The alias
//! solver walks the reversed graph and injects every alias it finds back
//! into the forward solver, where it activates once execution passes the
//! creating statement again.

use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::aliasing::ports::AliasingStrategy;
use crate::features::ifds_solver::{FactSet, PathEdge};
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, StmtId, Value};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
pub struct FlowSensitiveAliasStrategy;

impl FlowSensitiveAliasStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl AliasingStrategy for FlowSensitiveAliasStrategy {
    fn name(&self) -> &'static str {
        "flow_sensitive"
    }

    fn compute_alias_taints(
        &self,
        d1: &AbsRef,
        src: StmtId,
        _target_value: &Value,
        _taint_set: &mut FactSet,
        _method: MethodId,
        new_abs: &AbsRef,
        manager: &InfoflowManager,
    ) {
        let Some(solver) = manager.alias_solver() else {
            return;
        };
        let fsa = manager.config().effective_flow_sensitive_aliasing();
        let bw = Abstraction::derive_inactive_abstraction(new_abs, src, fsa);
        for &pred in manager.icfg().preds_of(src) {
            trace!(stmt = %src, pred = %pred, fact = %bw, "Backward alias search");
            solver.process_edge(PathEdge::new(Arc::clone(d1), pred, Arc::clone(&bw)));
        }
    }

    fn inject_calling_context(
        &self,
        d3: &AbsRef,
        callee: MethodId,
        call_site: StmtId,
        d2: &AbsRef,
        d1: &AbsRef,
        manager: &InfoflowManager,
    ) {
        if let Some(solver) = manager.alias_solver() {
            solver.inject_context(callee, d3, call_site, d2, d1);
        }
    }

    fn is_flow_sensitive(&self) -> bool {
        true
    }

    fn requires_analysis_on_return(&self) -> bool {
        false
    }
}
