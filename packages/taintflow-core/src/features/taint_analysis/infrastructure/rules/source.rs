//! Creates taints at source statements

use super::{KillFlags, PropagationRule};
use crate::features::abstraction::{AbsRef, Abstraction, SourceContext};
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, Stmt};
use std::sync::Arc;

pub struct SourcePropagationRule {
    manager: Arc<InfoflowManager>,
}

impl SourcePropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }

    /// The zero fact never travels on; at a source it turns into new taints
    fn propagate(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        kill: &mut KillFlags,
        may_kill_all: bool,
    ) -> Option<FactSet> {
        if !self.manager.is_zero(source) {
            return None;
        }
        kill.kill_source = true;

        let info = match self.manager.source_info(stmt.id) {
            Some(info) if !info.access_paths.is_empty() => info,
            _ => {
                if may_kill_all {
                    kill.kill_all = true;
                }
                return None;
            }
        };

        let mut res = FactSet::default();
        let uses = stmt.uses();
        for ap in &info.access_paths {
            let ctx = SourceContext::new(
                Arc::clone(&info.definition),
                Arc::clone(ap),
                stmt.id,
                info.user_data.clone(),
            );
            let abs: AbsRef = Arc::new(Abstraction::new_source(ctx, false, false));
            res.insert(Arc::clone(&abs));

            // The oracle may taint a value that stays reachable through aliases
            for val in &uses {
                if !ap.starts_with(val) {
                    continue;
                }
                if val.ty().is_string() && !ap.can_have_immutable_aliases() {
                    continue;
                }
                self.manager.aliasing().compute_aliases(
                    d1,
                    stmt.id,
                    val,
                    &mut res,
                    stmt.method,
                    &abs,
                    &self.manager,
                );
            }
        }
        crate::trace_flow!(stmt = %stmt.id, taints = res.len(), "Source taints created");
        Some(res)
    }
}

impl PropagationRule for SourcePropagationRule {
    fn name(&self) -> &'static str {
        "source"
    }

    fn propagate_normal_flow(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        self.propagate(d1, source, stmt, kill, true)
    }

    fn propagate_call_to_return_flow(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        self.propagate(d1, source, stmt, kill, false)
    }

    fn propagate_call_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let config = self.manager.config();
        if !config.inspect_sources && self.manager.is_source_stmt(stmt.id) {
            kill.kill_all = true;
        }
        if !config.inspect_sinks
            && self.manager.is_sink_stmt(stmt.id)
            && self
                .manager
                .source_sink_oracle()
                .sink_info(stmt, &self.manager, Some(source.access_path()))
                .is_some()
        {
            kill.kill_all = true;
        }
        None
    }
}
