//! Static field taints across call boundaries

use super::{singleton, KillFlags, PropagationRule};
use crate::config::StaticFieldTrackingMode;
use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, Stmt};
use std::sync::Arc;

pub struct StaticPropagationRule {
    manager: Arc<InfoflowManager>,
}

impl StaticPropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }

    fn tracking_disabled(&self) -> bool {
        self.manager.config().static_field_tracking_mode == StaticFieldTrackingMode::None
    }
}

impl PropagationRule for StaticPropagationRule {
    fn name(&self) -> &'static str {
        "static_field"
    }

    fn propagate_call_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let ap = source.access_path();
        if self.tracking_disabled()
            && (self.manager.method(dest).is_static_initializer() || ap.is_static_field_ref())
        {
            kill.kill_all = true;
            return None;
        }
        if !ap.is_static_field_ref() {
            return None;
        }

        // Only callees that read the field (transitively) need the taint
        let field = ap.first_field()?;
        let lazy = self.manager.aliasing().strategy().is_lazy_analysis();
        if lazy || self.manager.icfg().is_static_field_read(dest, field) {
            let abs = Abstraction::derive_new_abstraction(source, Some(Arc::clone(ap)), Some(stmt.id))?;
            return Some(singleton(abs));
        }
        None
    }

    fn propagate_call_to_return_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        _stmt: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        if self.tracking_disabled() && source.access_path().is_static_field_ref() {
            kill.kill_all = true;
        }
        None
    }

    fn propagate_return_flow(
        &self,
        _caller_d1s: &[AbsRef],
        _callee_d1: &AbsRef,
        source: &AbsRef,
        exit: &Stmt,
        _ret_site: Option<&Stmt>,
        _call_site: Option<&Stmt>,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let ap = source.access_path();
        if !ap.is_static_field_ref() {
            return None;
        }
        if self.tracking_disabled() {
            kill.kill_all = true;
            return None;
        }
        let abs = Abstraction::derive_new_abstraction(source, Some(Arc::clone(ap)), Some(exit.id))?;
        Some(singleton(abs))
    }
}
