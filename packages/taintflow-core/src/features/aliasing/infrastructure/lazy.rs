//! Interactive aliasing: taints are not duplicated for aliases up front;
//! every read site instead asks whether the tainted path may alias the value
//! read there

use crate::features::abstraction::AbsRef;
use crate::features::access_path::ApRef;
use crate::features::aliasing::ports::AliasingStrategy;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::features::taint_analysis::ports::PtsTarget;
use crate::shared::ir::{MethodId, StmtId, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct LazyAliasStrategy;

impl LazyAliasStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl AliasingStrategy for LazyAliasStrategy {
    fn name(&self) -> &'static str {
        "lazy"
    }

    fn compute_alias_taints(
        &self,
        _d1: &AbsRef,
        _src: StmtId,
        _target_value: &Value,
        _taint_set: &mut FactSet,
        _method: MethodId,
        _new_abs: &AbsRef,
        _manager: &InfoflowManager,
    ) {
    }

    fn is_flow_sensitive(&self) -> bool {
        true
    }

    fn is_interactive(&self) -> bool {
        true
    }

    fn may_alias(&self, ap1: &ApRef, ap2: &ApRef, manager: &InfoflowManager) -> bool {
        if ap1 == ap2 {
            return true;
        }
        match (PtsTarget::of_access_path(ap1), PtsTarget::of_access_path(ap2)) {
            (Some(a), Some(b)) => manager.points_to().may_alias(a, b),
            _ => false,
        }
    }

    fn requires_analysis_on_return(&self) -> bool {
        false
    }

    fn is_lazy_analysis(&self) -> bool {
        true
    }
}
