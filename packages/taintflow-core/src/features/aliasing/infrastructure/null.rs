//! Strategy that reports no aliases at all

use crate::features::abstraction::AbsRef;
use crate::features::aliasing::ports::AliasingStrategy;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, StmtId, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAliasStrategy;

impl AliasingStrategy for NullAliasStrategy {
    fn name(&self) -> &'static str {
        "none"
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
        false
    }

    fn requires_analysis_on_return(&self) -> bool {
        false
    }
}
