//! Drops taints that cannot survive a cast

use super::{KillFlags, PropagationRule};
use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{Stmt, Value};
use std::sync::Arc;

pub struct TypingPropagationRule {
    manager: Arc<InfoflowManager>,
}

impl TypingPropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }
}

impl PropagationRule for TypingPropagationRule {
    fn name(&self) -> &'static str {
        "typing"
    }

    fn propagate_normal_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let ap = source.access_path();
        if ap.is_static_field_ref() || !stmt.is_definition() {
            return None;
        }
        if let Some(Value::Cast { cast_type, op }) = stmt.right_op() {
            let casts_taint = op.as_local().is_some() && op.as_local() == ap.plain_value();
            if casts_taint && !self.manager.type_utils().check_cast_ap(ap, cast_type) {
                kill.kill_all = true;
            }
        }
        None
    }
}
