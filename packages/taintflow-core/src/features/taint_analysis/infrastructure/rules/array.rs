//! Array contents, lengths and tainted indices

use super::{singleton, KillFlags, PropagationRule};
use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::access_path::ArrayTaintType;
use crate::features::aliasing::Aliasing;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{Stmt, StmtKind, Type, Value};
use std::sync::Arc;

pub struct ArrayPropagationRule {
    manager: Arc<InfoflowManager>,
}

impl ArrayPropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }

    fn reads_taint(&self, source: &AbsRef, val: &Value) -> bool {
        source.access_path().plain_value().map_or(false, |p| {
            self.manager
                .aliasing()
                .may_alias_values(&Value::local(p), val, &self.manager)
        })
    }

    fn derive(&self, source: &AbsRef, stmt: &Stmt, lhs: &Value, rhs: &Value) -> Option<AbsRef> {
        let ap = source.access_path();
        let factory = self.manager.ap_factory();
        let config = self.manager.config();
        match rhs {
            // i = lengthof a
            Value::Length(op) => {
                if !self.reads_taint(source, op) || ap.array_taint_type() == ArrayTaintType::Contents {
                    return None;
                }
                let new_ap =
                    factory.create_typed(lhs, Some(Type::Int), true, ArrayTaintType::ContentsAndLength);
                Abstraction::derive_new_abstraction(source, new_ap, Some(stmt.id))
            }
            // y = x[i]
            Value::ArrayRef { base, index } => {
                if ap.array_taint_type() == ArrayTaintType::Length {
                    return None;
                }
                if ap.plain_value() == Some(base) {
                    // One dimension less, A[][] -> A[]
                    let target = ap.base_type().and_then(|t| t.element_type()).cloned();
                    let new_ap = factory.copy_with_new_value_full(
                        ap,
                        lhs,
                        target,
                        false,
                        true,
                        ap.array_taint_type(),
                    );
                    return Abstraction::derive_new_abstraction(source, new_ap, Some(stmt.id));
                }
                let index_tainted = index.as_local().is_some() && index.as_local() == ap.plain_value();
                if index_tainted && config.implicit_flow_mode.track_array_accesses() {
                    let new_ap = factory.copy_with_new_value_full(
                        ap,
                        lhs,
                        None,
                        false,
                        true,
                        ArrayTaintType::ContentsAndLength,
                    );
                    return Abstraction::derive_new_abstraction(source, new_ap, Some(stmt.id));
                }
                None
            }
            // y = new A[i]
            Value::NewArray { size, .. } if config.enable_array_size_tainting => {
                if !self.reads_taint(source, size) {
                    return None;
                }
                let new_ap =
                    factory.copy_with_new_value_full(ap, lhs, None, false, true, ArrayTaintType::Length);
                Abstraction::derive_new_abstraction(source, new_ap, Some(stmt.id))
            }
            _ => None,
        }
    }
}

impl PropagationRule for ArrayPropagationRule {
    fn name(&self) -> &'static str {
        "array"
    }

    fn propagate_normal_flow(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: &Stmt,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let StmtKind::Assign { lhs, rhs } = &stmt.kind else {
            return None;
        };
        if source.access_path().is_empty() {
            return None;
        }
        let new_abs = self.derive(source, stmt, lhs, rhs)?;

        let mut res = singleton(Arc::clone(&new_abs));
        if Aliasing::can_have_aliases(stmt, lhs, &new_abs) {
            self.manager.aliasing().compute_aliases(
                d1,
                stmt.id,
                lhs,
                &mut res,
                stmt.method,
                &new_abs,
                &self.manager,
            );
        }
        Some(res)
    }
}
