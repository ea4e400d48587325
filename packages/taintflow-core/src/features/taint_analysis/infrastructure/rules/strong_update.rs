//! Kills taints whose value is overwritten

use super::{KillFlags, PropagationRule};
use crate::features::abstraction::AbsRef;
use crate::features::aliasing::Aliasing;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{Stmt, StmtKind, Value};
use std::sync::Arc;

pub struct StrongUpdatePropagationRule {
    manager: Arc<InfoflowManager>,
}

impl StrongUpdatePropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }

    /// The alias solver activated `source` exactly here; the write is what it aliased
    fn just_activated(source: &AbsRef, stmt: &Stmt) -> bool {
        source.predecessor().map_or(false, |pred| {
            !pred.is_abstraction_active()
                && pred.activation_unit() == Some(stmt.id)
                && pred.access_path() == source.access_path()
        })
    }
}

impl PropagationRule for StrongUpdatePropagationRule {
    fn name(&self) -> &'static str {
        "strong_update"
    }

    fn propagate_normal_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let StmtKind::Assign { lhs, .. } = &stmt.kind else {
            return None;
        };
        // Writing one element never overwrites the whole array
        if matches!(lhs, Value::ArrayRef { .. }) {
            return None;
        }
        if !source.is_abstraction_active() && source.current_stmt() == Some(stmt.id) {
            return None;
        }
        if Self::just_activated(source, stmt) {
            return None;
        }

        let ap = source.access_path();
        if ap.is_instance_field_ref() {
            let Some(plain) = ap.plain_value() else {
                return None;
            };
            match lhs {
                Value::InstanceField { base, field } => {
                    let base_aliases = if source.is_abstraction_active() {
                        Aliasing::must_alias(base, plain, stmt.id)
                    } else {
                        base == plain
                    };
                    let field_aliases = ap
                        .first_field()
                        .map_or(false, |f| Aliasing::must_alias_fields(field, f));
                    if base_aliases && field_aliases {
                        kill.kill_all = true;
                    }
                }
                Value::Local(l) if Aliasing::must_alias(l, plain, stmt.id) => {
                    kill.kill_all = true;
                }
                _ => {}
            }
        } else if ap.is_static_field_ref() {
            if let Value::StaticField(field) = lhs {
                if ap.first_field() == Some(field) {
                    kill.kill_all = true;
                }
            }
        } else if let (Some(plain), Value::Local(l)) = (ap.plain_value(), lhs) {
            if l == plain {
                // `x = x + 1` keeps the taint alive through the rhs
                let reads_self = stmt.uses().iter().any(|u| u.as_local() == Some(plain));
                kill.kill_all = !reads_self;
                kill.kill_source = true;
            }
        }
        None
    }

    fn propagate_call_to_return_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let StmtKind::Assign {
            lhs: Value::Local(l),
            ..
        } = &stmt.kind
        else {
            return None;
        };
        let ap = source.access_path();
        if ap.is_static_field_ref() {
            return None;
        }
        if let Some(plain) = ap.plain_value() {
            if self
                .manager
                .aliasing()
                .may_alias_values(&Value::local(l), &Value::local(plain), &self.manager)
            {
                kill.kill_source = true;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{manager_for, taint};
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{BinOp, Field, MethodRef, ProgramBuilder, StmtId, Type};

    #[test]
    fn test_overwrites_kill_taints() {
        let f = Field::instance("app.Box", "f", Type::string());
        let mut pb = ProgramBuilder::new();
        pb.class("app.Main", None);
        pb.class("app.Box", None);
        let main = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let x = mb.local("x", Type::string());
        let n = mb.local("n", Type::Int);
        let o = mb.local("o", Type::class("app.Box"));
        let overwrite_x = mb.assign(Value::local(&x), Value::string("clean"));
        let overwrite_f = mb.assign(Value::field(&o, &f), Value::null());
        let increment = mb.assign(
            Value::local(&n),
            Value::Binary {
                op: BinOp::Add,
                lhs: Box::new(Value::local(&n)),
                rhs: Box::new(Value::int(1)),
            },
        );
        mb.ret_void();
        let id = mb.finish();
        pb.entry_point(id);

        let mgr = manager_for(pb.build(), InfoflowConfig::default(), MethodSourceSinkManager::new(), &[], &[]);
        let rule = StrongUpdatePropagationRule::new(Arc::clone(&mgr));
        let zero = Arc::clone(mgr.zero_value());

        let tx = taint(&mgr, &Value::local(&x), StmtId(0));
        let mut kill = KillFlags::default();
        rule.propagate_normal_flow(&zero, &tx, mgr.stmt(overwrite_x), mgr.stmt(overwrite_f), &mut kill);
        assert!(kill.kill_all);

        let tf = taint(&mgr, &Value::field(&o, &f), StmtId(0));
        let mut kill = KillFlags::default();
        rule.propagate_normal_flow(&zero, &tf, mgr.stmt(overwrite_f), mgr.stmt(increment), &mut kill);
        assert!(kill.kill_all);

        let tn = taint(&mgr, &Value::local(&n), StmtId(0));
        let mut kill = KillFlags::default();
        rule.propagate_normal_flow(&zero, &tn, mgr.stmt(increment), mgr.stmt(increment), &mut kill);
        assert!(!kill.kill_all);
        assert!(kill.kill_source);
    }
}
