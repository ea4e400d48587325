//! Records active taints that reach a sink

use super::{KillFlags, PropagationRule};
use crate::features::abstraction::{AbsRef, AbstractionAtSink};
use crate::features::aliasing::select_base_list;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, Stmt, StmtKind, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct SinkPropagationRule {
    manager: Arc<InfoflowManager>,
    /// A result handler asked to stop
    kill_state: AtomicBool,
}

impl SinkPropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self {
            manager,
            kill_state: AtomicBool::new(false),
        }
    }

    fn record(&self, source: &AbsRef, stmt: &Stmt) {
        let Some(info) = self.manager.source_sink_oracle().sink_info(
            stmt,
            &self.manager,
            Some(source.access_path()),
        ) else {
            return;
        };
        let at_sink = AbstractionAtSink::new(info.definition, Arc::clone(source), stmt.id);
        if !self.manager.add_result(at_sink) {
            self.kill_state.store(true, Ordering::SeqCst);
        }
    }

    /// `val` reads the tainted value at a sink statement
    fn check_for_sink(&self, source: &AbsRef, stmt: &Stmt, val: &Value) {
        if !self.manager.is_sink_stmt(stmt.id) || !source.is_abstraction_active() {
            return;
        }
        let Some(plain) = source.access_path().plain_value() else {
            return;
        };
        let plain = Value::local(plain);
        let aliasing = self.manager.aliasing();
        if select_base_list(val, false)
            .iter()
            .any(|v| aliasing.may_alias_values(v, &plain, &self.manager))
        {
            self.record(source, stmt);
        }
    }

    /// Some argument or the receiver of the call carries the taint
    fn is_taint_visible_in_callee(&self, stmt: &Stmt, source: &AbsRef) -> bool {
        let Some(inv) = stmt.invoke_expr() else {
            return false;
        };
        let ap = source.access_path();
        let Some(plain) = ap.plain_value() else {
            return false;
        };
        let plain_val = Value::local(plain);
        let aliasing = self.manager.aliasing();
        let in_args = inv
            .args
            .iter()
            .any(|arg| aliasing.may_alias_values(arg, &plain_val, &self.manager));
        if in_args && (ap.taint_sub_fields() || ap.is_local()) {
            return true;
        }
        inv.base.as_ref() == Some(plain)
    }

    fn kill_state(&self) -> bool {
        self.kill_state.load(Ordering::SeqCst)
    }
}

impl PropagationRule for SinkPropagationRule {
    fn name(&self) -> &'static str {
        "sink"
    }

    fn propagate_normal_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: &Stmt,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        match &stmt.kind {
            StmtKind::Return(v) | StmtKind::If { cond: v, .. } => self.check_for_sink(source, stmt, v),
            StmtKind::Assign { rhs, .. } => self.check_for_sink(source, stmt, rhs),
            _ => {}
        }
        None
    }

    fn propagate_call_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        _dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        kill.kill_all |= self.kill_state();
        None
    }

    fn propagate_call_to_return_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let ap = source.access_path();
        if self.manager.is_sink_stmt(stmt.id)
            && source.is_abstraction_active()
            && !ap.is_empty()
            && !ap.is_static_field_ref()
            && (!stmt.contains_invoke() || self.is_taint_visible_in_callee(stmt, source))
        {
            self.record(source, stmt);
        }
        kill.kill_all |= self.kill_state();
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
        if let StmtKind::Return(op) = &exit.kind {
            let ap = source.access_path();
            let matches = ap.is_local() || ap.taint_sub_fields();
            let returns_taint = ap
                .plain_value()
                .map_or(false, |p| {
                    self.manager
                        .aliasing()
                        .may_alias_values(&Value::local(p), op, &self.manager)
                });
            if matches
                && source.is_abstraction_active()
                && returns_taint
                && self.manager.is_sink_stmt(exit.id)
            {
                self.record(source, exit);
            }
        }
        kill.kill_all |= self.kill_state();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{manager_for, taint};
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::Abstraction;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{Field, Local, MethodRef, ProgramBuilder, StmtId, Type};

    struct Fixture {
        mgr: Arc<InfoflowManager>,
        call: StmtId,
        x: Local,
        o: Local,
    }

    fn fixture() -> Fixture {
        let sink_m = MethodRef::new("app.Log", "write", vec![Type::string()], Type::Void);
        let mut pb = ProgramBuilder::new();
        pb.class("app.Main", None);
        pb.class("app.Box", None);
        let main = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let x = mb.local("x", Type::string());
        let o = mb.local("o", Type::class("app.Box"));
        let call = mb.call_static(&sink_m, vec![Value::local(&x)]);
        mb.ret_void();
        let id = mb.finish();
        pb.entry_point(id);
        let oracle = MethodSourceSinkManager::new().with_sink(&sink_m);
        let mgr = manager_for(pb.build(), InfoflowConfig::default(), oracle, &[], &[call]);
        Fixture { mgr, call, x, o }
    }

    #[test]
    fn test_active_argument_taint_is_reported() {
        let f = fixture();
        let rule = SinkPropagationRule::new(Arc::clone(&f.mgr));
        let t = taint(&f.mgr, &Value::local(&f.x), StmtId(0));
        let zero = Arc::clone(f.mgr.zero_value());

        let mut kill = KillFlags::default();
        rule.propagate_call_to_return_flow(&zero, &t, f.mgr.stmt(f.call), &mut kill);
        assert_eq!(f.mgr.results().len(), 1);
        assert!(!kill.kill_all);
    }

    #[test]
    fn test_inactive_and_unrelated_taints_are_ignored() {
        let f = fixture();
        let rule = SinkPropagationRule::new(Arc::clone(&f.mgr));
        let zero = Arc::clone(f.mgr.zero_value());

        let t = taint(&f.mgr, &Value::local(&f.x), StmtId(0));
        let inactive = Abstraction::derive_inactive_abstraction(&t, f.call, true);
        let mut kill = KillFlags::default();
        rule.propagate_call_to_return_flow(&zero, &inactive, f.mgr.stmt(f.call), &mut kill);

        let field = Field::instance("app.Box", "f", Type::string());
        let other = taint(&f.mgr, &Value::field(&f.o, &field), StmtId(0));
        rule.propagate_call_to_return_flow(&zero, &other, f.mgr.stmt(f.call), &mut kill);

        assert!(f.mgr.results().is_empty());
    }
}
