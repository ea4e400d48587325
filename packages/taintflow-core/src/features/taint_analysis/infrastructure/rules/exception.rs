//! Tainted exception objects: throw, unwind, catch

use super::{singleton, KillFlags, PropagationRule};
use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{Stmt, StmtKind, Value};
use std::sync::Arc;

pub struct ExceptionPropagationRule {
    manager: Arc<InfoflowManager>,
}

impl ExceptionPropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }

    fn throws_taint(&self, source: &AbsRef, op: &Value) -> bool {
        source.access_path().plain_value().map_or(false, |p| {
            self.manager
                .aliasing()
                .may_alias_values(&Value::local(p), op, &self.manager)
        })
    }
}

impl PropagationRule for ExceptionPropagationRule {
    fn name(&self) -> &'static str {
        "exception"
    }

    fn propagate_normal_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        if self.manager.is_zero(source) {
            return None;
        }

        // Thrown taint lands in the handler's local
        if source.exception_thrown() && stmt.is_caught_exception_def() {
            kill.kill_source = true;
            let lhs = stmt.left_op()?;
            let ap = self
                .manager
                .ap_factory()
                .copy_with_new_value(source.access_path(), &lhs);
            return Abstraction::derive_on_catch(source, ap).map(singleton);
        }

        if let StmtKind::Throw(op) = &stmt.kind {
            if self.throws_taint(source, op) {
                kill.kill_source = true;
                return Some(singleton(Abstraction::derive_on_throw(source, stmt.id)));
            }
        }
        None
    }

    fn propagate_return_flow(
        &self,
        _caller_d1s: &[AbsRef],
        _callee_d1: &AbsRef,
        source: &AbsRef,
        exit: &Stmt,
        ret_site: Option<&Stmt>,
        _call_site: Option<&Stmt>,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let ret_site = ret_site?;
        if !ret_site.is_caught_exception_def() {
            return None;
        }
        match &exit.kind {
            StmtKind::Throw(op) if self.throws_taint(source, op) => {
                Some(singleton(Abstraction::derive_on_throw(source, exit.id)))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{manager_for, taint};
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{MethodRef, ProgramBuilder, StmtId, Type};

    #[test]
    fn test_thrown_taint_is_caught_into_handler_local() {
        let ex_ty = Type::class("app.Failure");
        let mut pb = ProgramBuilder::new();
        pb.class("app.Main", None);
        pb.class("app.Failure", None);
        let main = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let e = mb.local("e", ex_ty.clone());
        let caught = mb.local("caught", ex_ty.clone());
        let throw = mb.throw(Value::local(&e));
        let handler = mb.catch_into(&caught);
        mb.ret_void();
        mb.trap(throw, throw, handler, ex_ty);
        let id = mb.finish();
        pb.entry_point(id);

        let mgr = manager_for(pb.build(), InfoflowConfig::default(), MethodSourceSinkManager::new(), &[], &[]);
        let rule = ExceptionPropagationRule::new(Arc::clone(&mgr));
        let zero = Arc::clone(mgr.zero_value());
        let t = taint(&mgr, &Value::local(&e), StmtId(0));

        let mut kill = KillFlags::default();
        let thrown = rule
            .propagate_normal_flow(&zero, &t, mgr.stmt(throw), mgr.stmt(handler), &mut kill)
            .unwrap();
        assert!(kill.kill_source);
        let thrown = thrown.into_iter().next().unwrap();
        assert!(thrown.exception_thrown());

        let mut kill = KillFlags::default();
        let caught_facts = rule
            .propagate_normal_flow(&zero, &thrown, mgr.stmt(handler), mgr.stmt(handler), &mut kill)
            .unwrap();
        let fact = caught_facts.iter().next().unwrap();
        assert_eq!(fact.access_path().plain_value(), Some(&caught));
        assert!(!fact.exception_thrown());
    }
}
