//! Steps over runtime methods that never move taints

use super::{singleton, KillFlags, PropagationRule};
use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::types::OBJECT_CLASS;
use crate::shared::ir::{Method, MethodId, Stmt};
use std::sync::Arc;

const THREAD_CLASS: &str = "java.lang.Thread";

pub struct SkipSystemClassRule {
    manager: Arc<InfoflowManager>,
}

impl SkipSystemClassRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }

    fn is_system_method(method: &Method) -> bool {
        match method.class() {
            OBJECT_CLASS => matches!(method.name(), "<init>" | "<clinit>" | "getClass"),
            THREAD_CLASS => method.is_constructor(),
            _ => false,
        }
    }
}

impl PropagationRule for SkipSystemClassRule {
    fn name(&self) -> &'static str {
        "skip_system_class"
    }

    fn propagate_call_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        if Self::is_system_method(self.manager.method(dest)) {
            kill.kill_all = true;
        }
        None
    }

    fn propagate_call_to_return_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let callees = self.manager.icfg().callees_of_call_at(stmt.id);
        let all_system = !callees.is_empty()
            && callees
                .iter()
                .all(|&m| Self::is_system_method(self.manager.method(m)));
        all_system.then(|| singleton(Arc::clone(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{manager_for, taint};
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{MethodRef, ProgramBuilder, StmtId, Type, Value};

    #[test]
    fn test_object_constructor_is_stepped_over() {
        let init = MethodRef::new(OBJECT_CLASS, "<init>", vec![], Type::Void);
        let mut pb = ProgramBuilder::new();
        pb.library_class(OBJECT_CLASS, None);
        pb.class("app.Main", Some(OBJECT_CLASS));
        let init_id = pb.declare_method(&init, false);
        let main = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let o = mb.local("o", Type::object());
        let call = mb.call_virtual(&o, &init, vec![]);
        mb.ret_void();
        let id = mb.finish();
        pb.entry_point(id);

        let mgr = manager_for(pb.build(), InfoflowConfig::default(), MethodSourceSinkManager::new(), &[], &[]);
        let rule = SkipSystemClassRule::new(Arc::clone(&mgr));
        let zero = Arc::clone(mgr.zero_value());
        let t = taint(&mgr, &Value::local(&o), StmtId(0));

        let mut kill = KillFlags::default();
        rule.propagate_call_flow(&zero, &t, mgr.stmt(call), init_id, &mut kill);
        assert!(kill.kill_all);

        let mut kill = KillFlags::default();
        let kept = rule.propagate_call_to_return_flow(&zero, &t, mgr.stmt(call), &mut kill);
        assert_eq!(kept.map(|s| s.len()), Some(1));
    }
}
