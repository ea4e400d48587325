//! Ordered rule chain

use super::{
    ArrayPropagationRule, ExceptionPropagationRule, ImplicitPropagationRule, KillFlags,
    PropagationRule, SinkPropagationRule, SkipSystemClassRule, SourcePropagationRule,
    StaticPropagationRule, StopAfterFirstKFlowsRule, StrongUpdatePropagationRule,
    TypingPropagationRule, WrapperPropagationRule,
};
use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, Stmt};
use std::sync::Arc;
use tracing::debug;

pub struct PropagationRuleManager {
    rules: Vec<Box<dyn PropagationRule>>,
}

impl PropagationRuleManager {
    /// Builds the chain enabled by the manager's configuration
    pub fn new(manager: &Arc<InfoflowManager>) -> Self {
        let config = manager.config();
        let mut rules: Vec<Box<dyn PropagationRule>> = vec![
            Box::new(SourcePropagationRule::new(Arc::clone(manager))),
            Box::new(SinkPropagationRule::new(Arc::clone(manager))),
            Box::new(StaticPropagationRule::new(Arc::clone(manager))),
        ];
        if config.enable_array_tracking {
            rules.push(Box::new(ArrayPropagationRule::new(Arc::clone(manager))));
        }
        if config.enable_exceptions {
            rules.push(Box::new(ExceptionPropagationRule::new(Arc::clone(manager))));
        }
        if manager.taint_wrapper().is_some() {
            rules.push(Box::new(WrapperPropagationRule::new(Arc::clone(manager))));
        }
        if config.implicit_flow_mode.track_control_flow_dependencies() {
            rules.push(Box::new(ImplicitPropagationRule::new(Arc::clone(manager))));
        }
        rules.push(Box::new(StrongUpdatePropagationRule::new(Arc::clone(manager))));
        if config.enable_type_checking {
            rules.push(Box::new(TypingPropagationRule::new(Arc::clone(manager))));
        }
        rules.push(Box::new(SkipSystemClassRule::new(Arc::clone(manager))));
        if config.stop_after_first_k_flows > 0 {
            rules.push(Box::new(StopAfterFirstKFlowsRule::new(
                Arc::clone(manager),
                config.stop_after_first_k_flows,
            )));
        }

        let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        debug!(rules = ?names, "Propagation rules configured");
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn apply_normal(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        dest: &Stmt,
        kill: &mut KillFlags,
    ) -> FactSet {
        let mut res = FactSet::default();
        for rule in &self.rules {
            if let Some(out) = rule.propagate_normal_flow(d1, source, stmt, dest, kill) {
                res.extend(out);
            }
            if kill.kill_all {
                crate::trace_flow!(rule = rule.name(), stmt = %stmt.id, "Normal flow killed");
                return FactSet::default();
            }
        }
        if !kill.kill_source {
            res.insert(Arc::clone(source));
        }
        res
    }

    /// `None` means no rule produced anything and nothing was killed
    pub fn apply_call(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let mut res: Option<FactSet> = None;
        for rule in &self.rules {
            if let Some(out) = rule.propagate_call_flow(d1, source, stmt, dest, kill) {
                res.get_or_insert_with(FactSet::default).extend(out);
            }
            if kill.kill_all {
                crate::trace_flow!(rule = rule.name(), stmt = %stmt.id, "Call flow killed");
                return None;
            }
        }
        res
    }

    pub fn apply_call_to_return(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        kill: &mut KillFlags,
        no_add_source: bool,
    ) -> FactSet {
        let mut res = FactSet::default();
        for rule in &self.rules {
            if let Some(out) = rule.propagate_call_to_return_flow(d1, source, stmt, kill) {
                res.extend(out);
            }
            if kill.kill_all {
                crate::trace_flow!(rule = rule.name(), stmt = %stmt.id, "Call-to-return flow killed");
                return FactSet::default();
            }
        }
        if !no_add_source && !kill.kill_source {
            res.insert(Arc::clone(source));
        }
        res
    }

    #[allow(clippy::too_many_arguments)]
    pub fn apply_return(
        &self,
        caller_d1s: &[AbsRef],
        callee_d1: &AbsRef,
        source: &AbsRef,
        exit: &Stmt,
        ret_site: Option<&Stmt>,
        call_site: Option<&Stmt>,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let mut res: Option<FactSet> = None;
        for rule in &self.rules {
            if let Some(out) =
                rule.propagate_return_flow(caller_d1s, callee_d1, source, exit, ret_site, call_site, kill)
            {
                res.get_or_insert_with(FactSet::default).extend(out);
            }
            if kill.kill_all {
                crate::trace_flow!(rule = rule.name(), stmt = %exit.id, "Return flow killed");
                return None;
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{manager_for, taint};
    use super::*;
    use crate::config::{ImplicitFlowMode, InfoflowConfig};
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{MethodRef, Program, ProgramBuilder, StmtId, Type, Value};
    use pretty_assertions::assert_eq;

    fn program() -> (Program, StmtId, StmtId, Value) {
        let mut pb = ProgramBuilder::new();
        pb.class("app.Main", None);
        let main = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let x = mb.local("x", Type::string());
        let nop = mb.nop();
        let overwrite = mb.assign(Value::local(&x), Value::string("clean"));
        mb.ret_void();
        let id = mb.finish();
        pb.entry_point(id);
        (pb.build(), nop, overwrite, Value::local(&x))
    }

    #[test]
    fn test_chain_follows_configuration() {
        let (p, ..) = program();
        let mgr = manager_for(p.clone(), InfoflowConfig::default(), MethodSourceSinkManager::new(), &[], &[]);
        assert_eq!(
            PropagationRuleManager::new(&mgr).rule_names(),
            vec![
                "source",
                "sink",
                "static_field",
                "array",
                "exception",
                "strong_update",
                "typing",
                "skip_system_class"
            ]
        );

        let config = InfoflowConfig {
            enable_exceptions: false,
            enable_type_checking: false,
            stop_after_first_k_flows: 1,
            ..InfoflowConfig::default()
        }
        .with_implicit_flow_mode(ImplicitFlowMode::AllImplicitFlows);
        let mgr = manager_for(p, config, MethodSourceSinkManager::new(), &[], &[]);
        assert_eq!(
            PropagationRuleManager::new(&mgr).rule_names(),
            vec![
                "source",
                "sink",
                "static_field",
                "array",
                "implicit",
                "strong_update",
                "skip_system_class",
                "stop_after_first_k_flows"
            ]
        );
    }

    #[test]
    fn test_source_is_kept_unless_killed() {
        let (p, nop, overwrite, x) = program();
        let mgr = manager_for(p, InfoflowConfig::default(), MethodSourceSinkManager::new(), &[], &[]);
        let rules = PropagationRuleManager::new(&mgr);
        let zero = Arc::clone(mgr.zero_value());
        let t = taint(&mgr, &x, StmtId(0));

        let mut kill = KillFlags::default();
        let kept = rules.apply_normal(&zero, &t, mgr.stmt(nop), mgr.stmt(overwrite), &mut kill);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains(&t));

        let mut kill = KillFlags::default();
        let killed = rules.apply_normal(&zero, &t, mgr.stmt(overwrite), mgr.stmt(overwrite), &mut kill);
        assert!(killed.is_empty());
        assert!(kill.kill_all);

        // The zero fact never survives a non-source statement
        let mut kill = KillFlags::default();
        assert!(rules
            .apply_normal(&zero, &zero, mgr.stmt(nop), mgr.stmt(overwrite), &mut kill)
            .is_empty());
    }
}
