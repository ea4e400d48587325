//! Library models applied at call sites

use super::{alias_target, KillFlags, PropagationRule};
use crate::config::StaticFieldTrackingMode;
use crate::features::abstraction::AbsRef;
use crate::features::aliasing::{base_matches, Aliasing};
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, Stmt, Type, Value};
use std::sync::Arc;

pub struct WrapperPropagationRule {
    manager: Arc<InfoflowManager>,
}

impl WrapperPropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self { manager }
    }

    /// The taint is the receiver or one of the arguments
    fn is_mentioned(&self, stmt: &Stmt, source: &AbsRef) -> bool {
        let (Some(inv), Some(plain)) = (stmt.invoke_expr(), source.access_path().plain_value())
        else {
            return false;
        };
        let plain = Value::local(plain);
        let aliasing = self.manager.aliasing();
        let on_base = inv
            .base
            .as_ref()
            .map_or(false, |b| aliasing.may_alias_values(&Value::local(b), &plain, &self.manager));
        on_base
            || inv
                .args
                .iter()
                .any(|arg| aliasing.may_alias_values(&plain, arg, &self.manager))
    }

    fn wrapper_taints(&self, d1: &AbsRef, stmt: &Stmt, source: &AbsRef) -> Option<FactSet> {
        if self.manager.is_zero(source) {
            return None;
        }
        let wrapper = self.manager.taint_wrapper()?;
        let ap = source.access_path();
        if !ap.is_static_field_ref() && !ap.is_empty() && !self.is_mentioned(stmt, source) {
            return None;
        }
        // Source calls produce their own taints
        if !self.manager.config().inspect_sources && self.manager.source_info(stmt.id).is_some() {
            return None;
        }

        let taints = wrapper.taints_for_method(stmt, d1, source, &self.manager)?;
        let mut res: FactSet = taints.iter().cloned().collect();
        let static_tracking =
            self.manager.config().static_field_tracking_mode != StaticFieldTrackingMode::None;
        for abs in &taints {
            if Arc::ptr_eq(abs, source) || **abs == **source {
                continue;
            }
            // A new heap taint may be visible through aliases of its base
            let val = abs.access_path();
            let Some(target) = alias_target(abs) else {
                continue;
            };
            let taints_object = matches!(val.base_type(), Some(Type::Ref(_)))
                && (!val.base_type().map_or(false, Type::is_string)
                    || val.can_have_immutable_aliases());
            let taints_static = static_tracking && val.is_static_field_ref();
            let overwritten = stmt
                .left_op()
                .map_or(false, |lhs| base_matches(&lhs, abs));
            if overwritten {
                continue;
            }
            if taints_static
                || (taints_object && val.taint_sub_fields())
                || Aliasing::can_have_aliases(stmt, &target, abs)
            {
                self.manager.aliasing().compute_aliases(
                    d1,
                    stmt.id,
                    &target,
                    &mut res,
                    stmt.method,
                    abs,
                    &self.manager,
                );
            }
        }
        Some(res)
    }
}

impl PropagationRule for WrapperPropagationRule {
    fn name(&self) -> &'static str {
        "wrapper"
    }

    fn propagate_call_to_return_flow(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let taints = self.wrapper_taints(d1, stmt, source)?;
        // A modelled copy of the incoming path replaces the incoming fact
        if let Some(same) = taints
            .iter()
            .find(|abs| abs.access_path() == source.access_path())
        {
            if !Arc::ptr_eq(same, source) {
                kill.kill_source = true;
            }
        }
        Some(taints)
    }

    fn propagate_call_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        if let Some(wrapper) = self.manager.taint_wrapper() {
            if wrapper.is_exclusive(stmt, source, &self.manager) {
                kill.kill_all = true;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::taint;
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::Abstraction;
    use crate::features::taint_analysis::infrastructure::icfg::ProgramIcfg;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::features::taint_analysis::ports::{InterproceduralCfg, TaintWrapper};
    use crate::shared::ir::{MethodRef, ProgramBuilder, StmtId};
    use rustc_hash::FxHashSet;

    /// `lhs = call(arg0)` copies the taint of the first argument to the result
    struct CopyArgWrapper;

    impl TaintWrapper for CopyArgWrapper {
        fn taints_for_method(
            &self,
            stmt: &Stmt,
            _d1: &AbsRef,
            taint: &AbsRef,
            manager: &InfoflowManager,
        ) -> Option<FxHashSet<AbsRef>> {
            let lhs = stmt.left_op()?;
            let ap = manager.ap_factory().create(&lhs, true);
            let mut out = FxHashSet::default();
            out.insert(Arc::clone(taint));
            out.insert(Abstraction::derive_new_abstraction(taint, ap, Some(stmt.id))?);
            Some(out)
        }

        fn is_exclusive(&self, _stmt: &Stmt, _taint: &AbsRef, _manager: &InfoflowManager) -> bool {
            true
        }

        fn aliases_for_method(
            &self,
            _stmt: &Stmt,
            _d1: &AbsRef,
            _taint: &AbsRef,
            _manager: &InfoflowManager,
        ) -> Option<FxHashSet<AbsRef>> {
            None
        }

        fn supports_callee(&self, _stmt: &Stmt) -> bool {
            true
        }
    }

    #[test]
    fn test_wrapper_models_library_call() {
        let concat = MethodRef::new("lib.Strings", "copy", vec![Type::string()], Type::string());
        let mut pb = ProgramBuilder::new();
        pb.class("app.Main", None);
        let main = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let x = mb.local("x", Type::string());
        let y = mb.local("y", Type::string());
        let z = mb.local("z", Type::string());
        let call = mb.assign_static_call(Value::local(&y), &concat, vec![Value::local(&x)]);
        mb.ret_void();
        let id = mb.finish();
        pb.entry_point(id);

        let icfg: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(Arc::new(pb.build())));
        let mgr = InfoflowManager::builder(
            Arc::new(InfoflowConfig::default()),
            icfg,
            Arc::new(MethodSourceSinkManager::new()),
        )
        .taint_wrapper(Some(Arc::new(CopyArgWrapper)))
        .build();
        let rule = WrapperPropagationRule::new(Arc::clone(&mgr));
        let zero = Arc::clone(mgr.zero_value());

        let tx = taint(&mgr, &Value::local(&x), StmtId(0));
        let mut kill = KillFlags::default();
        let res = rule
            .propagate_call_to_return_flow(&zero, &tx, mgr.stmt(call), &mut kill)
            .unwrap();
        assert!(res.iter().any(|f| f.access_path().plain_value() == Some(&y)));
        assert!(!kill.kill_source);

        // Unrelated taints are left to the other rules
        let tz = taint(&mgr, &Value::local(&z), StmtId(0));
        assert!(rule
            .propagate_call_to_return_flow(&zero, &tz, mgr.stmt(call), &mut kill)
            .is_none());

        let mut kill = KillFlags::default();
        rule.propagate_call_flow(&zero, &tx, mgr.stmt(call), id, &mut kill);
        assert!(kill.kill_all);
    }
}
