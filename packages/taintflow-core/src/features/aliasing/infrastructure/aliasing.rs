/*
 * Aliasing Controller
 *
 * Front door for every alias question the forward analysis asks:
 * - compute_aliases : new heap taint created, find its aliases
 * - may_alias       : does a tainted access path cover a value read here
 * - can_have_aliases: cheap pre-filters before any search is started
 *
 * Facts inside a conditionally called method (empty access path, not the
 * zero fact) have no calling context a solver could use, so their aliases
 * come from the method-wide implicit-flow approximation instead of the
 * configured strategy.
 */

use super::flow_sensitive::FlowSensitiveAliasStrategy;
use super::implicit_flow::ImplicitFlowAliasStrategy;
use super::lazy::LazyAliasStrategy;
use super::null::NullAliasStrategy;
use super::pts_based::PtsBasedAliasStrategy;
use crate::config::{AliasingAlgorithm, InfoflowConfig};
use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::access_path::ApRef;
use crate::features::aliasing::ports::AliasingStrategy;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{Field, Local, MethodId, Stmt, StmtId, Value};
use tracing::trace;

pub struct Aliasing {
    strategy: Box<dyn AliasingStrategy>,
    implicit: ImplicitFlowAliasStrategy,
}

impl Aliasing {
    pub fn new(strategy: Box<dyn AliasingStrategy>) -> Self {
        Self {
            strategy,
            implicit: ImplicitFlowAliasStrategy::new(),
        }
    }

    pub fn for_config(config: &InfoflowConfig) -> Self {
        let strategy: Box<dyn AliasingStrategy> = match config.aliasing_algorithm {
            AliasingAlgorithm::FlowSensitive => Box::new(FlowSensitiveAliasStrategy::new()),
            AliasingAlgorithm::PtsBased => Box::new(PtsBasedAliasStrategy::new()),
            AliasingAlgorithm::Lazy => Box::new(LazyAliasStrategy::new()),
            AliasingAlgorithm::None => Box::new(NullAliasStrategy),
        };
        Self::new(strategy)
    }

    pub fn strategy(&self) -> &dyn AliasingStrategy {
        self.strategy.as_ref()
    }

    // ========================================================================
    // Alias search
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    pub fn compute_aliases(
        &self,
        d1: &AbsRef,
        src: StmtId,
        target_value: &Value,
        taint_set: &mut FactSet,
        method: MethodId,
        new_abs: &AbsRef,
        manager: &InfoflowManager,
    ) {
        if !Self::can_have_aliases_ap(new_abs.access_path()) {
            return;
        }
        if !manager.is_conditional(d1) {
            self.strategy
                .compute_alias_taints(d1, src, target_value, taint_set, method, new_abs, manager);
        } else if matches!(target_value, Value::InstanceField { .. }) {
            trace!(stmt = %src, "Aliases inside conditional call");
            self.implicit
                .compute_alias_taints(d1, src, target_value, taint_set, method, new_abs, manager);
        }
    }

    /// Forwards a new calling context to the strategy
    pub fn inject_calling_context(
        &self,
        d3: &AbsRef,
        callee: MethodId,
        call_site: StmtId,
        d2: &AbsRef,
        d1: &AbsRef,
        manager: &InfoflowManager,
    ) {
        self.strategy
            .inject_calling_context(d3, callee, call_site, d2, d1, manager);
    }

    // ========================================================================
    // Pre-filters
    // ========================================================================

    /// Whether tainting `val` at `stmt` can create aliases worth searching for
    pub fn can_have_aliases(stmt: &Stmt, val: &Value, source: &Abstraction) -> bool {
        if stmt.is_definition() {
            // A fully overwritten local has no aliases left
            if let Some(Value::Local(lhs)) = stmt.left_op() {
                if source.access_path().plain_value() == Some(&lhs) {
                    return false;
                }
            }
            if matches!(val, Value::ArrayRef { .. }) || val.is_field_ref() {
                return true;
            }
        }

        let ty = val.ty();
        if ty.is_primitive() || val.is_constant() {
            return false;
        }
        if ty.is_string() && !source.access_path().can_have_immutable_aliases() {
            return false;
        }
        match val {
            Value::InstanceField { .. } | Value::StaticField(_) => true,
            Value::Local(l) => l.ty().is_array(),
            _ => false,
        }
    }

    pub fn can_have_aliases_ap(ap: &ApRef) -> bool {
        if ap.base_type().map_or(false, |t| t.is_string()) && !ap.can_have_immutable_aliases() {
            return false;
        }
        if ap.is_static_field_ref() {
            !ap.first_field_type().map_or(false, |t| t.is_primitive())
        } else {
            !ap.base_type().map_or(false, |t| t.is_primitive())
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Access path of the taint `ap` that covers `val`, if any.
    ///
    /// Usually `ap` itself; with recursive access paths it may be the
    /// expansion of a registered base.
    pub fn may_alias(&self, ap: &ApRef, val: &Value, manager: &InfoflowManager) -> Option<ApRef> {
        if !val.can_contain_value() || val.is_constant() {
            return None;
        }

        if self.strategy.is_interactive() {
            let val_ap = manager.ap_factory().create(val, true)?;
            if !self.strategy.may_alias(ap, &val_ap, manager) {
                return None;
            }
        } else {
            let plain = ap.plain_value();
            match val {
                Value::Local(l) if plain != Some(l) => return None,
                Value::ArrayRef { base, .. } if plain != Some(base) => return None,
                Value::InstanceField { base, .. } => {
                    if !ap.is_local() && !ap.is_instance_field_ref() {
                        return None;
                    }
                    if plain != Some(base) {
                        return None;
                    }
                }
                _ => {}
            }
        }

        if matches!(val, Value::StaticField(_)) && !ap.is_static_field_ref() {
            return None;
        }

        let fields: Vec<&Field> = match val {
            Value::InstanceField { field, .. } | Value::StaticField(field) => vec![field],
            _ => Vec::new(),
        };
        Self::referenced_ap_base(ap, &fields, manager)
    }

    /// Two values may point to the same object
    pub fn may_alias_values(&self, v1: &Value, v2: &Value, manager: &InfoflowManager) -> bool {
        if !v1.can_contain_value() || !v2.can_contain_value() {
            return false;
        }
        if v1.is_constant() || v2.is_constant() {
            return false;
        }
        if v1 == v2 {
            return true;
        }
        if !self.strategy.is_interactive() {
            return false;
        }
        let factory = manager.ap_factory();
        match (factory.create(v1, false), factory.create(v2, false)) {
            (Some(a), Some(b)) => self.strategy.may_alias(&a, &b, manager),
            _ => false,
        }
    }

    pub fn must_alias_fields(f1: &Field, f2: &Field) -> bool {
        f1 == f2
    }

    /// Without a must-alias analysis only identical locals qualify
    pub fn must_alias(l1: &Local, l2: &Local, _position: StmtId) -> bool {
        l1 == l2
    }

    /// Matches `referenced` against the fields of `ap`, expanding registered
    /// recursive bases where a field is skipped
    fn referenced_ap_base(
        ap: &ApRef,
        referenced: &[&Field],
        manager: &InfoflowManager,
    ) -> Option<ApRef> {
        let factory = manager.ap_factory();
        let bases = if ap.is_static_field_ref() {
            ap.first_field_type().map(|t| factory.bases_for_type(t))
        } else {
            ap.base_type().map(|t| factory.bases_for_type(t))
        }
        .unwrap_or_default();

        for (idx, field) in referenced.iter().enumerate() {
            // a.b.c only matches a.b.*, never a.b
            let Some(frag) = ap.fragments().get(idx) else {
                return ap.taint_sub_fields().then(|| ap.clone());
            };
            if frag.field() == *field {
                continue;
            }
            // A static path's first field is its base and never expands
            if ap.is_static_field_ref() && idx == 0 {
                return None;
            }
            return bases
                .iter()
                .find(|base| base.first().map(|f| f.field()) == Some(*field))
                .and_then(|base| factory.expand_with_base(ap, idx, base));
        }
        Some(ap.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::{SourceContext, SourceSinkDefinition};
    use crate::features::taint_analysis::infrastructure::icfg::ProgramIcfg;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::features::taint_analysis::ports::InterproceduralCfg;
    use crate::shared::ir::{MethodRef, ProgramBuilder, Type};
    use std::sync::Arc;

    struct Fixture {
        mgr: Arc<InfoflowManager>,
        o: Local,
        p: Local,
        f: Field,
        g: Field,
        store: StmtId,
    }

    fn fixture(config: InfoflowConfig) -> Fixture {
        let f = Field::instance("app.Box", "f", Type::object());
        let g = Field::instance("app.Box", "g", Type::object());
        let mut pb = ProgramBuilder::new();
        pb.class("app.Box", None);
        pb.class("app.Main", None);
        let sig = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&sig, true);
        let o = mb.local("o", Type::class("app.Box"));
        let p = mb.local("p", Type::class("app.Box"));
        let x = mb.local("x", Type::object());
        let store = mb.assign(Value::field(&o, &f), Value::local(&x));
        mb.ret_void();
        let m = mb.finish();
        pb.entry_point(m);
        let icfg: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(Arc::new(pb.build())));
        let mgr = InfoflowManager::builder(Arc::new(config), icfg, Arc::new(MethodSourceSinkManager::new()))
            .build();
        Fixture { mgr, o, p, f, g, store }
    }

    fn taint(mgr: &InfoflowManager, val: &Value) -> AbsRef {
        let ap = mgr.ap_factory().create(val, true).unwrap();
        let ctx = SourceContext::new(Arc::new(SourceSinkDefinition::source("src")), ap, StmtId(0), None);
        Arc::new(Abstraction::new_source(ctx, false, false))
    }

    #[test]
    fn test_may_alias_matches_fields_of_same_base() {
        let fx = fixture(InfoflowConfig::default());
        let aliasing = fx.mgr.aliasing();
        let of = taint(&fx.mgr, &Value::field(&fx.o, &fx.f));
        let ap = of.access_path();

        assert_eq!(aliasing.may_alias(ap, &Value::field(&fx.o, &fx.f), &fx.mgr), Some(ap.clone()));
        assert!(aliasing.may_alias(ap, &Value::field(&fx.o, &fx.g), &fx.mgr).is_none());
        assert!(aliasing.may_alias(ap, &Value::field(&fx.p, &fx.f), &fx.mgr).is_none());
        assert!(aliasing.may_alias(ap, &Value::local(&fx.o), &fx.mgr).is_some());
        assert!(aliasing.may_alias(ap, &Value::null(), &fx.mgr).is_none());
    }

    #[test]
    fn test_local_taint_covers_sub_fields() {
        let fx = fixture(InfoflowConfig::default());
        let o = taint(&fx.mgr, &Value::local(&fx.o));
        let found = fx
            .mgr
            .aliasing()
            .may_alias(o.access_path(), &Value::field(&fx.o, &fx.g), &fx.mgr);
        assert_eq!(found, Some(o.access_path().clone()));
    }

    #[test]
    fn test_can_have_aliases_filters() {
        let fx = fixture(InfoflowConfig::default());
        let stmt = fx.mgr.stmt(fx.store).clone();
        let x = taint(&fx.mgr, &Value::field(&fx.o, &fx.f));
        assert!(Aliasing::can_have_aliases(&stmt, &Value::field(&fx.o, &fx.f), &x));

        let s = Local::new(crate::shared::ir::LocalId(900), "s", Type::string());
        let st = taint(&fx.mgr, &Value::local(&s));
        assert!(!Aliasing::can_have_aliases_ap(st.access_path()));
        assert!(Aliasing::can_have_aliases_ap(x.access_path()));

        let i = Local::new(crate::shared::ir::LocalId(901), "i", Type::Int);
        assert!(!Aliasing::can_have_aliases(&stmt, &Value::local(&i), &x));
    }

    #[test]
    fn test_value_aliasing_without_interactive_strategy() {
        let fx = fixture(InfoflowConfig::default());
        let aliasing = fx.mgr.aliasing();
        let of = Value::field(&fx.o, &fx.f);
        assert!(aliasing.may_alias_values(&of, &of, &fx.mgr));
        assert!(!aliasing.may_alias_values(&of, &Value::field(&fx.p, &fx.f), &fx.mgr));
        assert!(!aliasing.may_alias_values(&of, &Value::null(), &fx.mgr));
    }

    #[test]
    fn test_strategy_selection() {
        let lazy = InfoflowConfig::default().with_aliasing_algorithm(AliasingAlgorithm::Lazy);
        assert_eq!(Aliasing::for_config(&lazy).strategy().name(), "lazy");
        let none = InfoflowConfig::default().with_aliasing_algorithm(AliasingAlgorithm::None);
        assert_eq!(Aliasing::for_config(&none).strategy().name(), "none");
        let pts = InfoflowConfig::default().with_aliasing_algorithm(AliasingAlgorithm::PtsBased);
        assert!(!Aliasing::for_config(&pts).strategy().is_flow_sensitive());
    }
}
