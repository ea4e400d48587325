//! Backward alias search
//!
//! Runs over the reversed graph. Facts are inactive copies of heap taints
//! created by the forward analysis; every alias found on the way up is handed
//! back to the forward solver right after the statement that created it.
//!
//! A handed-over fact records that statement as its turn unit. Should the
//! same path come back up in a later search, the search stops at the turn
//! unit: above it the base names an older object, or the path was already
//! searched by the search that turned there.

use crate::config::StaticFieldTrackingMode;
use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::access_path::ArrayTaintType;
use crate::features::aliasing::{base_matches, base_matches_strict, select_base};
use crate::features::ifds_solver::{FactSet, IfdsProblem, PathEdge};
use crate::features::taint_analysis::infrastructure::icfg::BackwardsIcfg;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::features::taint_analysis::infrastructure::rules::singleton;
use crate::features::taint_analysis::infrastructure::type_utils::TypeUtils;
use crate::features::taint_analysis::ports::{FlowFunctionType, InterproceduralCfg};
use crate::shared::ir::{MethodId, Stmt, StmtId, StmtKind, Type, Value};
use std::sync::Arc;
use tracing::trace;

pub struct AliasProblem {
    manager: Arc<InfoflowManager>,
    icfg: BackwardsIcfg,
}

impl AliasProblem {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        let icfg = BackwardsIcfg::new(manager.shared_icfg());
        Self { manager, icfg }
    }

    /// Primitive values cannot have aliases
    fn check_abstraction(abs: Option<AbsRef>) -> Option<AbsRef> {
        let abs = abs?;
        let ap = abs.access_path();
        let ty = if ap.is_static_field_ref() {
            ap.first_field_type()
        } else {
            ap.base_type()
        };
        if ty.map_or(false, Type::is_primitive) {
            return None;
        }
        Some(abs)
    }

    fn is_plain(val: &Value, abs: &AbsRef) -> bool {
        match (val.as_local(), abs.access_path().plain_value()) {
            (Some(l), Some(plain)) => l == plain,
            _ => false,
        }
    }

    /// Hands an alias to the forward solver just below `stmt`
    fn inject_forward(&self, d1: &AbsRef, stmt: StmtId, abs: &AbsRef) {
        let Some(solver) = self.manager.forward_solver() else {
            return;
        };
        let turned = Abstraction::derive_with_turn_unit(abs, stmt);
        // Predecessors in the reversed graph are the forward successors
        for &succ in self.icfg.preds_of(stmt) {
            trace!(stmt = %stmt, succ = %succ, fact = %turned, "Alias handed to forward solver");
            solver.process_edge(PathEdge::new(Arc::clone(d1), succ, Arc::clone(&turned)));
        }
    }

    /// `abs` was handed to the forward analysis at `stmt`
    fn turned_at(abs: &AbsRef, stmt: StmtId) -> bool {
        abs.turn_unit() == Some(stmt)
    }

    fn is_primitive_like(ty: &Type) -> bool {
        ty.is_primitive() || ty.is_primitive_array()
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    /// Aliases created by the definition `def` for the taint `source` found
    /// below it. `None` means the search ends here.
    fn compute_aliases(&self, def: &Stmt, lhs: &Value, d1: &AbsRef, source: &AbsRef) -> Option<FactSet> {
        let mgr = &self.manager;
        if mgr.is_zero(source) {
            return None;
        }

        let rhs = match &def.kind {
            StmtKind::Identity { .. } => return Some(singleton(Arc::clone(source))),
            StmtKind::Assign { rhs, .. } => rhs,
            _ => return Some(FactSet::default()),
        };

        let mut res = FactSet::default();
        let left_matches = base_matches(lhs, source);
        if !left_matches {
            res.insert(Arc::clone(source));
        }

        let rv = select_base(rhs, false);
        // Untracked values end the search once the left side is overwritten
        if left_matches && !rv.can_contain_value() {
            return Some(res);
        }
        if matches!(rv, Value::Constant(_))
            || matches!(
                rhs,
                Value::NewArray { .. } | Value::Binary { .. } | Value::Negate(_)
            )
        {
            return Some(res);
        }

        let ap = source.access_path();
        let factory = mgr.ap_factory();
        let type_utils = mgr.type_utils();
        let static_mode = mgr.config().static_field_tracking_mode;

        let alias_overwritten = base_matches_strict(&rv, source)
            && matches!(rv.ty(), Type::Ref(_))
            && !source.depends_on_cut_ap();

        if !alias_overwritten && !rv.ty().is_primitive() {
            // The left side aliases the tainted right side from here on
            let mut new_left: Option<AbsRef> = None;
            match &rv {
                Value::InstanceField { base, field } => {
                    if ap.is_instance_field_ref()
                        && ap.plain_value() == Some(base)
                        && ap.first_field_matches(field)
                    {
                        let new_ap =
                            factory.copy_with_new_value_typed(ap, lhs, ap.first_field_type().cloned(), true);
                        new_left = Self::check_abstraction(Abstraction::derive_new_abstraction(
                            source,
                            new_ap,
                            Some(def.id),
                        ));
                    }
                }
                Value::StaticField(field) if static_mode != StaticFieldTrackingMode::None => {
                    if ap.is_static_field_ref() && ap.first_field_matches(field) {
                        let new_ap =
                            factory.copy_with_new_value_typed(ap, lhs, ap.base_type().cloned(), true);
                        new_left = Self::check_abstraction(Abstraction::derive_new_abstraction(
                            source,
                            new_ap,
                            Some(def.id),
                        ));
                    }
                }
                _ if Self::is_plain(&rv, source) => {
                    let mut new_type = ap.base_type().cloned();
                    if matches!(lhs, Value::ArrayRef { .. }) {
                        new_type = new_type.and_then(|t| {
                            TypeUtils::build_array_or_add_dimension(&t, &Type::array_of(lhs.ty()))
                        });
                    } else if matches!(rhs, Value::ArrayRef { .. }) {
                        new_type = new_type.and_then(|t| t.element_type().cloned());
                    } else if !type_utils.check_cast_ap(ap, &lhs.ty()) {
                        return None;
                    }

                    match rhs {
                        Value::Cast { cast_type, .. } => {
                            let storable = new_type.as_ref().map_or(false, |t| {
                                type_utils.hierarchy().can_store_type(t, cast_type)
                            });
                            if !storable {
                                new_type = Some(cast_type.clone());
                            }
                        }
                        // Lengths and type checks are primitives
                        Value::Length(_) | Value::InstanceOf { .. } => return Some(res),
                        // Only the length is known to be tainted, not the elements
                        Value::ArrayRef { .. } if ap.array_taint_type() == ArrayTaintType::Length => {
                            return Some(res)
                        }
                        _ => {}
                    }
                    let new_ap = factory.copy_with_new_value_typed(ap, lhs, new_type, false);
                    new_left = Self::check_abstraction(Abstraction::derive_new_abstraction(
                        source,
                        new_ap,
                        Some(def.id),
                    ));
                }
                _ => {}
            }

            // Valid only below the definition, so never propagated upwards
            if let Some(new_left) = new_left {
                if new_left.access_path() != ap {
                    self.inject_forward(d1, def.id, &new_left);
                }
            }
        }

        // A tainted left side makes the right side an alias as well
        let rv_is_tracked = matches!(
            rv,
            Value::Local(_) | Value::InstanceField { .. } | Value::StaticField(_)
        );
        if !rv_is_tracked || lhs.ty().is_primitive() {
            return Some(res);
        }

        let mut add_right = false;
        let mut cut_first_field = false;
        let mut target_type: Option<Type> = None;
        match lhs {
            Value::InstanceField { base, field } => {
                if ap.is_instance_field_ref()
                    && ap.plain_value() == Some(base)
                    && ap.first_field_matches(field)
                {
                    target_type = ap.first_field_type().cloned();
                    add_right = true;
                    cut_first_field = true;
                }
            }
            Value::Local(l) if ap.is_instance_field_ref() => {
                if ap.plain_value() == Some(l) {
                    target_type = ap.base_type().cloned();
                    add_right = true;
                }
            }
            Value::ArrayRef { base, .. } => {
                if ap.plain_value() == Some(base) && ap.array_taint_type() != ArrayTaintType::Length {
                    add_right = true;
                    target_type = ap.base_type().cloned();
                }
            }
            _ if Self::is_plain(lhs, source) => {
                // Unrealizable cast
                if !type_utils.check_cast_ap(ap, &rhs.ty()) {
                    return None;
                }
                add_right = true;
                target_type = ap.base_type().cloned();
            }
            _ => {}
        }

        if !add_right {
            return Some(res);
        }

        let rv_ty = rv.ty();
        if let Some(tt) = target_type.take() {
            target_type = if matches!(rhs, Value::ArrayRef { .. }) {
                TypeUtils::build_array_or_add_dimension(&tt, &Type::array_of(rhs.ty()))
            } else if matches!(lhs, Value::ArrayRef { .. }) {
                let element = tt.element_type().cloned().unwrap_or_else(Type::object);
                // Tighten generic element types to what is actually stored
                let element = if element.is_object_like() { rv_ty.clone() } else { element };
                if !type_utils.check_cast(&rv_ty, Some(&element)) {
                    add_right = false;
                }
                Some(element)
            } else {
                Some(tt)
            };
        }
        if matches!(rhs, Value::Length(_)) {
            target_type = None;
        }

        // Only plain locals and static fields may carry primitive taints
        let carries_primitive = !ap.is_static_field_ref() && !ap.is_local();
        if carries_primitive
            && (target_type.as_ref().map_or(false, Self::is_primitive_like)
                || Self::is_primitive_like(&rv_ty))
        {
            return None;
        }

        if add_right && !type_utils.check_cast(&rv_ty, target_type.as_ref()) {
            add_right = false;
        }
        if add_right
            && matches!(rv, Value::StaticField(_))
            && static_mode == StaticFieldTrackingMode::None
        {
            add_right = false;
        }
        if !add_right {
            return Some(res);
        }

        let new_ap = factory.copy_with_new_value_typed(ap, &rv, target_type, cut_first_field);
        let Some(new_abs) =
            Self::check_abstraction(Abstraction::derive_new_abstraction(source, new_ap, Some(def.id)))
        else {
            return Some(res);
        };
        if new_abs.access_path() == ap {
            return Some(res);
        }
        if matches!(rv, Value::StaticField(_))
            && static_mode == StaticFieldTrackingMode::ContextFlowInsensitive
        {
            mgr.global_taints().add(mgr, new_abs);
        } else {
            res.insert(Arc::clone(&new_abs));
            self.inject_forward(d1, def.id, &new_abs);
        }
        Some(res)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn call_targets(&self, d1: &AbsRef, source: &AbsRef, call: StmtId, callee: MethodId) -> FactSet {
        let mgr = &self.manager;
        let config = mgr.config();
        let method = mgr.method(callee);
        if !method.has_body() || mgr.is_zero(source) {
            return FactSet::default();
        }
        mgr.notify_flow_in(call, source, FlowFunctionType::Call);

        let stmt = mgr.stmt(call);
        if (!config.inspect_sources && mgr.is_source_stmt(call))
            || (!config.inspect_sinks && mgr.is_sink_stmt(call))
        {
            return FactSet::default();
        }
        // The taint already came out of this callee
        if mgr.is_call_site_activating(call, source.activation_unit()) {
            return FactSet::default();
        }
        let static_mode = config.static_field_tracking_mode;
        if static_mode == StaticFieldTrackingMode::None && method.is_static_initializer() {
            return FactSet::default();
        }
        if mgr
            .taint_wrapper()
            .map_or(false, |w| w.is_exclusive(stmt, source, mgr))
        {
            return FactSet::default();
        }
        if mgr.is_excluded(callee) {
            return FactSet::default();
        }

        let ap = source.access_path();
        let static_tracked = static_mode != StaticFieldTrackingMode::None && ap.is_static_field_ref();
        if static_tracked {
            if let Some(field) = ap.first_field() {
                if !self.icfg.is_static_field_read(callee, field) {
                    return FactSet::default();
                }
            }
        }

        let factory = mgr.ap_factory();
        let type_utils = mgr.type_utils();
        let mut res = FactSet::default();

        // A tainted call result is whatever the callee returns
        if let Some(lhs) = stmt.left_op() {
            if Self::is_plain(&lhs, source) {
                for &sid in &method.body {
                    let Some(ret_op) = mgr.stmt(sid).return_op() else {
                        continue;
                    };
                    let trackable = matches!(
                        ret_op,
                        Value::Local(_) | Value::InstanceField { .. } | Value::StaticField(_)
                    );
                    if trackable && type_utils.check_cast_ap(ap, &ret_op.ty()) {
                        let new_ap = factory.copy_with_new_value_typed(ap, ret_op, None, false);
                        res.extend(Self::check_abstraction(Abstraction::derive_new_abstraction(
                            source,
                            new_ap,
                            Some(call),
                        )));
                    }
                }
            }
        }

        if static_tracked {
            res.extend(Self::check_abstraction(Abstraction::derive_new_abstraction(
                source,
                Some(Arc::clone(ap)),
                Some(call),
            )));
        }

        let inv = stmt.invoke_expr();
        if let (false, false, Some(inv)) = (ap.is_static_field_ref(), method.is_static, inv) {
            let on_base = inv
                .base
                .as_ref()
                .map_or(false, |b| ap.plain_value() == Some(b));
            if on_base && type_utils.has_compatible_types_for_call(ap, method.class()) {
                let also_param = inv.args.iter().any(|arg| Self::is_plain(arg, source));
                if let (false, Some(this)) = (also_param, &method.this_local) {
                    let new_ap = factory.copy_with_new_value(ap, &Value::local(this));
                    res.extend(Self::check_abstraction(Abstraction::derive_new_abstraction(
                        source,
                        new_ap,
                        Some(call),
                    )));
                }
            }
        }

        if let (Some(inv), true) = (inv, method.param_count() > 0) {
            for (i, arg) in inv.args.iter().enumerate() {
                if !Self::is_plain(arg, source) {
                    continue;
                }
                let Some(param) = method.param_locals.get(i) else {
                    continue;
                };
                let new_ap = factory.copy_with_new_value(ap, &Value::local(param));
                res.extend(Self::check_abstraction(Abstraction::derive_new_abstraction(
                    source,
                    new_ap,
                    Some(call),
                )));
            }
        }

        // Facts leaving the callee in this context return to the forward analysis too
        if let Some(solver) = mgr.forward_solver() {
            for d3 in &res {
                solver.inject_context(callee, d3, call, source, d1);
            }
        }
        res
    }

    // ========================================================================
    // Returns
    // ========================================================================

    fn return_targets(
        &self,
        call_site: Option<StmtId>,
        callee: MethodId,
        exit: StmtId,
        d1: &AbsRef,
        source: &AbsRef,
    ) -> FactSet {
        let mgr = &self.manager;
        let Some(call_site) = call_site else {
            return FactSet::default();
        };
        if mgr.is_zero(source) {
            return FactSet::default();
        }
        mgr.notify_flow_in(call_site, source, FlowFunctionType::Return);

        let ap = source.access_path();
        if mgr.config().static_field_tracking_mode != StaticFieldTrackingMode::None
            && ap.is_static_field_ref()
        {
            mgr.register_activation_call_site(call_site, callee, source);
            return singleton(Arc::clone(source));
        }

        let call_stmt = mgr.stmt(call_site);
        let Some(inv) = call_stmt.invoke_expr() else {
            return FactSet::default();
        };
        let method = mgr.method(callee);
        let factory = mgr.ap_factory();
        let type_utils = mgr.type_utils();
        let forward = mgr.forward_solver();
        let mut res = FactSet::default();

        // Return values do not exist yet at the top of the callee, only
        // parameters and the receiver map back
        let mut parameter_aliases = false;
        for (i, param) in method.param_locals.iter().enumerate() {
            if ap.plain_value() != Some(param) {
                continue;
            }
            parameter_aliases = true;
            let Some(arg) = inv.arg(i) else {
                continue;
            };
            if !arg.can_contain_value() || !type_utils.check_cast_ap(ap, &arg.ty()) {
                continue;
            }
            let base_type = ap.base_type();
            if base_type.map_or(false, Type::is_primitive) {
                continue;
            }
            if base_type.map_or(false, Type::is_string) && !ap.can_have_immutable_aliases() {
                continue;
            }
            // A parameter written anywhere in the callee counts as overwritten
            if self.icfg.method_writes_value(callee, param) {
                continue;
            }

            let new_ap = factory.copy_with_new_value_typed(ap, arg, base_type.cloned(), false);
            let Some(abs) =
                Self::check_abstraction(Abstraction::derive_new_abstraction(source, new_ap, Some(exit)))
            else {
                continue;
            };
            res.insert(Arc::clone(&abs));
            mgr.register_activation_call_site(call_site, callee, &abs);

            if let Some(forward) = &forward {
                // `caller(o, o)` makes both parameters aliases of each other
                for (j, other) in inv.args.iter().enumerate() {
                    if i == j || other != arg {
                        continue;
                    }
                    let Some(other_param) = method.param_locals.get(j) else {
                        continue;
                    };
                    let alias_ap = factory.copy_with_new_value_typed(
                        abs.access_path(),
                        &Value::local(other_param),
                        abs.access_path().base_type().cloned(),
                        false,
                    );
                    if let Some(alias) = Self::check_abstraction(Abstraction::derive_new_abstraction(
                        source,
                        alias_ap,
                        Some(exit),
                    )) {
                        let alias = Abstraction::derive_with_turn_unit(&alias, exit);
                        forward.process_edge(PathEdge::new(Arc::clone(d1), exit, alias));
                    }
                }

                // `return a;` creates an alias without any assignment in the callee
                let returns_param = self.icfg.start_points_of(callee).iter().any(|&sp| {
                    mgr.stmt(sp).return_op().and_then(Value::as_local) == Some(param)
                });
                if returns_param {
                    let turned = Abstraction::derive_with_turn_unit(source, exit);
                    forward.process_edge(PathEdge::new(Arc::clone(d1), exit, turned));
                }
            }
        }

        if !method.is_static && !parameter_aliases {
            let on_this = match (&method.this_local, ap.plain_value()) {
                (Some(this), Some(plain)) => this == plain,
                _ => false,
            };
            if on_this && type_utils.has_compatible_types_for_call(ap, method.class()) {
                if let Some(base) = &inv.base {
                    let new_ap = factory.copy_with_new_value_typed(
                        ap,
                        &Value::local(base),
                        ap.base_type().cloned(),
                        false,
                    );
                    if let Some(abs) = Self::check_abstraction(Abstraction::derive_new_abstraction(
                        source,
                        new_ap,
                        Some(exit),
                    )) {
                        res.insert(Arc::clone(&abs));
                        mgr.register_activation_call_site(call_site, callee, &abs);
                    }
                }
            }
        }

        res.into_iter()
            .map(|abs| {
                if Arc::ptr_eq(&abs, source) {
                    abs
                } else {
                    Abstraction::with_corresponding_call_site(abs, call_site)
                }
            })
            .collect()
    }

    // ========================================================================
    // Call-to-return
    // ========================================================================

    fn call_to_return_targets(&self, d1: &AbsRef, source: &AbsRef, call: StmtId) -> FactSet {
        let mgr = &self.manager;
        if mgr.is_zero(source) {
            return FactSet::default();
        }
        let stmt = mgr.stmt(call);
        let lhs = stmt.left_op();

        if let Some(wrapper) = mgr.taint_wrapper() {
            let aliases = wrapper.aliases_for_method(stmt, d1, source, mgr);
            if let Some(aliases) = aliases.filter(|a| !a.is_empty()) {
                let mut pass_on = FactSet::default();
                for abs in aliases {
                    let overwritten = lhs.as_ref().map_or(false, |l| Self::is_plain(l, &abs));
                    // Only new aliases start a forward search
                    if **source != *abs {
                        self.inject_forward(d1, call, &abs);
                    }
                    if !overwritten {
                        pass_on.insert(abs);
                    }
                }
                return pass_on;
            }
        }

        let program = mgr.program();
        let callees = self.icfg.callees_of_call_at(call);
        let Some(inv) = stmt.invoke_expr() else {
            return singleton(Arc::clone(source));
        };
        let declared = program.method_by_signature(&inv.method.signature());
        let must_propagate =
            declared.map_or(false, |m| mgr.is_excluded(m.id)) || callees.is_empty();

        let ap = source.access_path();
        if !must_propagate
            && mgr.config().static_field_tracking_mode != StaticFieldTrackingMode::None
            && ap.is_static_field_ref()
        {
            if let Some(field) = ap.first_field() {
                if callees.iter().any(|&c| self.icfg.is_static_field_used(c, field)) {
                    return FactSet::default();
                }
            }
        }

        // Overwritten by the call's result
        if lhs.as_ref().map_or(false, |l| Self::is_plain(l, source)) {
            return FactSet::default();
        }
        if !must_propagate {
            let on_base = inv
                .base
                .as_ref()
                .map_or(false, |b| ap.plain_value() == Some(b));
            if on_base && !callees.is_empty() {
                return FactSet::default();
            }
            // Arguments travel through the callee instead
            if inv.args.iter().any(|arg| Self::is_plain(arg, source)) {
                return FactSet::default();
            }
        }
        singleton(Arc::clone(source))
    }
}

impl IfdsProblem for AliasProblem {
    fn icfg(&self) -> &dyn InterproceduralCfg {
        &self.icfg
    }

    fn zero_value(&self) -> &AbsRef {
        self.manager.zero_value()
    }

    fn initial_seeds(&self) -> Vec<(StmtId, AbsRef)> {
        Vec::new()
    }

    fn follow_returns_past_seeds(&self) -> bool {
        self.manager.config().solver.follow_returns_past_seeds
    }

    fn normal_flow(&self, d1: &AbsRef, d2: &AbsRef, curr: StmtId, succ: StmtId) -> FactSet {
        let mgr = &self.manager;
        let stmt = mgr.stmt(curr);
        let Some(lhs) = stmt.left_op().filter(|_| stmt.is_definition()) else {
            return singleton(Arc::clone(d2));
        };
        if mgr.is_zero(d2) {
            return FactSet::default();
        }
        mgr.notify_flow_in(curr, d2, FlowFunctionType::Normal);

        let lhs = select_base(&lhs, true);
        let mut res = self.compute_aliases(stmt, &lhs, d1, d2).unwrap_or_default();
        if Self::turned_at(d2, curr) {
            res.remove(d2);
        }

        // Definitions right at the method start are not visited as a normal
        // statement again
        let dest = mgr.stmt(succ);
        if !res.is_empty() && dest.is_definition() && self.icfg.is_exit_stmt(succ) {
            if let Some(dest_lhs) = dest.left_op() {
                let dest_lhs = select_base(&dest_lhs, true);
                for abs in &res {
                    self.compute_aliases(dest, &dest_lhs, d1, abs);
                }
            }
        }
        mgr.notify_flow_out(curr, Some(d1), d2, res, FlowFunctionType::Normal)
    }

    fn call_flow(&self, d1: &AbsRef, d2: &AbsRef, call: StmtId, callee: MethodId) -> FactSet {
        let res = if Self::turned_at(d2, call) {
            FactSet::default()
        } else {
            self.call_targets(d1, d2, call, callee)
        };
        self.manager
            .notify_flow_out(call, Some(d1), d2, res, FlowFunctionType::Call)
    }

    fn return_flow(
        &self,
        call_site: Option<StmtId>,
        callee: MethodId,
        exit: StmtId,
        _ret_site: Option<StmtId>,
        d2: &AbsRef,
        callee_d1: &AbsRef,
        _caller_d1s: &[AbsRef],
    ) -> FactSet {
        let res = self.return_targets(call_site, callee, exit, callee_d1, d2);
        self.manager
            .notify_flow_out(exit, Some(callee_d1), d2, res, FlowFunctionType::Return)
    }

    fn call_to_return_flow(
        &self,
        d1: &AbsRef,
        d2: &AbsRef,
        call: StmtId,
        _ret_site: StmtId,
    ) -> FactSet {
        self.manager
            .notify_flow_in(call, d2, FlowFunctionType::CallToReturn);
        let mut res = self.call_to_return_targets(d1, d2, call);
        if Self::turned_at(d2, call) {
            res.remove(d2);
        }
        self.manager
            .notify_flow_out(call, Some(d1), d2, res, FlowFunctionType::CallToReturn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::ifds_solver::{IfdsSolver, SolverExecutor};
    use crate::features::taint_analysis::infrastructure::problems::InfoflowProblem;
    use crate::features::taint_analysis::infrastructure::rules::test_support::{manager_for, taint};
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{Field, Local, MethodRef, ProgramBuilder};

    struct Fixture {
        mgr: Arc<InfoflowManager>,
        f: Field,
        a: Local,
        link: MethodId,
        link_params: (Local, Local),
        link_write: StmtId,
        link_call: StmtId,
        reset: MethodId,
        reset_param: Local,
        reset_call: StmtId,
        copy: StmtId,
        write: StmtId,
    }

    /// `link(a, a)` writes a field of its first parameter, `reset(a)`
    /// reassigns its parameter, then `b = a; b.f = ...`
    fn fixture() -> Fixture {
        let mut pb = ProgramBuilder::new();
        pb.class("app.Node", None);
        pb.class("app.Main", None);
        let node = Type::class("app.Node");
        let f = Field::instance("app.Node", "f", Type::object());

        let link_sig = MethodRef::new("app.Main", "link", vec![node.clone(), node.clone()], Type::Void);
        let mut mb = pb.method(&link_sig, true);
        let p0 = mb.param(0).unwrap();
        let p1 = mb.param(1).unwrap();
        let link_write = mb.assign(Value::field(&p0, &f), Value::local(&p1));
        mb.ret_void();
        let link = mb.finish();

        let reset_sig = MethodRef::new("app.Main", "reset", vec![node.clone()], Type::Void);
        let mut mb = pb.method(&reset_sig, true);
        let reset_param = mb.param(0).unwrap();
        mb.assign(Value::local(&reset_param), Value::New(node.clone()));
        mb.ret_void();
        let reset = mb.finish();

        let main_sig = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main_sig, true);
        let a = mb.local("a", node.clone());
        let b = mb.local("b", node.clone());
        mb.assign(Value::local(&a), Value::New(node));
        let link_call = mb.call_static(&link_sig, vec![Value::local(&a), Value::local(&a)]);
        let reset_call = mb.call_static(&reset_sig, vec![Value::local(&a)]);
        let copy = mb.assign(Value::local(&b), Value::local(&a));
        let write = mb.assign(Value::field(&b, &f), Value::string("x"));
        mb.ret_void();
        let main = mb.finish();
        pb.entry_point(main);

        let mgr = manager_for(
            pb.build(),
            InfoflowConfig::default(),
            MethodSourceSinkManager::new(),
            &[],
            &[],
        );
        Fixture {
            mgr,
            f,
            a,
            link,
            link_params: (p0, p1),
            link_write,
            link_call,
            reset,
            reset_param,
            reset_call,
            copy,
            write,
        }
    }

    /// Forward solver that records injected edges without processing them
    fn idle_forward_solver(mgr: &Arc<InfoflowManager>) -> Arc<IfdsSolver> {
        let executor = SolverExecutor::with_threads(1).unwrap();
        executor.interrupt();
        let solver = Arc::new(IfdsSolver::new(
            "forward",
            Arc::new(InfoflowProblem::new(Arc::clone(mgr), Vec::new())),
            executor,
            mgr.config().solver.clone(),
        ));
        mgr.set_forward_solver(&solver);
        solver
    }

    fn entry_of(mgr: &InfoflowManager, method: MethodId) -> StmtId {
        mgr.icfg().start_points_of(method)[0]
    }

    fn bases(facts: &FactSet) -> Vec<String> {
        let mut names: Vec<String> = facts
            .iter()
            .filter_map(|abs| abs.access_path().plain_value().map(|l| l.name().to_string()))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_untouched_parameter_maps_back_to_argument() {
        let fx = fixture();
        let problem = AliasProblem::new(Arc::clone(&fx.mgr));
        let zero = Arc::clone(fx.mgr.zero_value());
        let entry = entry_of(&fx.mgr, fx.link);
        let fact = taint(&fx.mgr, &Value::field(&fx.link_params.0, &fx.f), fx.link_write);

        let res = problem.return_flow(Some(fx.link_call), fx.link, entry, None, &fact, &zero, &[]);
        assert_eq!(res.len(), 1);
        let mapped = res.iter().next().unwrap();
        assert_eq!(mapped.access_path().plain_value(), Some(&fx.a));
        assert!(mapped.access_path().first_field_matches(&fx.f));
        assert_eq!(mapped.corresponding_call_site(), Some(fx.link_call));
    }

    #[test]
    fn test_overwritten_parameter_does_not_map_back() {
        let fx = fixture();
        let problem = AliasProblem::new(Arc::clone(&fx.mgr));
        let zero = Arc::clone(fx.mgr.zero_value());
        let entry = entry_of(&fx.mgr, fx.reset);
        let fact = taint(&fx.mgr, &Value::field(&fx.reset_param, &fx.f), entry);

        let res = problem.return_flow(Some(fx.reset_call), fx.reset, entry, None, &fact, &zero, &[]);
        assert!(res.is_empty());
    }

    #[test]
    fn test_same_argument_twice_aliases_both_parameters() {
        let fx = fixture();
        let forward = idle_forward_solver(&fx.mgr);
        let problem = AliasProblem::new(Arc::clone(&fx.mgr));
        let zero = Arc::clone(fx.mgr.zero_value());
        let entry = entry_of(&fx.mgr, fx.link);
        let fact = taint(&fx.mgr, &Value::field(&fx.link_params.0, &fx.f), fx.link_write);

        problem.return_flow(Some(fx.link_call), fx.link, entry, None, &fact, &zero, &[]);
        let handed = forward.facts_at(entry);
        let other = handed
            .iter()
            .find(|abs| abs.access_path().plain_value() == Some(&fx.link_params.1))
            .expect("second parameter handed to the forward solver");
        assert!(other.access_path().first_field_matches(&fx.f));
        assert_eq!(other.turn_unit(), Some(entry));
    }

    #[test]
    fn test_activating_call_site_is_not_entered_again() {
        let fx = fixture();
        let problem = AliasProblem::new(Arc::clone(&fx.mgr));
        let zero = Arc::clone(fx.mgr.zero_value());
        let a_f = taint(&fx.mgr, &Value::field(&fx.a, &fx.f), fx.write);
        let inactive = Abstraction::derive_inactive_abstraction(&a_f, fx.link_write, true);

        let res = problem.call_flow(&zero, &inactive, fx.link_call, fx.link);
        assert_eq!(bases(&res), vec!["p0".to_string(), "p1".to_string()]);

        // The taint left `link` through this call site
        assert!(fx.mgr.register_activation_call_site(fx.link_call, fx.link, &inactive));
        let res = problem.call_flow(&zero, &inactive, fx.link_call, fx.link);
        assert!(res.is_empty());
    }

    #[test]
    fn test_alias_of_copied_local_is_handed_forward_with_turn_unit() {
        let fx = fixture();
        let forward = idle_forward_solver(&fx.mgr);
        let problem = AliasProblem::new(Arc::clone(&fx.mgr));
        let zero = Arc::clone(fx.mgr.zero_value());
        let b_f = {
            let stmt = fx.mgr.stmt(fx.write);
            let lhs = stmt.left_op().unwrap();
            taint(&fx.mgr, &lhs, fx.write)
        };

        // Backwards over `b = a`: `a.f` continues upwards
        let res = problem.normal_flow(&zero, &b_f, fx.copy, fx.reset_call);
        assert_eq!(bases(&res), vec!["a".to_string()]);

        let below_copy = fx.mgr.icfg().succs_of(fx.copy)[0];
        let handed = forward.facts_at(below_copy);
        let a_f = handed
            .iter()
            .find(|abs| abs.access_path().plain_value() == Some(&fx.a))
            .expect("alias handed to the forward solver");
        assert_eq!(a_f.turn_unit(), Some(fx.copy));
    }

    #[test]
    fn test_search_stops_at_turn_unit() {
        let fx = fixture();
        let problem = AliasProblem::new(Arc::clone(&fx.mgr));
        let zero = Arc::clone(fx.mgr.zero_value());
        let a_f = taint(&fx.mgr, &Value::field(&fx.a, &fx.f), fx.write);
        let turned = Abstraction::derive_with_turn_unit(&a_f, fx.copy);

        let res = problem.normal_flow(&zero, &a_f, fx.copy, fx.reset_call);
        assert!(res.contains(&a_f));
        let res = problem.normal_flow(&zero, &turned, fx.copy, fx.reset_call);
        assert!(!res.contains(&turned));
        assert!(res.is_empty());

        let turned_at_call = Abstraction::derive_with_turn_unit(&a_f, fx.link_call);
        assert!(problem
            .call_flow(&zero, &turned_at_call, fx.link_call, fx.link)
            .is_empty());
    }
}
