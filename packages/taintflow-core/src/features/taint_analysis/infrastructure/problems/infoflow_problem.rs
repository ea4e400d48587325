//! Forward taint propagation
//!
//! Flow functions of the main solver. Statement-specific behaviour lives in
//! the propagation rules; this problem adds the generic transfer through
//! assignments, argument passing, returns and the call-to-return edge.

use crate::config::StaticFieldTrackingMode;
use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::access_path::{ApRef, ArrayTaintType};
use crate::features::aliasing::{select_base_list, Aliasing};
use crate::features::ifds_solver::{FactSet, IfdsProblem};
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::features::taint_analysis::infrastructure::rules::{
    alias_target, singleton, KillFlags, PropagationRuleManager,
};
use crate::features::taint_analysis::infrastructure::type_utils::TypeUtils;
use crate::features::taint_analysis::ports::{FlowFunctionType, InterproceduralCfg};
use crate::shared::ir::{InvokeExpr, Method, MethodId, Stmt, StmtId, StmtKind, Type, Value};
use std::sync::Arc;

pub struct InfoflowProblem {
    manager: Arc<InfoflowManager>,
    rules: PropagationRuleManager,
    /// Statements the solver starts from with the zero fact
    seeds: Vec<StmtId>,
}

impl InfoflowProblem {
    pub fn new(manager: Arc<InfoflowManager>, seeds: Vec<StmtId>) -> Self {
        let rules = PropagationRuleManager::new(&manager);
        Self {
            manager,
            rules,
            seeds,
        }
    }

    pub fn manager(&self) -> &Arc<InfoflowManager> {
        &self.manager
    }

    pub fn rules(&self) -> &PropagationRuleManager {
        &self.rules
    }

    fn flow_limit_reached(&self) -> bool {
        let k = self.manager.config().stop_after_first_k_flows;
        k > 0 && self.manager.results().len() >= k
    }

    /// Inactive aliases turn active once execution passes their activation unit
    fn activate_at(&self, source: &AbsRef, stmt: StmtId) -> AbsRef {
        if !source.is_abstraction_active()
            && (source.activation_unit() == Some(stmt)
                || self
                    .manager
                    .is_call_site_activating(stmt, source.activation_unit()))
        {
            return Abstraction::active_copy(source);
        }
        Arc::clone(source)
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    fn taint_on_assignment(
        &self,
        d1: &AbsRef,
        stmt: &Stmt,
        lhs: &Value,
        rhs: &Value,
        new_source: &AbsRef,
    ) -> Option<FactSet> {
        let mgr = &self.manager;
        // Lengths are handled by the array rule
        if matches!(rhs, Value::Length(_)) {
            return Some(singleton(Arc::clone(new_source)));
        }

        let ap = new_source.access_path();
        let implicit_taint = new_source
            .top_postdominator()
            .map_or(false, |top| top.unit.is_some())
            || ap.is_empty();
        let mut add_left = false;
        if implicit_taint {
            // Locals of a conditionally called method are invisible to the caller
            if mgr.is_conditional(d1) && !lhs.is_field_ref() {
                return Some(singleton(Arc::clone(new_source)));
            }
            add_left = ap.is_empty();
        }

        let alias_overwritten = !add_left
            && !new_source.is_abstraction_active()
            && crate::features::aliasing::base_matches_strict(rhs, new_source)
            && matches!(rhs.ty(), Type::Ref(_))
            && !new_source.depends_on_cut_ap();

        let aliasing = mgr.aliasing();
        let mut cut_first_field = false;
        let mut mapped: ApRef = Arc::clone(ap);
        let mut target_type: Option<Type> = None;
        if !add_left && !alias_overwritten {
            let plain = ap.plain_value().map(Value::local);
            for rv in select_base_list(rhs, true) {
                match &rv {
                    Value::StaticField(_) => {
                        let tracking =
                            mgr.config().static_field_tracking_mode != StaticFieldTrackingMode::None;
                        if let (true, Some(hit)) = (tracking, aliasing.may_alias(ap, &rv, mgr)) {
                            add_left = true;
                            cut_first_field = true;
                            mapped = hit;
                        }
                    }
                    Value::InstanceField { base, field } => {
                        if *base.ty() == Type::Null {
                            return None;
                        }
                        if let Some(hit) = aliasing.may_alias(ap, &rv, mgr) {
                            add_left = true;
                            cut_first_field =
                                hit.fragment_count() > 0 && hit.first_field() == Some(field);
                            mapped = hit;
                        } else if plain.as_ref().map_or(false, |p| {
                            aliasing.may_alias_values(&Value::local(base), p, mgr)
                        }) && ap.fragment_count() == 0
                            && ap.taint_sub_fields()
                        {
                            add_left = true;
                            target_type = Some(field.ty().clone());
                            if let Some(base_ap) = mgr.ap_factory().create(&Value::local(base), true)
                            {
                                mapped = base_ap;
                            }
                        }
                    }
                    Value::Local(_) if ap.is_instance_field_ref() => {
                        if plain
                            .as_ref()
                            .map_or(false, |p| aliasing.may_alias_values(&rv, p, mgr))
                        {
                            add_left = true;
                            target_type = ap.base_type().cloned();
                        }
                    }
                    _ => {
                        let aliases = plain
                            .as_ref()
                            .map_or(false, |p| aliasing.may_alias_values(&rv, p, mgr));
                        if aliases && !matches!(rhs, Value::NewArray { .. }) {
                            add_left = true;
                            target_type = ap.base_type().cloned();
                        }
                    }
                }
                if add_left {
                    break;
                }
            }
        }

        if !add_left {
            return None;
        }

        // Inactive aliases of values that cannot be aliased again are not copied
        let lhs_ty = lhs.ty();
        if !new_source.is_abstraction_active()
            && (lhs_ty.is_primitive() || (lhs_ty.is_string() && !ap.can_have_immutable_aliases()))
        {
            return Some(singleton(Arc::clone(new_source)));
        }

        let target = if mapped == *ap {
            Arc::clone(new_source)
        } else {
            Abstraction::derive_new_abstraction(new_source, Some(mapped), None)?
        };
        let mut res = FactSet::default();
        self.add_taint_via_stmt(d1, stmt, lhs, rhs, &target, &mut res, cut_first_field, target_type);
        res.insert(Arc::clone(new_source));
        Some(res)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_taint_via_stmt(
        &self,
        d1: &AbsRef,
        stmt: &Stmt,
        lhs: &Value,
        rhs: &Value,
        source: &AbsRef,
        taint_set: &mut FactSet,
        cut_first_field: bool,
        mut target_type: Option<Type>,
    ) {
        let mgr = &self.manager;
        let config = mgr.config();
        let static_mode = config.static_field_tracking_mode;
        if matches!(lhs, Value::StaticField(_)) && static_mode == StaticFieldTrackingMode::None {
            return;
        }

        let factory = mgr.ap_factory();
        let ap = source.access_path();
        let mut new_abs: Option<AbsRef> = None;
        if !ap.is_empty() {
            if let (Value::ArrayRef { .. }, Some(tt)) = (lhs, &target_type) {
                target_type = TypeUtils::build_array_or_add_dimension(tt, &Type::array_of(lhs.ty()));
            }
            match rhs {
                Value::Cast { cast_type, .. } => {
                    let storable = target_type.as_ref().map_or(false, |tt| {
                        mgr.type_utils().hierarchy().can_store_type(tt, cast_type)
                    });
                    if !storable {
                        target_type = Some(cast_type.clone());
                    }
                }
                Value::Binary { op, .. } if op.is_comparison() || op.is_condition() => {
                    target_type = None;
                }
                Value::Length(_) => target_type = None,
                Value::InstanceOf { .. } if config.enable_instance_of_tainting => {
                    let bool_ap = factory.create_typed(
                        lhs,
                        Some(Type::Boolean),
                        true,
                        ArrayTaintType::ContentsAndLength,
                    );
                    new_abs = Abstraction::derive_new_abstraction(source, bool_ap, Some(stmt.id));
                }
                _ => {}
            }
        }

        let array_taint_type =
            if matches!(lhs, Value::ArrayRef { .. }) && config.enable_array_size_tainting {
                ArrayTaintType::Contents
            } else {
                ap.array_taint_type()
            };

        if new_abs.is_none() {
            new_abs = if ap.is_empty() {
                Abstraction::derive_new_abstraction_implicit(
                    source,
                    factory.create(lhs, true),
                    Some(stmt.id),
                    true,
                )
            } else {
                let new_ap = factory.copy_with_new_value_full(
                    ap,
                    lhs,
                    target_type,
                    cut_first_field,
                    true,
                    array_taint_type,
                );
                Abstraction::derive_new_abstraction(source, new_ap, Some(stmt.id))
            };
        }
        let Some(new_abs) = new_abs else {
            return;
        };

        if matches!(lhs, Value::StaticField(_))
            && static_mode == StaticFieldTrackingMode::ContextFlowInsensitive
        {
            mgr.global_taints().add(mgr, new_abs);
            return;
        }
        taint_set.insert(Arc::clone(&new_abs));
        if Aliasing::can_have_aliases(stmt, lhs, &new_abs) {
            mgr.aliasing()
                .compute_aliases(d1, stmt.id, lhs, taint_set, stmt.method, &new_abs, mgr);
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Callee-side access paths for the caller-side `ap`, `None` if the
    /// call does not touch it
    fn map_access_path_to_callee(
        &self,
        callee: &Method,
        inv: &InvokeExpr,
        ap: &ApRef,
        reflective: bool,
    ) -> Option<Vec<ApRef>> {
        if ap.is_empty() {
            return None;
        }
        let mgr = &self.manager;
        let aliasing = mgr.aliasing();
        let factory = mgr.ap_factory();
        let mut res: Option<Vec<ApRef>> = None;

        if aliasing.strategy().is_lazy_analysis() && Aliasing::can_have_aliases_ap(ap) {
            res.get_or_insert_with(Vec::new).push(Arc::clone(ap));
        }
        let Some(plain) = ap.plain_value().map(Value::local) else {
            return res;
        };

        if !ap.is_static_field_ref() && !callee.is_static {
            if let (Some(base), Some(this)) = (&inv.base, &callee.this_local) {
                if aliasing.may_alias_values(&Value::local(base), &plain, mgr)
                    && mgr
                        .type_utils()
                        .has_compatible_types_for_call(ap, callee.class())
                {
                    let mapped = factory.copy_with_new_value(ap, &Value::local(this));
                    res.get_or_insert_with(Vec::new).extend(mapped);
                }
            }
        }

        if reflective {
            // Method.invoke(receiver, args): a tainted argument array may reach
            // any parameter
            if inv.args.get(1).map_or(false, |arr| aliasing.may_alias_values(arr, &plain, mgr)) {
                let res = res.get_or_insert_with(Vec::new);
                for param in &callee.param_locals {
                    res.extend(factory.copy_with_new_value(ap, &Value::local(param)));
                }
            }
        } else if callee.param_count() > 0 {
            for (i, arg) in inv.args.iter().enumerate() {
                if !aliasing.may_alias_values(arg, &plain, mgr) {
                    continue;
                }
                let res = res.get_or_insert_with(Vec::new);
                if let Some(param) = callee.param_locals.get(i) {
                    res.extend(factory.copy_with_new_value(ap, &Value::local(param)));
                }
            }
        }
        res
    }

    fn call_targets(&self, d1: &AbsRef, source: &AbsRef, call: StmtId, callee: MethodId) -> FactSet {
        let mgr = &self.manager;
        if self.flow_limit_reached() || mgr.is_zero(source) || mgr.is_excluded(callee) {
            return FactSet::default();
        }
        let method = mgr.method(callee);
        if !method.has_body() {
            return FactSet::default();
        }
        mgr.notify_flow_in(call, source, FlowFunctionType::Call);

        let stmt = mgr.stmt(call);
        let mut kill = KillFlags::default();
        let from_rules = self.rules.apply_call(d1, source, stmt, callee, &mut kill);
        if kill.kill_all {
            return FactSet::default();
        }
        let mut res = from_rules.unwrap_or_default();
        let Some(inv) = stmt.invoke_expr() else {
            return res;
        };
        let reflective = mgr.icfg().is_reflective_call_site(call);
        let Some(mapped) = self.map_access_path_to_callee(method, inv, source.access_path(), reflective)
        else {
            return res;
        };

        let lazy = mgr.aliasing().strategy().is_lazy_analysis();
        for ap in mapped {
            // Parameters the callee never reads cannot carry the taint anywhere
            let read = ap
                .plain_value()
                .map_or(false, |p| mgr.icfg().method_reads_value(callee, p));
            if lazy || source.is_implicit() || read {
                res.extend(Abstraction::derive_new_abstraction(source, Some(ap), Some(call)));
            }
        }
        res
    }

    // ========================================================================
    // Returns
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    fn return_targets(
        &self,
        call_site: Option<StmtId>,
        callee: MethodId,
        exit: StmtId,
        ret_site: Option<StmtId>,
        source: &AbsRef,
        callee_d1: &AbsRef,
        caller_d1s: &[AbsRef],
    ) -> FactSet {
        let mgr = &self.manager;
        if self.flow_limit_reached() || mgr.is_zero(source) {
            return FactSet::default();
        }
        mgr.notify_flow_in(exit, source, FlowFunctionType::Return);

        let callers_conditional = caller_d1s.iter().any(|d1| mgr.is_conditional(d1));
        let new_source = match call_site {
            Some(cs) => self.activate_at(source, cs),
            None => Arc::clone(source),
        };
        // Still inactive: the alias has not left the method that activates it
        if let (false, Some(unit)) = (new_source.is_abstraction_active(), new_source.activation_unit())
        {
            if mgr.icfg().method_of(unit) == callee {
                return FactSet::default();
            }
        }

        let exit_stmt = mgr.stmt(exit);
        let ret_stmt = ret_site.map(|r| mgr.stmt(r));
        let call_stmt = call_site.map(|c| mgr.stmt(c));
        let mut kill = KillFlags::default();
        let from_rules = self.rules.apply_return(
            caller_d1s,
            callee_d1,
            &new_source,
            exit_stmt,
            ret_stmt,
            call_stmt,
            &mut kill,
        );
        if kill.kill_all {
            return FactSet::default();
        }
        let Some(call_stmt) = call_stmt else {
            return FactSet::default();
        };
        let call_site = call_stmt.id;
        let caller = call_stmt.method;
        let mut res = from_rules.unwrap_or_default();

        let aliasing = mgr.aliasing();
        let strategy = aliasing.strategy();
        let factory = mgr.ap_factory();
        let type_utils = mgr.type_utils();
        let method = mgr.method(callee);
        let ap = new_source.access_path();

        if strategy.is_lazy_analysis() && Aliasing::can_have_aliases_ap(ap) {
            res.insert(Arc::clone(&new_source));
        }

        let ret_is_handler = ret_stmt.map_or(false, Stmt::is_caught_exception_def);
        let plain = ap.plain_value().map(Value::local);
        if let (false, false, Some(plain)) = (
            ap.is_static_field_ref(),
            method.is_static_initializer(),
            plain,
        ) {
            let lhs = if ret_is_handler { None } else { call_stmt.left_op() };

            // Returned value flows into the left side of the call
            if let (Some(ret_op), Some(lhs)) = (exit_stmt.return_op(), &lhs) {
                if aliasing.may_alias_values(ret_op, &plain, mgr) {
                    let new_ap = factory.copy_with_new_value(ap, lhs);
                    if let Some(abs) =
                        Abstraction::derive_new_abstraction(&new_source, new_ap, Some(exit))
                    {
                        res.insert(Arc::clone(&abs));
                        if strategy.requires_analysis_on_return() {
                            for d1 in caller_d1s {
                                aliasing.compute_aliases(d1, call_site, lhs, &mut res, caller, &abs, mgr);
                            }
                        }
                    }
                }
            }

            let Some(inv) = call_stmt.invoke_expr() else {
                return self.finish_return(res, &new_source, call_site, caller, caller_d1s, callers_conditional);
            };

            // Heap objects reachable from parameters are shared with the caller
            let mut parameter_aliases = false;
            for (i, param) in method.param_locals.iter().enumerate() {
                let Some(arg) = inv.arg(i) else {
                    continue;
                };
                if lhs.as_ref() == Some(arg) {
                    continue;
                }
                if !aliasing.may_alias_values(&Value::local(param), &plain, mgr) {
                    continue;
                }
                parameter_aliases = true;
                if !arg.can_contain_value() || !type_utils.check_cast_ap(ap, &arg.ty()) {
                    continue;
                }
                if !ap.taint_sub_fields() {
                    continue;
                }
                let base_type = ap.base_type();
                if base_type.map_or(false, Type::is_primitive) {
                    continue;
                }
                if base_type.map_or(false, Type::is_string) && !ap.can_have_immutable_aliases() {
                    continue;
                }
                if mgr.icfg().method_writes_value(callee, param) {
                    continue;
                }
                let new_ap = factory.copy_with_new_value_typed(ap, arg, base_type.cloned(), false);
                if let Some(abs) = Abstraction::derive_new_abstraction(&new_source, new_ap, Some(exit))
                {
                    res.insert(Arc::clone(&abs));
                    for d1 in caller_d1s {
                        aliasing.compute_aliases(d1, call_site, arg, &mut res, caller, &abs, mgr);
                    }
                }
            }

            let this_aliases = match (&lhs, &method.this_local) {
                (Some(Value::Local(l)), Some(this)) => l == this,
                _ => false,
            };
            if !parameter_aliases && !this_aliases && ap.taint_sub_fields() {
                if let (Some(this), Some(base)) = (&method.this_local, &inv.base) {
                    if aliasing.may_alias_values(&Value::local(this), &plain, mgr)
                        && type_utils.check_cast_ap(ap, this.ty())
                    {
                        let base_val = Value::local(base);
                        let new_ap =
                            factory.copy_with_new_value_typed(ap, &base_val, ap.base_type().cloned(), false);
                        if let Some(abs) =
                            Abstraction::derive_new_abstraction(&new_source, new_ap, Some(exit))
                        {
                            res.insert(Arc::clone(&abs));
                            if *abs != **callee_d1 {
                                for d1 in caller_d1s {
                                    aliasing.compute_aliases(
                                        d1, call_site, &base_val, &mut res, caller, &abs, mgr,
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        self.finish_return(res, &new_source, call_site, caller, caller_d1s, callers_conditional)
    }

    /// Alias searches for implicit facts and the call site bookkeeping of
    /// every fact handed back to the caller
    fn finish_return(
        &self,
        mut res: FactSet,
        new_source: &AbsRef,
        call_site: StmtId,
        caller: MethodId,
        caller_d1s: &[AbsRef],
        callers_conditional: bool,
    ) -> FactSet {
        let mgr = &self.manager;
        let aliasing = mgr.aliasing();
        let on_return = aliasing.strategy().requires_analysis_on_return();
        let snapshot: Vec<AbsRef> = res.iter().cloned().collect();
        for abs in &snapshot {
            if (abs.is_implicit() && !callers_conditional) || on_return {
                let Some(target) = alias_target(abs) else {
                    continue;
                };
                for d1 in caller_d1s {
                    aliasing.compute_aliases(d1, call_site, &target, &mut res, caller, abs, mgr);
                }
            }
        }
        res.into_iter()
            .map(|abs| {
                if Arc::ptr_eq(&abs, new_source) {
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
        if self.flow_limit_reached() {
            return FactSet::default();
        }
        mgr.notify_flow_in(call, source, FlowFunctionType::CallToReturn);

        let new_source = self.activate_at(source, call);
        let stmt = mgr.stmt(call);
        let mut kill = KillFlags::default();
        let mut res = self
            .rules
            .apply_call_to_return(d1, &new_source, stmt, &mut kill, true);
        if kill.kill_all {
            return FactSet::default();
        }
        if mgr.is_zero(source) {
            return res;
        }
        let leaving_method = new_source
            .top_postdominator()
            .map_or(false, |top| top.unit.is_none());
        if leaving_method {
            return singleton(new_source);
        }

        let mut pass_on = !kill.kill_source;
        let ap = new_source.access_path();
        if ap.is_static_field_ref() {
            pass_on = false;
        }

        let config = mgr.config();
        let icfg = mgr.icfg();
        let program = mgr.program();
        let aliasing = mgr.aliasing();
        let callees = icfg.callees_of_call_at(call);
        let inv = stmt.invoke_expr();

        let src_ap = source.access_path();
        let base_type = src_ap.base_type();
        let is_primitive_or_string = base_type.map_or(false, Type::is_primitive)
            || (base_type.map_or(false, Type::is_string) && !src_ap.can_have_immutable_aliases());
        let has_valid_callees = callees.iter().any(|&c| program.method(c).is_concrete());

        // A field taint on an object the callees see is carried through them instead
        if pass_on
            && has_valid_callees
            && !is_primitive_or_string
            && (config.inspect_sources || !mgr.is_source_stmt(call))
            && (config.inspect_sinks || !mgr.is_sink_stmt(call))
            && ap.is_instance_field_ref()
        {
            if let (Some(inv), Some(plain)) = (inv, ap.plain_value().map(Value::local)) {
                let all_callees_read = callees.iter().all(|&c| {
                    if mgr.is_excluded(c) {
                        return false;
                    }
                    let m = program.method(c);
                    if !m.is_concrete() {
                        return true;
                    }
                    self.map_access_path_to_callee(m, inv, src_ap, icfg.is_reflective_call_site(call))
                        .map_or(true, |aps| {
                            aps.iter().all(|mapped| {
                                mapped
                                    .plain_value()
                                    .map_or(true, |p| icfg.method_reads_value(c, p))
                            })
                        })
                });
                if all_callees_read {
                    let on_base = inv
                        .base
                        .as_ref()
                        .map_or(false, |b| aliasing.may_alias_values(&Value::local(b), &plain, mgr));
                    let on_arg = inv
                        .args
                        .iter()
                        .any(|arg| aliasing.may_alias_values(arg, &plain, mgr));
                    if on_base || on_arg {
                        pass_on = false;
                    }
                }
            }
        }

        // Static taints skip callees that never touch the field
        if let (true, Some(field)) = (src_ap.is_static_field_ref(), src_ap.first_field()) {
            if !callees.iter().any(|&c| icfg.is_static_field_used(c, field)) {
                pass_on = true;
            }
        }

        pass_on |= source.top_postdominator().is_some() || src_ap.is_empty();
        if pass_on && !mgr.is_zero(&new_source) {
            res.insert(Arc::clone(&new_source));
        }

        if let Some(inv) = inv {
            self.apply_native_handler(d1, stmt, inv, callees, &new_source, &mut res);
        }

        res.into_iter()
            .map(|abs| {
                if Arc::ptr_eq(&abs, &new_source) {
                    abs
                } else {
                    Abstraction::with_corresponding_call_site(abs, call)
                }
            })
            .collect()
    }

    fn apply_native_handler(
        &self,
        d1: &AbsRef,
        stmt: &Stmt,
        inv: &InvokeExpr,
        callees: &[MethodId],
        new_source: &AbsRef,
        res: &mut FactSet,
    ) {
        let mgr = &self.manager;
        let Some(handler) = mgr.native_handler() else {
            return;
        };
        let program = mgr.program();
        let is_native = callees.iter().any(|&c| program.method(c).is_native)
            || program
                .method_by_signature(&inv.method.signature())
                .map_or(false, |m| m.is_native);
        let Some(plain) = new_source.access_path().plain_value() else {
            return;
        };
        if !is_native || !inv.args.iter().any(|arg| arg.as_local() == Some(plain)) {
            return;
        }
        let Some(native_abs) = handler.tainted_values(stmt, new_source, &inv.args, mgr) else {
            return;
        };
        for abs in native_abs {
            res.insert(Arc::clone(&abs));
            let Some(target) = alias_target(&abs) else {
                continue;
            };
            if abs.access_path().is_static_field_ref()
                || Aliasing::can_have_aliases(stmt, &target, &abs)
            {
                mgr.aliasing()
                    .compute_aliases(d1, stmt.id, &target, res, stmt.method, &abs, mgr);
            }
        }
    }
}

impl IfdsProblem for InfoflowProblem {
    fn icfg(&self) -> &dyn InterproceduralCfg {
        self.manager.icfg()
    }

    fn zero_value(&self) -> &AbsRef {
        self.manager.zero_value()
    }

    fn initial_seeds(&self) -> Vec<(StmtId, AbsRef)> {
        let zero = self.manager.zero_value();
        self.seeds
            .iter()
            .map(|&stmt| (stmt, Arc::clone(zero)))
            .collect()
    }

    fn follow_returns_past_seeds(&self) -> bool {
        self.manager.config().solver.follow_returns_past_seeds
    }

    fn normal_flow(&self, d1: &AbsRef, d2: &AbsRef, curr: StmtId, succ: StmtId) -> FactSet {
        let mgr = &self.manager;
        mgr.notify_flow_in(curr, d2, FlowFunctionType::Normal);

        let new_source = if !d2.is_abstraction_active() && d2.activation_unit() == Some(curr) {
            Abstraction::active_copy(d2)
        } else {
            Arc::clone(d2)
        };
        let stmt = mgr.stmt(curr);
        let mut kill = KillFlags::default();
        let mut res = self
            .rules
            .apply_normal(d1, &new_source, stmt, mgr.stmt(succ), &mut kill);
        if kill.kill_all {
            return FactSet::default();
        }
        if let (StmtKind::Assign { lhs, rhs }, false) = (&stmt.kind, mgr.is_zero(&new_source)) {
            if let Some(assigned) = self.taint_on_assignment(d1, stmt, lhs, rhs, &new_source) {
                res.extend(assigned);
            }
        }
        mgr.notify_flow_out(curr, Some(d1), d2, res, FlowFunctionType::Normal)
    }

    fn call_flow(&self, d1: &AbsRef, d2: &AbsRef, call: StmtId, callee: MethodId) -> FactSet {
        let mgr = &self.manager;
        let res = self.call_targets(d1, d2, call, callee);
        for abs in &res {
            mgr.aliasing()
                .inject_calling_context(abs, callee, call, d2, d1, mgr);
        }
        mgr.notify_flow_out(call, Some(d1), d2, res, FlowFunctionType::Call)
    }

    fn return_flow(
        &self,
        call_site: Option<StmtId>,
        callee: MethodId,
        exit: StmtId,
        ret_site: Option<StmtId>,
        d2: &AbsRef,
        callee_d1: &AbsRef,
        caller_d1s: &[AbsRef],
    ) -> FactSet {
        let res = self.return_targets(call_site, callee, exit, ret_site, d2, callee_d1, caller_d1s);
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
        let res = self.call_to_return_targets(d1, d2, call);
        self.manager
            .notify_flow_out(call, Some(d1), d2, res, FlowFunctionType::CallToReturn)
    }
}
