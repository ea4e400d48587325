//! Flow-insensitive aliasing over a points-to oracle
//!
//! Runs once per (method, taint): every statement of the method whose
//! operands may point to the tainted object yields an alias, which is
//! injected into the forward solver at that statement. Aliases found before
//! the statement that created the taint stay inactive until it is passed.

use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::access_path::{AccessPathFragment, AccessPathRequest};
use crate::features::aliasing::ports::AliasingStrategy;
use crate::features::ifds_solver::{FactSet, PathEdge};
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::features::taint_analysis::ports::PtsTarget;
use crate::shared::ir::{MethodId, StmtId, Value};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
pub struct PtsBasedAliasStrategy {
    /// (method, taint) -> contexts already searched
    searched: DashMap<(MethodId, AbsRef), FxHashSet<AbsRef>>,
}

fn is_heap_operand(val: &Value) -> bool {
    matches!(
        val,
        Value::Local(_) | Value::InstanceField { .. } | Value::StaticField(_) | Value::ArrayRef { .. }
    )
}

impl PtsBasedAliasStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_internal(
        &self,
        d1: &AbsRef,
        method: MethodId,
        new_abs: &AbsRef,
        appends: &[AccessPathFragment],
        taint_sub_fields: bool,
        act_stmt: StmtId,
        manager: &InfoflowManager,
    ) {
        if !self
            .searched
            .entry((method, Arc::clone(new_abs)))
            .or_default()
            .insert(Arc::clone(d1))
        {
            return;
        }

        let factory = manager.ap_factory();
        let ap = new_abs.access_path();

        // Prefixes of the path may have aliases of their own
        if ap.is_instance_field_ref() || (ap.is_static_field_ref() && ap.fragment_count() > 1) {
            if let Some(last) = ap.fragments().last() {
                let mut extended = Vec::with_capacity(appends.len() + 1);
                extended.push(last.clone());
                extended.extend_from_slice(appends);
                let parent_ap = factory.drop_last_field(ap);
                if let Some(parent) = Abstraction::derive_new_abstraction(new_abs, parent_ap, None) {
                    self.compute_internal(
                        d1,
                        method,
                        &parent,
                        &extended,
                        taint_sub_fields,
                        act_stmt,
                        manager,
                    );
                }
            }
        }

        if ap.fragment_count() > 1 {
            return;
        }
        let Some(taint_target) = PtsTarget::of_access_path(ap) else {
            return;
        };
        let Some(forward) = manager.forward_solver() else {
            return;
        };
        let pts = manager.points_to();
        let fsa = manager.config().effective_flow_sensitive_aliasing();
        let aliased = |val: &Value| {
            PtsTarget::of_value(val).map_or(false, |t| pts.may_alias(taint_target, t))
        };
        let deactivate = |abs: AbsRef, before_act: bool| {
            if before_act {
                Abstraction::derive_inactive_abstraction(&abs, act_stmt, fsa)
            } else {
                abs
            }
        };

        let body = &manager.method(method).body;
        let mut before_act = body.contains(&act_stmt);
        for &sid in body {
            if sid == act_stmt {
                before_act = false;
            }
            let stmt = manager.stmt(sid);

            if let Some(inv) = stmt.invoke_expr() {
                let base_aliases = !ap.is_static_field_ref()
                    && match (&inv.base, ap.plain_value()) {
                        (Some(base), Some(plain)) => {
                            pts.may_alias(PtsTarget::Local(base), PtsTarget::Local(plain))
                        }
                        _ => false,
                    };
                let param_aliases = inv
                    .args
                    .iter()
                    .filter_map(Value::as_local)
                    .any(|arg| pts.may_alias(PtsTarget::Local(arg), taint_target));
                if base_aliases || param_aliases {
                    let new_ap = factory.append_fields(ap, appends, taint_sub_fields);
                    if let Some(abs) = Abstraction::derive_new_abstraction(new_abs, new_ap, Some(sid)) {
                        let abs = deactivate(abs, before_act);
                        trace!(stmt = %sid, fact = %abs, "Alias passed into call");
                        forward.process_edge(PathEdge::new(Arc::clone(d1), sid, abs));
                    }
                }
                continue;
            }

            if !stmt.is_definition() {
                continue;
            }
            let (Some(lhs), Some(rhs)) = (stmt.left_op(), stmt.right_op()) else {
                continue;
            };

            // a = b with the taint aliasing b: a inherits the appended fields
            if is_heap_operand(rhs) && !appends.is_empty() && aliased(rhs) {
                let new_ap = factory.create_with(
                    AccessPathRequest::of(&lhs)
                        .fragments(appends.to_vec())
                        .taint_sub_fields(taint_sub_fields),
                );
                if let Some(abs) = Abstraction::derive_new_abstraction(new_abs, new_ap, Some(sid)) {
                    let abs = deactivate(abs, before_act);
                    let tsf = abs.access_path().taint_sub_fields();
                    self.compute_internal(d1, method, &abs, &[], tsf, sid, manager);
                }
            }

            // a = b with the taint aliasing a: b is tainted as well
            if is_heap_operand(&lhs) && is_heap_operand(rhs) && aliased(&lhs) {
                let new_ap = factory.create_with(
                    AccessPathRequest::of(rhs)
                        .fragments(appends.to_vec())
                        .taint_sub_fields(taint_sub_fields),
                );
                if let Some(abs) = Abstraction::derive_new_abstraction(new_abs, new_ap, Some(sid)) {
                    let abs = deactivate(abs, before_act);
                    trace!(stmt = %sid, fact = %abs, "Alias of assigned value");
                    forward.process_edge(PathEdge::new(Arc::clone(d1), sid, abs));
                }
            }
        }
    }

    /// Number of (method, taint) pairs searched so far
    pub fn searched_count(&self) -> usize {
        self.searched.len()
    }
}

impl AliasingStrategy for PtsBasedAliasStrategy {
    fn name(&self) -> &'static str {
        "pts_based"
    }

    fn compute_alias_taints(
        &self,
        d1: &AbsRef,
        src: StmtId,
        _target_value: &Value,
        _taint_set: &mut FactSet,
        method: MethodId,
        new_abs: &AbsRef,
        manager: &InfoflowManager,
    ) {
        let tsf = new_abs.access_path().taint_sub_fields();
        self.compute_internal(d1, method, new_abs, &[], tsf, src, manager);
    }

    fn is_flow_sensitive(&self) -> bool {
        false
    }

    fn requires_analysis_on_return(&self) -> bool {
        true
    }
}
