//! Control dependencies on tainted conditions
//!
//! A branch on a tainted value pushes its postdominator onto the fact; the
//! branch is left once that postdominator is reached. Conditional facts carry
//! an empty access path and taint every assignment made while they are live.

use super::{singleton, KillFlags, PropagationRule};
use crate::features::abstraction::{AbsRef, Abstraction, AbstractionAtSink};
use crate::features::aliasing::Aliasing;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, Stmt, StmtId, StmtKind, Value};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;

pub struct ImplicitPropagationRule {
    manager: Arc<InfoflowManager>,
    /// Call sites already entered with a conditional fact, per calling context
    implicit_targets: DashMap<StmtId, FxHashSet<AbsRef>>,
}

impl ImplicitPropagationRule {
    pub fn new(manager: Arc<InfoflowManager>) -> Self {
        Self {
            manager,
            implicit_targets: DashMap::new(),
        }
    }

    /// Reaching the top postdominator ends the branch; a conditional fact
    /// with nothing left on its stack dies there
    fn leaves_conditional_branch(&self, stmt: &Stmt, source: &AbsRef, kill: &mut KillFlags) -> bool {
        if !source.is_top_postdominator_unit(stmt.id) {
            return false;
        }
        let dropped = Abstraction::drop_top_postdominator(source);
        if dropped.access_path().is_empty() && dropped.top_postdominator().is_none() {
            kill.kill_all = true;
            return true;
        }
        false
    }

    fn condition_values(&self, stmt: &Stmt, dest: &Stmt) -> Vec<Value> {
        if self.manager.icfg().is_exceptional_edge_between(stmt.id, dest.id) {
            return stmt.uses();
        }
        match &stmt.kind {
            StmtKind::If { cond, .. } => match cond {
                Value::Local(_) => vec![cond.clone()],
                _ => {
                    let mut out = Vec::new();
                    cond.collect_uses(&mut out);
                    out
                }
            },
            _ => Vec::new(),
        }
    }

    fn report_sink(&self, source: &AbsRef, stmt: &Stmt) {
        if !self.manager.is_sink_stmt(stmt.id) {
            return;
        }
        if let Some(info) = self
            .manager
            .source_sink_oracle()
            .sink_info(stmt, &self.manager, None)
        {
            self.manager
                .add_result(AbstractionAtSink::new(info.definition, Arc::clone(source), stmt.id));
        }
    }

    fn any_conditional(&self, d1s: &[AbsRef]) -> bool {
        d1s.iter().any(|d1| self.manager.is_conditional(d1))
    }
}

impl PropagationRule for ImplicitPropagationRule {
    fn name(&self) -> &'static str {
        "implicit"
    }

    fn propagate_normal_flow(
        &self,
        _d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        dest: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        if self.manager.is_zero(source) || self.leaves_conditional_branch(stmt, source, kill) {
            return None;
        }
        // Inside a conditionally called method every assignment is tainted anyway
        if !source.is_abstraction_active() || source.access_path().is_empty() {
            return None;
        }
        let plain = Value::local(source.access_path().plain_value()?);

        let aliasing = self.manager.aliasing();
        let icfg = self.manager.icfg();
        for val in self.condition_values(stmt, dest) {
            if !aliasing.may_alias_values(&val, &plain, &self.manager) {
                continue;
            }
            let postdom = icfg.postdominator_of(stmt.id);
            let same_method_exit = postdom.method.is_none()
                && match (source.top_postdominator(), postdom.unit) {
                    (Some(top), Some(unit)) => top.method == Some(icfg.method_of(unit)),
                    _ => false,
                };
            if same_method_exit {
                continue;
            }
            let empty = self.manager.ap_factory().empty();
            let entered = Abstraction::derive_conditional_enter(source, &empty, postdom, stmt.id)?;
            crate::trace_flow!(stmt = %stmt.id, "Entered tainted conditional");
            return Some(singleton(entered));
        }
        None
    }

    fn propagate_call_flow(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        _dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        if self.manager.is_zero(source) || self.leaves_conditional_branch(stmt, source, kill) {
            return None;
        }

        // Implicit tracking through this call already covers explicit facts
        let blocked = self
            .implicit_targets
            .get(&stmt.id)
            .map_or(false, |ctxs| ctxs.contains(d1));
        if blocked {
            kill.kill_all = true;
            return None;
        }

        if source.access_path().is_empty() {
            self.implicit_targets
                .entry(stmt.id)
                .or_default()
                .insert(Arc::clone(d1));
            let empty = self.manager.ap_factory().empty();
            return Abstraction::derive_conditional_call(source, &empty, stmt.id).map(singleton);
        }
        if source.top_postdominator().is_some() {
            kill.kill_all = true;
        }
        None
    }

    fn propagate_call_to_return_flow(
        &self,
        d1: &AbsRef,
        source: &AbsRef,
        stmt: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        if self.manager.is_zero(source) || self.leaves_conditional_branch(stmt, source, kill) {
            return None;
        }

        // Inside a tainted conditional every sink call leaks
        let ap = source.access_path();
        if source.is_abstraction_active() {
            if ap.is_empty() || source.top_postdominator().is_some() {
                self.report_sink(source, stmt);
            } else {
                let method = self.manager.method(stmt.method);
                let on_this = !method.is_static
                    && ap.first_field().is_none()
                    && match (&method.this_local, ap.plain_value()) {
                        (Some(this), Some(plain)) => self.manager.aliasing().may_alias_values(
                            &Value::local(this),
                            &Value::local(plain),
                            &self.manager,
                        ),
                        _ => false,
                    };
                if on_this {
                    self.report_sink(source, stmt);
                }
            }
        }

        if !stmt.is_definition() {
            return None;
        }
        let implicit_taint = source
            .top_postdominator()
            .map_or(false, |top| top.unit.is_some())
            || ap.is_empty();
        if !implicit_taint {
            return None;
        }
        let lhs = stmt.left_op()?;
        // Locals written in a conditionally called method are invisible to the caller
        if self.manager.is_conditional(d1) && !lhs.is_field_ref() {
            return None;
        }
        let new_ap = self.manager.ap_factory().create(&lhs, true);
        Abstraction::derive_new_abstraction(source, new_ap, Some(stmt.id)).map(singleton)
    }

    fn propagate_return_flow(
        &self,
        caller_d1s: &[AbsRef],
        _callee_d1: &AbsRef,
        source: &AbsRef,
        exit: &Stmt,
        _ret_site: Option<&Stmt>,
        call_site: Option<&Stmt>,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        let callers_conditional = self.any_conditional(caller_d1s);
        let factory = self.manager.ap_factory();

        if source.access_path().is_empty() {
            // A constant returned inside the conditional taints the call's result
            let returns_constant = matches!(&exit.kind, StmtKind::Return(op) if op.is_constant());
            if let (true, Some(call_site)) = (returns_constant, call_site) {
                if let Some(lhs) = call_site.left_op() {
                    let ap = factory.copy_with_new_value(source.access_path(), &lhs);
                    let abs = Abstraction::derive_new_abstraction(source, ap, Some(exit.id))?;
                    let mut res = singleton(Arc::clone(&abs));
                    if Aliasing::can_have_aliases(call_site, &lhs, &abs) && !callers_conditional {
                        for d1 in caller_d1s {
                            self.manager.aliasing().compute_aliases(
                                d1,
                                exit.id,
                                &lhs,
                                &mut res,
                                call_site.method,
                                &abs,
                                &self.manager,
                            );
                        }
                    }
                    return Some(res);
                }
            }
            kill.kill_all = true;
            return None;
        }

        let call_site = call_site?;
        if !exit.is_return() {
            return None;
        }
        let lhs = call_site.left_op()?;
        if source.top_postdominator().is_none() || !lhs.is_field_ref() {
            return None;
        }
        let ap = factory.copy_with_new_value(source.access_path(), &lhs);
        let abs = Abstraction::derive_new_abstraction(source, ap, Some(exit.id))?;
        let mut res = singleton(Arc::clone(&abs));
        // Aliases of the implicitly tainted field are mapped back into the caller
        if abs.is_implicit() && abs.access_path().is_field_ref() && !callers_conditional {
            for d1 in caller_d1s {
                self.manager.aliasing().compute_aliases(
                    d1,
                    call_site.id,
                    &lhs,
                    &mut res,
                    call_site.method,
                    &abs,
                    &self.manager,
                );
            }
        }
        Some(res)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{manager_for, taint};
    use super::*;
    use crate::config::{ImplicitFlowMode, InfoflowConfig};
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{MethodRef, ProgramBuilder, Type};

    #[test]
    fn test_branch_on_taint_enters_and_leaves_conditional() {
        let mut pb = ProgramBuilder::new();
        pb.class("app.Main", None);
        let main = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let secret = mb.local("secret", Type::Int);
        let y = mb.local("y", Type::Int);
        let branch = mb.if_goto(Value::local(&secret));
        let inside = mb.assign(Value::local(&y), Value::int(1));
        let join = mb.nop();
        mb.set_target(branch, join);
        mb.ret_void();
        let id = mb.finish();
        pb.entry_point(id);

        let config = InfoflowConfig::default().with_implicit_flow_mode(ImplicitFlowMode::AllImplicitFlows);
        let mgr = manager_for(pb.build(), config, MethodSourceSinkManager::new(), &[], &[]);
        let rule = ImplicitPropagationRule::new(Arc::clone(&mgr));
        let zero = Arc::clone(mgr.zero_value());
        let t = taint(&mgr, &Value::local(&secret), StmtId(0));

        let mut kill = KillFlags::default();
        let entered = rule
            .propagate_normal_flow(&zero, &t, mgr.stmt(branch), mgr.stmt(inside), &mut kill)
            .unwrap();
        let cond = entered.into_iter().next().unwrap();
        assert!(mgr.is_conditional(&cond));
        assert!(cond.is_implicit());
        assert!(cond.is_top_postdominator_unit(join));

        // The conditional fact dies at the join point
        let mut kill = KillFlags::default();
        rule.propagate_normal_flow(&zero, &cond, mgr.stmt(join), mgr.stmt(join), &mut kill);
        assert!(kill.kill_all);
    }
}
