/*
 * Interprocedural CFG over a Program
 *
 * Everything except the transitive static field queries is precomputed at
 * construction:
 * - intraprocedural successors, including branch targets and exceptional
 *   edges from throwing statements to the handlers covering them
 * - call targets by class hierarchy analysis (static and special calls
 *   resolve through superclasses, virtual calls over all subtypes of the
 *   receiver type)
 * - immediate postdominators per statement
 *
 * `BackwardsIcfg` is the reversed view used by the alias search.
 */

use crate::features::abstraction::UnitContainer;
use crate::features::taint_analysis::ports::InterproceduralCfg;
use crate::shared::ir::{
    Field, InvokeKind, Local, LocalId, Method, MethodId, Program, Stmt, StmtId, StmtKind, Value,
};
use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

const REFLECTION_CLASS: &str = "java.lang.reflect.Method";
const REFLECTION_METHOD: &str = "invoke";

/// Direct static field accesses of one method
#[derive(Debug, Default)]
struct StaticFieldAccess {
    reads: FxHashSet<Field>,
    writes: FxHashSet<Field>,
}

#[derive(Debug)]
pub struct ProgramIcfg {
    program: Arc<Program>,
    succs: Vec<Vec<StmtId>>,
    preds: Vec<Vec<StmtId>>,
    exceptional_edges: FxHashSet<(StmtId, StmtId)>,
    callees: Vec<Vec<MethodId>>,
    callers: Vec<Vec<StmtId>>,
    start_points: Vec<Vec<StmtId>>,
    end_points: Vec<Vec<StmtId>>,
    calls_within: Vec<Vec<StmtId>>,
    return_sites: Vec<bool>,
    reflective_calls: FxHashSet<StmtId>,
    postdominators: Vec<Option<StmtId>>,
    reachable: Vec<MethodId>,
    read_locals: Vec<FxHashSet<LocalId>>,
    written_locals: Vec<FxHashSet<LocalId>>,
    static_access: Vec<StaticFieldAccess>,
    static_read_cache: DashMap<(MethodId, Field), bool>,
    static_write_cache: DashMap<(MethodId, Field), bool>,
}

impl ProgramIcfg {
    pub fn new(program: Arc<Program>) -> Self {
        Self::with_extra_call_edges(program, &[])
    }

    /// Adds call edges class hierarchy analysis cannot see, such as the
    /// targets of reflective calls
    pub fn with_extra_call_edges(program: Arc<Program>, extra: &[(StmtId, MethodId)]) -> Self {
        let stmt_count = program.stmts().len();
        let method_count = program.methods().len();

        let mut icfg = Self {
            succs: vec![Vec::new(); stmt_count],
            preds: vec![Vec::new(); stmt_count],
            exceptional_edges: FxHashSet::default(),
            callees: vec![Vec::new(); stmt_count],
            callers: vec![Vec::new(); method_count],
            start_points: vec![Vec::new(); method_count],
            end_points: vec![Vec::new(); method_count],
            calls_within: vec![Vec::new(); method_count],
            return_sites: vec![false; stmt_count],
            reflective_calls: FxHashSet::default(),
            postdominators: vec![None; stmt_count],
            reachable: Vec::new(),
            read_locals: Vec::with_capacity(method_count),
            written_locals: Vec::with_capacity(method_count),
            static_access: Vec::with_capacity(method_count),
            static_read_cache: DashMap::new(),
            static_write_cache: DashMap::new(),
            program,
        };

        let program = Arc::clone(&icfg.program);
        for method in program.methods() {
            icfg.build_method_graph(&program, method);
            icfg.read_locals.push(used_parameter_locals(&program, method));
            icfg.written_locals.push(assigned_locals(&program, method));
            icfg.static_access.push(static_field_access(&program, method));
        }
        for method in program.methods() {
            icfg.compute_postdominators(method);
        }
        for stmt in program.stmts() {
            if let Some(inv) = stmt.invoke_expr() {
                if inv.method.declaring_class() == REFLECTION_CLASS
                    && inv.method.name() == REFLECTION_METHOD
                {
                    icfg.reflective_calls.insert(stmt.id);
                }
                let targets = resolve_callees(&program, stmt);
                for target in targets {
                    icfg.add_call_edge(stmt.id, target);
                }
            }
        }
        for &(call, callee) in extra {
            icfg.add_call_edge(call, callee);
        }
        icfg.reachable = compute_reachable(&program, &icfg.callees, &icfg.calls_within);

        debug!(
            stmts = stmt_count,
            methods = method_count,
            reachable = icfg.reachable.len(),
            "ICFG built"
        );
        icfg
    }

    pub fn shared_program(&self) -> Arc<Program> {
        Arc::clone(&self.program)
    }

    fn add_call_edge(&mut self, call: StmtId, callee: MethodId) {
        let targets = &mut self.callees[call.0 as usize];
        if !targets.contains(&callee) {
            targets.push(callee);
            self.callers[callee.0 as usize].push(call);
        }
    }

    fn build_method_graph(&mut self, program: &Program, method: &Method) {
        let body = &method.body;
        if body.is_empty() {
            return;
        }
        let position: FxHashMap<StmtId, usize> =
            body.iter().enumerate().map(|(i, s)| (*s, i)).collect();

        for (i, &id) in body.iter().enumerate() {
            let stmt = program.stmt(id);
            let next = body.get(i + 1).copied();
            let mut out: Vec<StmtId> = Vec::new();
            match &stmt.kind {
                StmtKind::Goto(target) => out.push(*target),
                StmtKind::If { target, .. } => {
                    out.extend(next);
                    if Some(*target) != next {
                        out.push(*target);
                    }
                }
                StmtKind::Return(_) | StmtKind::ReturnVoid | StmtKind::Throw(_) => {}
                _ => out.extend(next),
            }

            if stmt.is_throw() || stmt.contains_invoke() {
                for trap in &method.traps {
                    let (Some(&begin), Some(&end)) =
                        (position.get(&trap.begin), position.get(&trap.end))
                    else {
                        continue;
                    };
                    if (begin..=end).contains(&i) && !out.contains(&trap.handler) {
                        out.push(trap.handler);
                        self.exceptional_edges.insert((id, trap.handler));
                    }
                }
            }

            if stmt.contains_invoke() {
                self.calls_within[method.id.0 as usize].push(id);
                for s in &out {
                    self.return_sites[s.0 as usize] = true;
                }
            }
            for s in &out {
                self.preds[s.0 as usize].push(id);
            }
            if out.is_empty() {
                self.end_points[method.id.0 as usize].push(id);
            }
            self.succs[id.0 as usize] = out;
        }
        self.start_points[method.id.0 as usize].push(body[0]);
    }

    /// Iterative postdominator sets; a statement without a unique
    /// postdominator inside the body is postdominated by the method exit
    fn compute_postdominators(&mut self, method: &Method) {
        let body = &method.body;
        let n = body.len();
        if n == 0 {
            return;
        }
        let position: FxHashMap<StmtId, usize> =
            body.iter().enumerate().map(|(i, s)| (*s, i)).collect();
        let succs: Vec<Vec<usize>> = body
            .iter()
            .map(|s| {
                self.succs[s.0 as usize]
                    .iter()
                    .filter_map(|t| position.get(t).copied())
                    .collect()
            })
            .collect();

        let full = BitSet::full(n);
        let mut pdom: Vec<BitSet> = (0..n)
            .map(|i| {
                if succs[i].is_empty() {
                    BitSet::singleton(n, i)
                } else {
                    full.clone()
                }
            })
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for i in (0..n).rev() {
                if succs[i].is_empty() {
                    continue;
                }
                let mut next = full.clone();
                for &s in &succs[i] {
                    next.intersect_with(&pdom[s]);
                }
                next.insert(i);
                if next != pdom[i] {
                    pdom[i] = next;
                    changed = true;
                }
            }
        }

        for i in 0..n {
            let own = pdom[i].count();
            let immediate = pdom[i]
                .iter()
                .filter(|&p| p != i)
                .find(|&p| pdom[p].count() + 1 == own);
            self.postdominators[body[i].0 as usize] = immediate.map(|p| body[p]);
        }
    }

    fn static_field_query(
        &self,
        method: MethodId,
        field: &Field,
        cache: &DashMap<(MethodId, Field), bool>,
        direct: impl Fn(&StaticFieldAccess) -> bool,
    ) -> bool {
        let key = (method, field.clone());
        if let Some(hit) = cache.get(&key) {
            return *hit;
        }
        let mut seen: FxHashSet<MethodId> = FxHashSet::default();
        let mut queue = VecDeque::from([method]);
        let mut found = false;
        while let Some(m) = queue.pop_front() {
            if !seen.insert(m) {
                continue;
            }
            if !self.program.method(m).is_concrete() {
                continue;
            }
            if direct(&self.static_access[m.0 as usize]) {
                found = true;
                break;
            }
            for call in &self.calls_within[m.0 as usize] {
                queue.extend(self.callees[call.0 as usize].iter().copied());
            }
        }
        cache.insert(key, found);
        found
    }
}

impl InterproceduralCfg for ProgramIcfg {
    fn program(&self) -> &Program {
        &self.program
    }

    fn succs_of(&self, stmt: StmtId) -> &[StmtId] {
        &self.succs[stmt.0 as usize]
    }

    fn preds_of(&self, stmt: StmtId) -> &[StmtId] {
        &self.preds[stmt.0 as usize]
    }

    fn callees_of_call_at(&self, call: StmtId) -> &[MethodId] {
        &self.callees[call.0 as usize]
    }

    fn callers_of(&self, method: MethodId) -> &[StmtId] {
        &self.callers[method.0 as usize]
    }

    fn start_points_of(&self, method: MethodId) -> &[StmtId] {
        &self.start_points[method.0 as usize]
    }

    fn end_points_of(&self, method: MethodId) -> &[StmtId] {
        &self.end_points[method.0 as usize]
    }

    fn return_sites_of_call_at(&self, call: StmtId) -> &[StmtId] {
        &self.succs[call.0 as usize]
    }

    fn calls_from_within(&self, method: MethodId) -> &[StmtId] {
        &self.calls_within[method.0 as usize]
    }

    fn is_call_stmt(&self, stmt: StmtId) -> bool {
        self.program.stmt(stmt).contains_invoke()
    }

    fn is_exit_stmt(&self, stmt: StmtId) -> bool {
        self.succs[stmt.0 as usize].is_empty()
    }

    fn is_start_point(&self, stmt: StmtId) -> bool {
        let method = self.program.stmt(stmt).method;
        self.start_points[method.0 as usize].contains(&stmt)
    }

    fn is_return_site(&self, stmt: StmtId) -> bool {
        self.return_sites[stmt.0 as usize]
    }

    fn is_reflective_call_site(&self, call: StmtId) -> bool {
        self.reflective_calls.contains(&call)
    }

    fn method_reads_value(&self, method: MethodId, local: &Local) -> bool {
        self.read_locals[method.0 as usize].contains(&local.id())
    }

    fn method_writes_value(&self, method: MethodId, local: &Local) -> bool {
        self.written_locals[method.0 as usize].contains(&local.id())
    }

    fn is_static_field_read(&self, method: MethodId, field: &Field) -> bool {
        self.static_field_query(method, field, &self.static_read_cache, |a| {
            a.reads.contains(field)
        })
    }

    fn is_static_field_used(&self, method: MethodId, field: &Field) -> bool {
        self.static_field_query(method, field, &self.static_write_cache, |a| {
            a.writes.contains(field)
        })
    }

    fn postdominator_of(&self, stmt: StmtId) -> UnitContainer {
        match self.postdominators[stmt.0 as usize] {
            Some(pd) => UnitContainer::unit(pd),
            None => UnitContainer::method_exit(self.program.stmt(stmt).method),
        }
    }

    fn is_exceptional_edge_between(&self, src: StmtId, dest: StmtId) -> bool {
        self.exceptional_edges.contains(&(src, dest))
    }

    fn reachable_methods(&self) -> &[MethodId] {
        &self.reachable
    }
}

/// Reversed view of another ICFG
pub struct BackwardsIcfg {
    inner: Arc<dyn InterproceduralCfg>,
}

impl BackwardsIcfg {
    pub fn new(inner: Arc<dyn InterproceduralCfg>) -> Self {
        Self { inner }
    }
}

impl InterproceduralCfg for BackwardsIcfg {
    fn program(&self) -> &Program {
        self.inner.program()
    }

    fn succs_of(&self, stmt: StmtId) -> &[StmtId] {
        self.inner.preds_of(stmt)
    }

    fn preds_of(&self, stmt: StmtId) -> &[StmtId] {
        self.inner.succs_of(stmt)
    }

    fn callees_of_call_at(&self, call: StmtId) -> &[MethodId] {
        self.inner.callees_of_call_at(call)
    }

    fn callers_of(&self, method: MethodId) -> &[StmtId] {
        self.inner.callers_of(method)
    }

    fn start_points_of(&self, method: MethodId) -> &[StmtId] {
        self.inner.end_points_of(method)
    }

    fn end_points_of(&self, method: MethodId) -> &[StmtId] {
        self.inner.start_points_of(method)
    }

    fn return_sites_of_call_at(&self, call: StmtId) -> &[StmtId] {
        self.inner.preds_of(call)
    }

    fn calls_from_within(&self, method: MethodId) -> &[StmtId] {
        self.inner.calls_from_within(method)
    }

    fn is_call_stmt(&self, stmt: StmtId) -> bool {
        self.inner.is_call_stmt(stmt)
    }

    fn is_exit_stmt(&self, stmt: StmtId) -> bool {
        self.inner.is_start_point(stmt)
    }

    fn is_start_point(&self, stmt: StmtId) -> bool {
        self.inner.is_exit_stmt(stmt)
    }

    fn is_return_site(&self, stmt: StmtId) -> bool {
        self.inner
            .succs_of(stmt)
            .iter()
            .any(|s| self.inner.is_call_stmt(*s))
    }

    fn is_reflective_call_site(&self, call: StmtId) -> bool {
        self.inner.is_reflective_call_site(call)
    }

    fn method_reads_value(&self, method: MethodId, local: &Local) -> bool {
        self.inner.method_reads_value(method, local)
    }

    fn method_writes_value(&self, method: MethodId, local: &Local) -> bool {
        self.inner.method_writes_value(method, local)
    }

    fn is_static_field_read(&self, method: MethodId, field: &Field) -> bool {
        self.inner.is_static_field_read(method, field)
    }

    fn is_static_field_used(&self, method: MethodId, field: &Field) -> bool {
        self.inner.is_static_field_used(method, field)
    }

    fn postdominator_of(&self, stmt: StmtId) -> UnitContainer {
        self.inner.postdominator_of(stmt)
    }

    fn is_exceptional_edge_between(&self, src: StmtId, dest: StmtId) -> bool {
        self.inner.is_exceptional_edge_between(dest, src)
    }

    fn reachable_methods(&self) -> &[MethodId] {
        self.inner.reachable_methods()
    }
}

// ============================================================================
// Construction helpers
// ============================================================================

fn resolve_callees(program: &Program, stmt: &Stmt) -> Vec<MethodId> {
    let Some(inv) = stmt.invoke_expr() else {
        return Vec::new();
    };
    let subsig = inv.method.sub_signature();
    let mut out: Vec<MethodId> = Vec::new();
    match inv.kind {
        InvokeKind::Static | InvokeKind::Special => {
            if let Some(m) = program.resolve_in_hierarchy(inv.method.declaring_class(), &subsig) {
                out.push(m.id);
            }
        }
        InvokeKind::Virtual | InvokeKind::Interface => {
            let receiver = inv
                .base
                .as_ref()
                .and_then(|b| b.ty().class_name().map(str::to_string))
                .unwrap_or_else(|| inv.method.declaring_class().to_string());
            for class in program.hierarchy().subtypes_of(&receiver) {
                if let Some(m) = program.resolve_in_hierarchy(&class, &subsig) {
                    if !out.contains(&m.id) {
                        out.push(m.id);
                    }
                }
            }
            if out.is_empty() {
                if let Some(m) =
                    program.resolve_in_hierarchy(inv.method.declaring_class(), &subsig)
                {
                    out.push(m.id);
                }
            }
        }
    }
    out
}

fn compute_reachable(
    program: &Program,
    callees: &[Vec<MethodId>],
    calls_within: &[Vec<StmtId>],
) -> Vec<MethodId> {
    if program.entry_points().is_empty() {
        return program
            .methods()
            .iter()
            .filter(|m| m.is_concrete())
            .map(|m| m.id)
            .collect();
    }
    let mut seen: FxHashSet<MethodId> = FxHashSet::default();
    let mut order = Vec::new();
    let mut queue: VecDeque<MethodId> = program.entry_points().iter().copied().collect();
    while let Some(m) = queue.pop_front() {
        if !seen.insert(m) {
            continue;
        }
        order.push(m);
        for call in &calls_within[m.0 as usize] {
            queue.extend(callees[call.0 as usize].iter().copied());
        }
    }
    order
}

/// Parameter locals used anywhere in the body, plus `this`
fn used_parameter_locals(program: &Program, method: &Method) -> FxHashSet<LocalId> {
    let mut out = FxHashSet::default();
    if !method.is_concrete() {
        return out;
    }
    for &id in &method.body {
        for used in program.stmt(id).uses() {
            if let Value::Local(l) = used {
                if method.param_locals.contains(&l) {
                    out.insert(l.id());
                }
            }
        }
    }
    if let Some(this) = &method.this_local {
        out.insert(this.id());
    }
    out
}

fn assigned_locals(program: &Program, method: &Method) -> FxHashSet<LocalId> {
    method
        .body
        .iter()
        .filter_map(|&id| match &program.stmt(id).kind {
            StmtKind::Assign {
                lhs: Value::Local(l),
                ..
            } => Some(l.id()),
            _ => None,
        })
        .collect()
}

fn static_field_access(program: &Program, method: &Method) -> StaticFieldAccess {
    let mut access = StaticFieldAccess::default();
    for &id in &method.body {
        let stmt = program.stmt(id);
        if let StmtKind::Assign {
            lhs: Value::StaticField(f),
            ..
        } = &stmt.kind
        {
            access.writes.insert(f.clone());
        }
        for used in stmt.uses() {
            if let Value::StaticField(f) = used {
                access.reads.insert(f);
            }
        }
    }
    access
}

/// Fixed-size bit set for the postdominator dataflow
#[derive(Debug, Clone, PartialEq, Eq)]
struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    fn empty(n: usize) -> Self {
        Self {
            words: vec![0; (n + 63) / 64],
        }
    }

    fn full(n: usize) -> Self {
        let mut set = Self::empty(n);
        for i in 0..n {
            set.insert(i);
        }
        set
    }

    fn singleton(n: usize, i: usize) -> Self {
        let mut set = Self::empty(n);
        set.insert(i);
        set
    }

    fn insert(&mut self, i: usize) {
        self.words[i / 64] |= 1 << (i % 64);
    }

    fn intersect_with(&mut self, other: &BitSet) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= *b;
        }
    }

    fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..64).filter(move |b| w & (1u64 << b) != 0).map(move |b| wi * 64 + b)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ir::{BinOp, MethodRef, ProgramBuilder, Type};

    fn diamond() -> (Arc<Program>, Vec<StmtId>) {
        let mut pb = ProgramBuilder::new();
        pb.class("T", None);
        let sig = MethodRef::new("T", "m", vec![Type::Int], Type::Void);
        let mut mb = pb.method(&sig, true);
        let p = mb.param(0).unwrap();
        let x = mb.local("x", Type::Int);
        let branch = mb.if_goto(Value::Binary {
            op: BinOp::Eq,
            lhs: Box::new(Value::local(&p)),
            rhs: Box::new(Value::int(0)),
        });
        let then_assign = mb.assign(Value::local(&x), Value::int(1));
        let skip = mb.goto();
        let else_assign = mb.assign(Value::local(&x), Value::int(2));
        let join = mb.ret_void();
        mb.set_target(branch, else_assign);
        mb.set_target(skip, join);
        let id = mb.finish();
        pb.entry_point(id);
        (
            Arc::new(pb.build()),
            vec![branch, then_assign, skip, else_assign, join],
        )
    }

    #[test]
    fn test_branch_successors_and_predecessors() {
        let (program, s) = diamond();
        let icfg = ProgramIcfg::new(program);
        assert_eq!(icfg.succs_of(s[0]), &[s[1], s[3]]);
        assert_eq!(icfg.succs_of(s[2]), &[s[4]]);
        let mut preds = icfg.preds_of(s[4]).to_vec();
        preds.sort();
        assert_eq!(preds, vec![s[2], s[3]]);
        assert!(icfg.is_exit_stmt(s[4]));
    }

    #[test]
    fn test_postdominator_of_branch_is_join() {
        let (program, s) = diamond();
        let icfg = ProgramIcfg::new(program);
        assert_eq!(icfg.postdominator_of(s[0]), UnitContainer::unit(s[4]));
        assert_eq!(icfg.postdominator_of(s[1]), UnitContainer::unit(s[2]));
        let exit = icfg.postdominator_of(s[4]);
        assert!(exit.unit.is_none());
    }

    #[test]
    fn test_virtual_call_resolves_overrides() {
        let mut pb = ProgramBuilder::new();
        pb.class("Base", None);
        pb.class("Derived", Some("Base"));
        let run_base = MethodRef::new("Base", "run", vec![], Type::Void);
        let run_derived = MethodRef::new("Derived", "run", vec![], Type::Void);
        let mut mb = pb.method(&run_base, false);
        mb.ret_void();
        let base_id = mb.finish();
        let mut mb = pb.method(&run_derived, false);
        mb.ret_void();
        let derived_id = mb.finish();

        let main = MethodRef::new("Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main, true);
        let b = mb.local("b", Type::class("Base"));
        let call = mb.call_virtual(&b, &run_base, vec![]);
        mb.ret_void();
        let main_id = mb.finish();
        pb.entry_point(main_id);

        let icfg = ProgramIcfg::new(Arc::new(pb.build()));
        let mut callees = icfg.callees_of_call_at(call).to_vec();
        callees.sort();
        assert_eq!(callees, vec![base_id, derived_id]);
        assert_eq!(icfg.callers_of(derived_id), &[call]);
        assert!(icfg.is_return_site(icfg.succs_of(call)[0]));
        assert_eq!(icfg.reachable_methods().len(), 3);
    }

    #[test]
    fn test_exceptional_edges_to_handler() {
        let mut pb = ProgramBuilder::new();
        pb.class("T", None);
        pb.class("E", None);
        let thrower = MethodRef::new("T", "boom", vec![], Type::Void);
        pb.declare_method(&thrower, true);
        let sig = MethodRef::new("T", "m", vec![], Type::Void);
        let mut mb = pb.method(&sig, true);
        let e = mb.local("e", Type::class("E"));
        let call = mb.call_static(&thrower, vec![]);
        let ret = mb.ret_void();
        let handler = mb.catch_into(&e);
        mb.ret_void();
        mb.trap(call, call, handler, Type::class("E"));
        mb.finish();

        let icfg = ProgramIcfg::new(Arc::new(pb.build()));
        assert_eq!(icfg.succs_of(call), &[ret, handler]);
        assert!(icfg.is_exceptional_edge_between(call, handler));
        assert!(!icfg.is_exceptional_edge_between(call, ret));
    }

    #[test]
    fn test_reads_and_writes_of_parameters() {
        let mut pb = ProgramBuilder::new();
        pb.class("T", None);
        let sig = MethodRef::new("T", "m", vec![Type::object(), Type::object()], Type::object());
        let mut mb = pb.method(&sig, true);
        let p0 = mb.param(0).unwrap();
        let p1 = mb.param(1).unwrap();
        mb.assign(Value::local(&p1), Value::null());
        mb.ret(Value::local(&p0));
        let id = mb.finish();

        let icfg = ProgramIcfg::new(Arc::new(pb.build()));
        assert!(icfg.method_reads_value(id, &p0));
        assert!(!icfg.method_reads_value(id, &p1));
        assert!(icfg.method_writes_value(id, &p1));
        assert!(!icfg.method_writes_value(id, &p0));
    }

    #[test]
    fn test_transitive_static_field_access() {
        let mut pb = ProgramBuilder::new();
        pb.class("T", None);
        let f = Field::static_field("T", "s", Type::object());
        let inner = MethodRef::new("T", "inner", vec![], Type::Void);
        let outer = MethodRef::new("T", "outer", vec![], Type::Void);
        let mut mb = pb.method(&inner, true);
        let x = mb.local("x", Type::object());
        mb.assign(Value::local(&x), Value::StaticField(f.clone()));
        mb.ret_void();
        mb.finish();
        let mut mb = pb.method(&outer, true);
        mb.call_static(&inner, vec![]);
        mb.ret_void();
        let outer_id = mb.finish();

        let icfg = ProgramIcfg::new(Arc::new(pb.build()));
        assert!(icfg.is_static_field_read(outer_id, &f));
        assert!(!icfg.is_static_field_used(outer_id, &f));
    }

    #[test]
    fn test_backwards_view_swaps_directions() {
        let (program, s) = diamond();
        let forward: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(program));
        let backward = BackwardsIcfg::new(Arc::clone(&forward));
        assert_eq!(backward.succs_of(s[4]), forward.preds_of(s[4]));
        assert!(backward.is_start_point(s[4]));
        // The parameter identity statement precedes the branch
        let method = forward.method_of(s[0]);
        let entry = forward.start_points_of(method)[0];
        assert_ne!(entry, s[0]);
        assert!(backward.is_exit_stmt(entry));
        assert!(!backward.is_exit_stmt(s[0]));
    }
}
