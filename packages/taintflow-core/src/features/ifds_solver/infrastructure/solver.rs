/*
 * IFDS Tabulation Solver (concurrent)
 *
 * Worklist algorithm of Reps, Horwitz and Sagiv (1995) with the extensions
 * of Naeem, Lhoták and Rodriguez (2010), over facts of type `AbsRef`:
 *
 * 1. Seeds (zero, s, d) are propagated into the jump-function table
 * 2. Every new path edge (d1, n, d2) becomes one executor task
 * 3. The task dispatches on the kind of `n`:
 *    - call      : call flow into each concrete callee (self-loop at the
 *                  start points, incoming registration, end-summary reuse),
 *                  then call-to-return flow
 *    - exit      : end-summary registration, return flow into every
 *                  registered caller; facts rooted in zero follow returns
 *                  past the seeds into all callers
 *    - otherwise : normal flow to each successor
 * 4. An edge already in the table is not reprocessed; the new fact is
 *    attached to the existing one as a neighbor instead
 *
 * Two solvers (forward taint and backward alias) share one executor and
 * feed each other through `process_edge` and `inject_context`. Both calls
 * are safe at any time, including after the target solver went idle: the
 * injected edge becomes a task of the shared executor and the driver's
 * `await_completion` covers it.
 *
 * Tables are DashMaps. Guards are never held while a flow function runs,
 * nested values are copied out first.
 */

use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::domain::{
    EndSummary, PathEdge, SolverCounters, SolverStatistics, TerminationReason,
};
use crate::features::ifds_solver::infrastructure::executor::SolverExecutor;
use crate::features::ifds_solver::infrastructure::memory_manager::FactMemoryManager;
use crate::features::ifds_solver::ports::{IfdsProblem, TerminatableSolver};
use crate::config::SolverConfig;
use crate::shared::ir::{MethodId, StmtId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Callers of a method context: call site -> (caller d1 -> caller d2)
type IncomingMap = FxHashMap<StmtId, FxHashMap<AbsRef, AbsRef>>;

pub struct IfdsSolver {
    name: &'static str,
    problem: Arc<dyn IfdsProblem>,
    zero: AbsRef,
    executor: SolverExecutor,
    memory_manager: FactMemoryManager,
    settings: SolverConfig,

    /// (d1, n, d2) -> the first published d2
    jump_functions: DashMap<PathEdge, AbsRef>,
    /// (method, d1) -> exits reached with their facts
    end_summary: DashMap<(MethodId, AbsRef), FxHashMap<EndSummary, AbsRef>>,
    /// (method, d3) -> calling contexts that entered it with d3
    incoming: DashMap<(MethodId, AbsRef), IncomingMap>,

    termination: Mutex<Option<TerminationReason>>,
    running: AtomicBool,
    counters: SolverCounters,
}

impl IfdsSolver {
    pub fn new(
        name: &'static str,
        problem: Arc<dyn IfdsProblem>,
        executor: SolverExecutor,
        settings: SolverConfig,
    ) -> Self {
        let zero = Arc::clone(problem.zero_value());
        Self {
            name,
            problem,
            zero,
            executor,
            memory_manager: FactMemoryManager::new(),
            settings,
            jump_functions: DashMap::new(),
            end_summary: DashMap::new(),
            incoming: DashMap::new(),
            termination: Mutex::new(None),
            running: AtomicBool::new(false),
            counters: SolverCounters::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn zero_value(&self) -> &AbsRef {
        &self.zero
    }

    pub fn executor(&self) -> &SolverExecutor {
        &self.executor
    }

    pub fn problem(&self) -> &Arc<dyn IfdsProblem> {
        &self.problem
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Submits the seeds and blocks until the shared executor drained
    pub fn solve(self: &Arc<Self>) {
        let start = Instant::now();
        self.submit_initial_seeds();
        self.executor.await_completion();
        self.running.store(false, Ordering::SeqCst);
        info!(
            solver = self.name,
            edges = self.counters.snapshot().propagation_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            terminated = ?self.termination_reason(),
            "Solver finished"
        );
    }

    pub fn submit_initial_seeds(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        let seeds = self.problem.initial_seeds();
        debug!(solver = self.name, seeds = seeds.len(), "Submitting initial seeds");
        for (start_point, fact) in seeds {
            self.propagate(Arc::clone(&self.zero), start_point, fact, None);
            self.jump_functions
                .entry(PathEdge::new(
                    Arc::clone(&self.zero),
                    start_point,
                    Arc::clone(&self.zero),
                ))
                .or_insert_with(|| Arc::clone(&self.zero));
        }
    }

    /// Adds an edge discovered by another solver
    pub fn process_edge(self: &Arc<Self>, edge: PathEdge) {
        self.running.store(true, Ordering::SeqCst);
        self.propagate(edge.source_fact, edge.target_node, edge.target_fact, None);
    }

    /// Registers a calling context discovered by another solver, so that facts
    /// leaving `callee` in context `d3` return to `call_site`
    pub fn inject_context(
        self: &Arc<Self>,
        callee: MethodId,
        d3: &AbsRef,
        call_site: StmtId,
        d2: &AbsRef,
        d1: &AbsRef,
    ) {
        if !self.add_incoming(callee, d3, call_site, d1, d2) {
            return;
        }
        let return_sites = self.problem.icfg().return_sites_of_call_at(call_site).to_vec();
        self.apply_end_summary_on_call(d1, call_site, d2, &return_sites, callee, d3);
    }

    // ========================================================================
    // Propagation
    // ========================================================================

    fn propagate(
        self: &Arc<Self>,
        source_val: AbsRef,
        target: StmtId,
        target_val: AbsRef,
        related_call_site: Option<StmtId>,
    ) {
        if let Some(max) = self.settings.max_abstraction_path_length {
            if target_val.path_length() > max {
                return;
            }
        }

        let edge = PathEdge::new(source_val, target, Arc::clone(&target_val));
        let existing = match self.jump_functions.entry(edge.clone()) {
            Entry::Occupied(e) => Some(Arc::clone(e.get())),
            Entry::Vacant(v) => {
                v.insert(Arc::clone(&target_val));
                None
            }
        };

        match existing {
            Some(existing) => {
                if Arc::ptr_eq(&existing, &target_val) {
                    return;
                }
                let essential = self
                    .memory_manager
                    .is_essential_join_point(&target_val, related_call_site);
                let below_limit = self
                    .settings
                    .max_join_point_abstractions
                    .map_or(true, |max| existing.neighbor_count() < max);
                if (essential || below_limit)
                    && existing.add_neighbor(&target_val, self.settings.merge_neighbors)
                {
                    self.counters.record_neighbor();
                }
            }
            None => self.schedule_edge_processing(edge),
        }
    }

    fn schedule_edge_processing(self: &Arc<Self>, edge: PathEdge) {
        if self.executor.is_interrupted() {
            return;
        }
        self.counters.record_scheduled();
        let solver = Arc::clone(self);
        self.executor.execute(move || solver.process_path_edge(edge));
    }

    fn process_path_edge(self: &Arc<Self>, edge: PathEdge) {
        self.counters.record_processed();
        crate::trace_edge!(solver = self.name, edge = %edge, "Processing edge");
        let target = edge.target_node;
        let icfg = self.problem.icfg();
        if icfg.is_call_stmt(target) {
            self.process_call(&edge);
        } else {
            if icfg.is_exit_stmt(target) {
                self.process_exit(&edge);
            }
            if !icfg.succs_of(target).is_empty() {
                self.process_normal_flow(&edge);
            }
        }
    }

    fn process_normal_flow(self: &Arc<Self>, edge: &PathEdge) {
        let PathEdge {
            source_fact: d1,
            target_node: n,
            target_fact: d2,
        } = edge;
        for &m in self.problem.icfg().succs_of(*n) {
            let res = self.problem.normal_flow(d1, d2, *n, m);
            for d3 in res {
                let d3 = self.memory_manager.handle_generated(d2, d3);
                self.propagate(Arc::clone(d1), m, d3, None);
            }
        }
    }

    fn process_call(self: &Arc<Self>, edge: &PathEdge) {
        let PathEdge {
            source_fact: d1,
            target_node: n,
            target_fact: d2,
        } = edge;
        let icfg = self.problem.icfg();
        let return_sites = icfg.return_sites_of_call_at(*n);
        let callees = icfg.callees_of_call_at(*n);

        let within_limit = self
            .settings
            .max_callees_per_call_site
            .map_or(true, |max| callees.len() <= max);
        if within_limit {
            for &callee in callees {
                if !icfg.program().method(callee).is_concrete() {
                    continue;
                }
                let res = self.problem.call_flow(d1, d2, *n, callee);
                if res.is_empty() {
                    continue;
                }
                let start_points = icfg.start_points_of(callee);
                for d3 in res {
                    let d3 = self.memory_manager.handle_generated(d2, d3);
                    for &sp in start_points {
                        self.propagate(Arc::clone(&d3), sp, Arc::clone(&d3), Some(*n));
                    }
                    if !self.add_incoming(callee, &d3, *n, d1, d2) {
                        continue;
                    }
                    self.apply_end_summary_on_call(d1, *n, d2, return_sites, callee, &d3);
                }
            }
        }

        for &ret_site in return_sites {
            let res = self.problem.call_to_return_flow(d1, d2, *n, ret_site);
            for d3 in res {
                let d3 = self.memory_manager.handle_generated(d2, d3);
                self.propagate(Arc::clone(d1), ret_site, d3, Some(*n));
            }
        }
    }

    fn apply_end_summary_on_call(
        self: &Arc<Self>,
        d1: &AbsRef,
        n: StmtId,
        _d2: &AbsRef,
        return_sites: &[StmtId],
        callee: MethodId,
        d3: &AbsRef,
    ) {
        let summaries: Vec<EndSummary> = match self.end_summary.get(&(callee, Arc::clone(d3))) {
            Some(s) => s.keys().cloned().collect(),
            None => return,
        };
        let caller_d1s = [Arc::clone(d1)];
        for summary in summaries {
            self.counters.record_summary_reuse();
            for &ret_site in return_sites {
                let res = self.problem.return_flow(
                    Some(n),
                    callee,
                    summary.exit_node,
                    Some(ret_site),
                    &summary.exit_fact,
                    d3,
                    &caller_d1s,
                );
                for d5 in res {
                    let d5 = self.memory_manager.handle_generated(&summary.exit_fact, d5);
                    self.propagate(Arc::clone(d1), ret_site, d5, Some(n));
                }
            }
        }
    }

    fn process_exit(self: &Arc<Self>, edge: &PathEdge) {
        let PathEdge {
            source_fact: d1,
            target_node: n,
            target_fact: d2,
        } = edge;
        let icfg = self.problem.icfg();
        let method = icfg.method_of(*n);

        if !self.add_end_summary(method, d1, *n, d2) {
            return;
        }

        let inc: Vec<(StmtId, Vec<(AbsRef, AbsRef)>)> = self
            .incoming
            .get(&(method, Arc::clone(d1)))
            .map(|m| {
                m.iter()
                    .map(|(c, callers)| {
                        (
                            *c,
                            callers
                                .iter()
                                .map(|(a, b)| (Arc::clone(a), Arc::clone(b)))
                                .collect(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (c, caller_side) in &inc {
            let caller_d1s: Vec<AbsRef> = caller_side.iter().map(|(d4, _)| Arc::clone(d4)).collect();
            for &ret_site in icfg.return_sites_of_call_at(*c) {
                let targets = self.problem.return_flow(
                    Some(*c),
                    method,
                    *n,
                    Some(ret_site),
                    d2,
                    d1,
                    &caller_d1s,
                );
                if targets.is_empty() {
                    continue;
                }
                for (d4, _) in caller_side {
                    for d5 in &targets {
                        let d5 = self.memory_manager.handle_generated(d2, Arc::clone(d5));
                        self.propagate(Arc::clone(d4), ret_site, d5, Some(*c));
                    }
                }
            }
        }

        // Unbalanced return: only facts rooted in zero leave without a context
        if self.problem.follow_returns_past_seeds() && Arc::ptr_eq(d1, &self.zero) && inc.is_empty()
        {
            let callers = icfg.callers_of(method);
            let zero_d1s = [Arc::clone(&self.zero)];
            for &c in callers {
                for &ret_site in icfg.return_sites_of_call_at(c) {
                    let targets = self.problem.return_flow(
                        Some(c),
                        method,
                        *n,
                        Some(ret_site),
                        d2,
                        d1,
                        &zero_d1s,
                    );
                    for d5 in targets {
                        let d5 = self.memory_manager.handle_generated(d2, d5);
                        self.propagate(Arc::clone(&self.zero), ret_site, d5, Some(c));
                    }
                }
            }
            if callers.is_empty() {
                self.problem.return_flow(None, method, *n, None, d2, d1, &[]);
            }
        }
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Returns false if the summary was already known
    fn add_end_summary(&self, method: MethodId, d1: &AbsRef, exit: StmtId, d2: &AbsRef) -> bool {
        if Arc::ptr_eq(d1, &self.zero) {
            return true;
        }
        let key = EndSummary {
            exit_node: exit,
            exit_fact: Arc::clone(d2),
        };
        let existing = {
            let mut summaries = self
                .end_summary
                .entry((method, Arc::clone(d1)))
                .or_default();
            match summaries.get(&key) {
                Some(existing) => Some(Arc::clone(existing)),
                None => {
                    summaries.insert(key, Arc::clone(d2));
                    None
                }
            }
        };
        match existing {
            Some(existing) => {
                if !Arc::ptr_eq(&existing, d2) {
                    existing.add_neighbor(d2, self.settings.merge_neighbors);
                }
                false
            }
            None => true,
        }
    }

    /// Returns false if the context was already registered
    fn add_incoming(
        &self,
        method: MethodId,
        d3: &AbsRef,
        call_site: StmtId,
        d1: &AbsRef,
        d2: &AbsRef,
    ) -> bool {
        let mut contexts = self.incoming.entry((method, Arc::clone(d3))).or_default();
        contexts
            .entry(call_site)
            .or_default()
            .insert(Arc::clone(d1), Arc::clone(d2))
            .is_none()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Facts reaching `stmt` in any context
    pub fn facts_at(&self, stmt: StmtId) -> Vec<AbsRef> {
        self.jump_functions
            .iter()
            .filter(|e| e.key().target_node == stmt)
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    pub fn jump_function_count(&self) -> usize {
        self.jump_functions.len()
    }

    pub fn statistics(&self) -> SolverStatistics {
        SolverStatistics {
            jump_functions: self.jump_functions.len() as u64,
            end_summaries: self.end_summary.iter().map(|e| e.value().len() as u64).sum(),
            ..self.counters.snapshot()
        }
    }

    pub fn reused_facts(&self) -> u64 {
        self.memory_manager.reused_count()
    }
}

impl TerminatableSolver for IfdsSolver {
    fn force_terminate(&self, reason: TerminationReason) {
        {
            let mut current = self.termination.lock();
            if current.is_none() {
                warn!(solver = self.name, reason = %reason, "Forcing solver termination");
                *current = Some(reason);
            }
        }
        self.executor.interrupt();
    }

    fn termination_reason(&self) -> Option<TerminationReason> {
        *self.termination.lock()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
