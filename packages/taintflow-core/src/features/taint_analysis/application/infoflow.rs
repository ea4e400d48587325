//! Analysis driver
//!
//! Wires one run together: collaborators, source/sink prescan, worker pool,
//! forward and alias solvers, resource watchers and the source finder.
//!
//! # Usage
//! ```rust,ignore
//! use taintflow_core::config::{InfoflowConfig, Preset};
//! use taintflow_core::features::taint_analysis::{Infoflow, MethodSourceSinkManager, ProgramIcfg};
//!
//! let oracle = MethodSourceSinkManager::new().with_source(&read).with_sink(&send);
//! let infoflow = Infoflow::new(InfoflowConfig::from_preset(Preset::Balanced), icfg, Arc::new(oracle))?;
//! let results = infoflow.run();
//! ```
//!
//! A run can be cancelled from another thread through
//! [`Infoflow::abort_handle`]; the phase that was running reports
//! `DATA_FLOW_CANCELLED` or `PATH_RECON_CANCELLED`.

use crate::config::{AliasingAlgorithm, InfoflowConfig};
use crate::errors::{InfoflowError, Result};
use crate::features::abstraction::{AbsRef, AbstractionAtSink};
use crate::features::access_path::AccessPathFactory;
use crate::features::ifds_solver::infrastructure::{
    program_baseline_bytes, AbortHandle, MemoryWatcher, SolverMemoryEstimator, TimeoutWatcher,
};
use crate::features::ifds_solver::ports::MemoryEstimator;
use crate::features::ifds_solver::{
    IfdsSolver, SolverExecutor, TerminatableSolver, TerminationState,
};
use crate::features::taint_analysis::domain::{
    InfoflowResults, PerformanceData, ResultSinkInfo, ResultSourceInfo,
};
use crate::features::taint_analysis::infrastructure::{
    AliasProblem, DefaultNativeCallHandler, InfoflowManager, InfoflowProblem, SourceFinder,
    SourceFinderReport,
};
use crate::features::taint_analysis::ports::{
    InterproceduralCfg, NativeCallHandler, PointsToOracle, ResultsAvailableHandler,
    SourceSinkOracle, TaintPropagationHandler, TaintWrapper,
};
use crate::shared::ir::StmtId;
use rayon::ThreadPool;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Source and sink statements found before propagation
#[derive(Debug, Default)]
struct Prescan {
    sources: Vec<StmtId>,
    sinks: FxHashSet<StmtId>,
}

/// What one data-flow pass leaves behind
struct DataFlowOutcome {
    results: Vec<(AbstractionAtSink, AbsRef)>,
    termination: TerminationState,
    faults: Vec<String>,
    performance: PerformanceData,
    aborted: bool,
}

pub struct Infoflow {
    config: Arc<InfoflowConfig>,
    icfg: Arc<dyn InterproceduralCfg>,
    source_sink: Arc<dyn SourceSinkOracle>,
    taint_wrapper: Option<Arc<dyn TaintWrapper>>,
    native_handler: Option<Arc<dyn NativeCallHandler>>,
    points_to: Option<Arc<dyn PointsToOracle>>,
    propagation_handlers: Vec<Arc<dyn TaintPropagationHandler>>,
    result_handlers: Vec<Arc<dyn ResultsAvailableHandler>>,
    abort: AbortHandle,
}

impl Infoflow {
    /// Validates `config` and the program's entry points; nothing runs until
    /// [`Infoflow::run`]
    pub fn new(
        config: InfoflowConfig,
        icfg: Arc<dyn InterproceduralCfg>,
        source_sink: Arc<dyn SourceSinkOracle>,
    ) -> Result<Self> {
        config.validate()?;
        if icfg.reachable_methods().is_empty() {
            return Err(InfoflowError::setup(
                "no reachable method has a body",
            ));
        }
        Ok(Self {
            config: Arc::new(config),
            icfg,
            source_sink,
            taint_wrapper: None,
            native_handler: Some(Arc::new(DefaultNativeCallHandler::new())),
            points_to: None,
            propagation_handlers: Vec::new(),
            result_handlers: Vec::new(),
            abort: AbortHandle::new(),
        })
    }

    pub fn with_taint_wrapper(mut self, wrapper: Arc<dyn TaintWrapper>) -> Self {
        self.taint_wrapper = Some(wrapper);
        self
    }

    /// `None` disables native call handling
    pub fn with_native_handler(mut self, handler: Option<Arc<dyn NativeCallHandler>>) -> Self {
        self.native_handler = handler;
        self
    }

    pub fn with_points_to(mut self, points_to: Arc<dyn PointsToOracle>) -> Self {
        self.points_to = Some(points_to);
        self
    }

    pub fn with_propagation_handler(mut self, handler: Arc<dyn TaintPropagationHandler>) -> Self {
        self.propagation_handlers.push(handler);
        self
    }

    pub fn with_result_handler(mut self, handler: Arc<dyn ResultsAvailableHandler>) -> Self {
        self.result_handlers.push(handler);
        self
    }

    pub fn config(&self) -> &InfoflowConfig {
        &self.config
    }

    /// Handle that cancels this analysis; may be cloned into other threads
    /// or into handlers before [`Infoflow::run`]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Cancels the running phase and every phase after it. A cancel before
    /// `run` makes the run stop at its first solver.
    pub fn abort_analysis(&self) {
        self.abort.abort();
    }

    // ========================================================================
    // Run
    // ========================================================================

    /// Runs the analysis to completion or until a budget is exhausted.
    ///
    /// Setup failures after validation (the worker pool cannot be created)
    /// are reported through `exceptions()` like task faults.
    pub fn run(&self) -> InfoflowResults {
        let started = Instant::now();
        let mut results = InfoflowResults::new();

        let ap_factory = Arc::new(AccessPathFactory::new(
            &self.config,
            self.icfg.program().shared_hierarchy(),
        ));
        let setup = self.manager(&ap_factory, FxHashSet::default(), FxHashSet::default());
        self.initialize_collaborators(&setup);

        let prescan = self.prescan(&setup);
        {
            let perf = results.performance_data_mut();
            perf.source_count = prescan.sources.len();
            perf.sink_count = prescan.sinks.len();
        }
        if prescan.sources.is_empty() {
            warn!("No sources found, aborting analysis");
            return results;
        }
        if prescan.sinks.is_empty() {
            warn!("No sinks found, aborting analysis");
            return results;
        }
        info!(
            sources = prescan.sources.len(),
            sinks = prescan.sinks.len(),
            "Source lookup done"
        );

        let pool = match self.build_pool() {
            Ok(pool) => pool,
            Err(e) => {
                error!(error = %e, "Could not create the solver pool");
                results.add_exception(e.to_string());
                return results;
            }
        };

        let batches: Vec<Vec<StmtId>> = if self.config.one_source_at_a_time {
            prescan.sources.iter().map(|s| vec![*s]).collect()
        } else {
            vec![prescan.sources.clone()]
        };

        let mut raw: Vec<(AbstractionAtSink, AbsRef)> = Vec::new();
        for (i, seeds) in batches.into_iter().enumerate() {
            debug!(batch = i, seeds = seeds.len(), "Starting data-flow pass");
            // Only the seeds of this pass create taints
            let sources: FxHashSet<StmtId> = seeds.iter().copied().collect();
            let outcome =
                self.run_data_flow(&ap_factory, &pool, seeds, sources, prescan.sinks.clone());
            results.add_termination_state(outcome.termination);
            for fault in outcome.faults {
                results.add_exception(fault);
            }
            results.performance_data_mut().add(&outcome.performance);
            raw.extend(outcome.results);

            // A budget, a handler stop or a cancel ends the remaining passes too
            if outcome.aborted || !outcome.termination.is_success() || self.abort.is_aborted() {
                break;
            }
        }

        let raw = remove_entailed_abstractions(raw);
        info!(
            results = raw.len(),
            state = %results.termination_state(),
            "Data-flow analysis finished"
        );

        let report = self.find_sources(raw, &pool);
        if let Some(reason) = report.termination {
            results.add_termination_state(TerminationState::from_path_reconstruction(reason));
        }
        for search in report.searches {
            let sink = ResultSinkInfo::from_abstraction_at_sink(&search.at_sink);
            for ctx in &search.sources {
                results.add_result(sink.clone(), ResultSourceInfo::from(ctx.as_ref()));
            }
            results.add_abstraction_at_sink(search.at_sink);
        }

        let perf = results.performance_data_mut();
        perf.path_reconstruction_time = report.elapsed;
        perf.total_time = started.elapsed();
        info!(
            sinks = results.len(),
            connections = results.num_connections(),
            edges = results.performance_data().edge_propagation_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            state = %results.termination_state(),
            "Analysis finished"
        );
        results
    }

    fn manager(
        &self,
        ap_factory: &Arc<AccessPathFactory>,
        sources: FxHashSet<StmtId>,
        sinks: FxHashSet<StmtId>,
    ) -> Arc<InfoflowManager> {
        InfoflowManager::builder(
            Arc::clone(&self.config),
            Arc::clone(&self.icfg),
            Arc::clone(&self.source_sink),
        )
        .ap_factory(Arc::clone(ap_factory))
        .taint_wrapper(self.taint_wrapper.clone())
        .native_handler(self.native_handler.clone())
        .points_to(self.points_to.clone())
        .propagation_handlers(self.propagation_handlers.clone())
        .result_handlers(self.result_handlers.clone())
        .source_stmts(sources)
        .sink_stmts(sinks)
        .build()
    }

    fn initialize_collaborators(&self, manager: &InfoflowManager) {
        self.source_sink.initialize(manager);
        if let Some(wrapper) = &self.taint_wrapper {
            wrapper.initialize(manager);
        }
        if let Some(handler) = &self.native_handler {
            handler.initialize(manager);
        }
    }

    /// Asks the oracle about every statement of every reachable method
    fn prescan(&self, manager: &InfoflowManager) -> Prescan {
        let mut prescan = Prescan::default();
        let program = self.icfg.program();
        for &method in self.icfg.reachable_methods() {
            let m = program.method(method);
            if !m.has_body() {
                continue;
            }
            for &id in &m.body {
                let stmt = program.stmt(id);
                if self.source_sink.source_info(stmt, manager).is_some() {
                    prescan.sources.push(id);
                }
                if self.source_sink.sink_info(stmt, manager, None).is_some() {
                    prescan.sinks.insert(id);
                }
            }
        }
        prescan.sources.sort();
        prescan.sources.dedup();
        prescan
    }

    fn build_pool(&self) -> Result<Arc<ThreadPool>> {
        let threads = if cfg!(feature = "parallel") {
            self.config.solver.threads.unwrap_or_else(num_cpus::get)
        } else {
            1
        };
        debug!(threads, "Creating solver pool");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("taintflow-solver-{}", i))
            .build()?;
        Ok(Arc::new(pool))
    }

    // ========================================================================
    // Data-flow pass
    // ========================================================================

    fn run_data_flow(
        &self,
        ap_factory: &Arc<AccessPathFactory>,
        pool: &Arc<ThreadPool>,
        seeds: Vec<StmtId>,
        sources: FxHashSet<StmtId>,
        sinks: FxHashSet<StmtId>,
    ) -> DataFlowOutcome {
        let started = Instant::now();
        let seed_count = seeds.len();
        let manager = self.manager(ap_factory, sources, sinks);
        let executor = SolverExecutor::new(Arc::clone(pool));

        let forward = Arc::new(IfdsSolver::new(
            "forward",
            Arc::new(InfoflowProblem::new(Arc::clone(&manager), seeds)),
            executor.clone(),
            self.config.solver.clone(),
        ));
        manager.set_forward_solver(&forward);

        let alias = (self.config.aliasing_algorithm == AliasingAlgorithm::FlowSensitive).then(|| {
            let solver = Arc::new(IfdsSolver::new(
                "alias",
                Arc::new(AliasProblem::new(Arc::clone(&manager))),
                executor.clone(),
                self.config.solver.clone(),
            ));
            manager.set_alias_solver(&solver);
            solver
        });

        let mut solvers: Vec<Arc<dyn TerminatableSolver>> = vec![forward.clone()];
        if let Some(alias) = &alias {
            solvers.push(alias.clone());
        }

        let interval = Duration::from_millis(self.config.watcher_interval_ms.max(1));
        let estimator = Arc::new(SolverMemoryEstimator::new(self.icfg.program().stmts().len()));
        estimator.track(&forward);
        if let Some(alias) = &alias {
            estimator.track(alias);
        }
        let mut memory_watcher = MemoryWatcher::new(
            estimator.clone(),
            self.config.memory_budget_bytes,
            self.config.memory_threshold,
            interval,
        );
        let mut timeout_watcher = self
            .config
            .data_flow_timeout_secs
            .map(|secs| TimeoutWatcher::new(Duration::from_secs(secs), interval));
        for solver in &solvers {
            self.abort.register(Arc::clone(solver));
            memory_watcher.add_solver(Arc::clone(solver));
            if let Some(watcher) = timeout_watcher.as_mut() {
                watcher.add_solver(Arc::clone(solver));
            }
        }
        memory_watcher.start();
        if let Some(watcher) = timeout_watcher.as_mut() {
            watcher.start();
        }

        forward.solve();

        if let Some(watcher) = timeout_watcher.as_mut() {
            watcher.stop();
        }
        memory_watcher.stop();
        self.abort.clear();

        let mut termination = TerminationState::SUCCESS;
        for solver in &solvers {
            if let Some(reason) = solver.termination_reason() {
                termination |= TerminationState::from_data_flow(reason);
            }
        }
        let faults = executor.faults();
        if !faults.is_empty() {
            error!(faults = faults.len(), "Solver tasks failed, results are incomplete");
        }

        let forward_stats = forward.statistics();
        let alias_stats = alias.as_ref().map(|a| a.statistics()).unwrap_or_default();
        let mut performance = PerformanceData {
            forward_propagation_count: forward_stats.propagation_count,
            alias_propagation_count: alias_stats.propagation_count,
            seed_count,
            data_flow_time: started.elapsed(),
            ..PerformanceData::default()
        };
        performance.update_max_memory(estimator.used_bytes());
        info!(
            forward_edges = forward_stats.propagation_count,
            alias_edges = alias_stats.propagation_count,
            results = manager.results().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "IFDS problem solved"
        );

        DataFlowOutcome {
            results: manager.results().results(),
            termination,
            faults,
            performance,
            aborted: manager.is_aborted(),
        }
    }
}

impl Infoflow {
    // ========================================================================
    // Source finding
    // ========================================================================

    /// Pairs `raw` with its sources under the path memory budget
    fn find_sources(
        &self,
        raw: Vec<(AbstractionAtSink, AbsRef)>,
        pool: &Arc<ThreadPool>,
    ) -> SourceFinderReport {
        if raw.is_empty() {
            return SourceFinderReport::default();
        }
        let baseline = program_baseline_bytes(self.icfg.program().stmts().len());
        let finder =
            Arc::new(SourceFinder::from_config(&self.config.path).with_baseline_bytes(baseline));
        let budget = self
            .config
            .path
            .memory_budget_bytes
            .unwrap_or(self.config.memory_budget_bytes);
        let interval = Duration::from_millis(self.config.watcher_interval_ms.max(1));
        let mut memory_watcher =
            MemoryWatcher::new(finder.clone(), budget, self.config.memory_threshold, interval);
        memory_watcher.add_solver(finder.clone());
        self.abort.register(finder.clone());
        memory_watcher.start();

        let report = finder.find_all(raw, Some(pool.as_ref()));

        memory_watcher.stop();
        self.abort.clear();
        debug!(
            visited = finder.visited_count(),
            terminated = ?report.termination,
            "Source finding done"
        );
        report
    }
}

/// Drops observations covered by another one at the same sink: with `a.*`
/// and `a.b.*` reaching one sink, `a.b.*` adds nothing.
pub fn remove_entailed_abstractions(
    results: Vec<(AbstractionAtSink, AbsRef)>,
) -> Vec<(AbstractionAtSink, AbsRef)> {
    let entailed: Vec<bool> = results
        .iter()
        .enumerate()
        .map(|(i, (cur, _))| {
            results.iter().enumerate().any(|(j, (check, _))| {
                i != j
                    && check.sink_stmt() == cur.sink_stmt()
                    && check.sink_definition() == cur.sink_definition()
                    && check.abstraction().local_equals(cur.abstraction())
                    && check.abstraction().access_path() != cur.abstraction().access_path()
                    && check
                        .abstraction()
                        .access_path()
                        .entails(cur.abstraction().access_path())
            })
        })
        .collect();
    results
        .into_iter()
        .zip(entailed)
        .filter_map(|(res, drop)| (!drop).then_some(res))
        .collect()
}
