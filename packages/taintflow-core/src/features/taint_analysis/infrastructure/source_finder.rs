//! Context-insensitive source finder
//!
//! Pairs each sink observation with the source contexts reachable through
//! its provenance DAG. Every fact carrying a source context is a source; the
//! walk follows predecessor links and neighbor sets without matching call
//! sites, so it may over-approximate the sources of a result but never
//! misses one within its budget.

use crate::config::PathConfig;
use crate::features::abstraction::{AbsRef, Abstraction, AbstractionAtSink, SourceContext};
use crate::features::ifds_solver::ports::{MemoryEstimator, TerminatableSolver};
use crate::features::ifds_solver::TerminationReason;
use parking_lot::Mutex;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rayon::ThreadPool;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Rough cost of one visited fact in a walk's working set
const BYTES_PER_VISITED_FACT: u64 = 48;

/// Sources found for one sink observation
#[derive(Debug, Clone)]
pub struct SourceSearch {
    pub at_sink: AbstractionAtSink,
    pub sources: Vec<Arc<SourceContext>>,
    /// The walk covered the whole DAG
    pub complete: bool,
}

/// Outcome of a source-finding pass over all results
#[derive(Debug, Default)]
pub struct SourceFinderReport {
    pub searches: Vec<SourceSearch>,
    /// Why the pass stopped early, if it did
    pub termination: Option<TerminationReason>,
    pub elapsed: Duration,
}

impl SourceFinderReport {
    pub fn timed_out(&self) -> bool {
        self.termination == Some(TerminationReason::Timeout)
    }
}

/// Walks the provenance DAG of each result back to its sources.
///
/// The finder is a [`TerminatableSolver`] so the memory watcher and the
/// caller's abort handle can stop it like the data-flow solvers; its own
/// timeout terminates it the same way. Termination is sticky.
pub struct SourceFinder {
    timeout: Option<Duration>,
    max_visited: Option<usize>,
    baseline_bytes: u64,
    stopped: AtomicBool,
    reason: Mutex<Option<TerminationReason>>,
    running: AtomicBool,
    visited: AtomicU64,
}

impl SourceFinder {
    pub fn new(timeout: Option<Duration>, max_visited: Option<usize>) -> Self {
        Self {
            timeout,
            max_visited,
            baseline_bytes: 0,
            stopped: AtomicBool::new(false),
            reason: Mutex::new(None),
            running: AtomicBool::new(false),
            visited: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &PathConfig) -> Self {
        Self::new(
            config.path_reconstruction_timeout_secs.map(Duration::from_secs),
            config.max_visited_per_result,
        )
    }

    /// Memory already held when the search starts, counted by [`MemoryEstimator`]
    pub fn with_baseline_bytes(mut self, bytes: u64) -> Self {
        self.baseline_bytes = bytes;
        self
    }

    /// Facts visited over all walks so far
    pub fn visited_count(&self) -> u64 {
        self.visited.load(Ordering::Relaxed)
    }

    /// Searches the sources of every result, on `pool` when one is given
    pub fn find_all(
        &self,
        results: Vec<(AbstractionAtSink, AbsRef)>,
        pool: Option<&ThreadPool>,
    ) -> SourceFinderReport {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        self.running.store(true, Ordering::SeqCst);
        debug!(results = results.len(), "Searching sources of data-flow results");

        let search = |(at_sink, abs): (AbstractionAtSink, AbsRef)| {
            let (sources, complete) = self.walk(&abs, deadline);
            SourceSearch {
                at_sink,
                sources,
                complete,
            }
        };
        let mut searches: Vec<SourceSearch> = match pool {
            #[cfg(feature = "parallel")]
            Some(pool) => pool.install(|| results.into_par_iter().map(search).collect()),
            #[cfg(not(feature = "parallel"))]
            Some(_) => results.into_iter().map(search).collect(),
            None => results.into_iter().map(search).collect(),
        };
        searches.sort_by_key(|s| s.at_sink.sink_stmt());
        self.running.store(false, Ordering::SeqCst);

        let termination = self.termination_reason();
        if let Some(reason) = termination {
            warn!(
                %reason,
                timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64),
                visited = self.visited_count(),
                "Source finding stopped early, results may miss sources"
            );
        }
        SourceFinderReport {
            searches,
            termination,
            elapsed: started.elapsed(),
        }
    }

    /// Depth-first walk over predecessors and neighbors of `start`
    pub fn find(&self, start: &AbsRef) -> (Vec<Arc<SourceContext>>, bool) {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        self.walk(start, deadline)
    }

    fn walk(&self, start: &AbsRef, deadline: Option<Instant>) -> (Vec<Arc<SourceContext>>, bool) {
        let mut sources: Vec<Arc<SourceContext>> = Vec::new();
        let mut seen_sources: FxHashSet<Arc<SourceContext>> = FxHashSet::default();
        let mut visited: FxHashSet<*const Abstraction> = FxHashSet::default();
        let mut stack: Vec<AbsRef> = vec![Arc::clone(start)];

        while let Some(abs) = stack.pop() {
            if !visited.insert(Arc::as_ptr(&abs)) {
                continue;
            }
            self.visited.fetch_add(1, Ordering::Relaxed);
            if deadline.map_or(false, |d| Instant::now() >= d) {
                self.force_terminate(TerminationReason::Timeout);
            }
            if self.stopped.load(Ordering::Relaxed) {
                return (sources, false);
            }
            if self.max_visited.map_or(false, |max| visited.len() > max) {
                debug!(visited = visited.len(), "Source search of one result cut off");
                return (sources, false);
            }

            if let Some(ctx) = abs.source_context() {
                if seen_sources.insert(Arc::clone(ctx)) {
                    sources.push(Arc::clone(ctx));
                }
            }
            if let Some(pred) = abs.predecessor() {
                stack.push(Arc::clone(pred));
            }
            stack.extend(abs.neighbors());
        }
        sources.sort_by_key(|ctx| ctx.stmt());
        (sources, true)
    }
}

impl TerminatableSolver for SourceFinder {
    fn force_terminate(&self, reason: TerminationReason) {
        let mut current = self.reason.lock();
        if current.is_none() {
            debug!(%reason, "Terminating source finder");
            *current = Some(reason);
        }
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn termination_reason(&self) -> Option<TerminationReason> {
        *self.reason.lock()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst)
    }
}

impl MemoryEstimator for SourceFinder {
    fn used_bytes(&self) -> u64 {
        self.baseline_bytes + self.visited_count() * BYTES_PER_VISITED_FACT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::SourceSinkDefinition;
    use crate::features::access_path::AccessPathFactory;
    use crate::shared::ir::{ClassHierarchy, Local, LocalId, StmtId, Type, Value};

    fn factory() -> AccessPathFactory {
        AccessPathFactory::new(&InfoflowConfig::default(), Arc::new(ClassHierarchy::default()))
    }

    fn source(factory: &AccessPathFactory, name: &str, stmt: u32) -> AbsRef {
        let local = Local::new(LocalId(stmt), name, Type::string());
        let ap = factory.create(&Value::local(&local), true).unwrap();
        let ctx = SourceContext::new(
            Arc::new(SourceSinkDefinition::source(&format!("src{}", stmt))),
            ap,
            StmtId(stmt),
            None,
        );
        Arc::new(Abstraction::new_source(ctx, false, false))
    }

    fn step(from: &AbsRef, stmt: u32) -> AbsRef {
        Abstraction::derive_new_abstraction(from, Some(Arc::clone(from.access_path())), Some(StmtId(stmt)))
            .unwrap()
    }

    fn at_sink(abs: &AbsRef, stmt: u32) -> AbstractionAtSink {
        AbstractionAtSink::new(
            Arc::new(SourceSinkDefinition::sink("sink")),
            Arc::clone(abs),
            StmtId(stmt),
        )
    }

    #[test]
    fn test_follows_predecessors_and_neighbors() {
        let f = factory();
        let a = source(&f, "a", 1);
        let b = source(&f, "b", 2);
        let via_a = step(&step(&a, 3), 4);
        let via_b = step(&b, 4);
        via_a.add_neighbor(&via_b, false);

        let finder = SourceFinder::new(None, None);
        let (sources, complete) = finder.find(&via_a);
        assert!(complete);
        let stmts: Vec<StmtId> = sources.iter().map(|s| s.stmt()).collect();
        assert_eq!(stmts, vec![StmtId(1), StmtId(2)]);
    }

    #[test]
    fn test_cyclic_neighbors_terminate() {
        let f = factory();
        let a = source(&f, "a", 1);
        let x = step(&a, 2);
        let y = step(&x, 3);
        // A loop in the DAG: x reaches y and y is a neighbor of x
        x.add_neighbor(&y, false);
        let (sources, complete) = SourceFinder::new(None, None).find(&y);
        assert!(complete);
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_zero_timeout_reports_incomplete() {
        let f = factory();
        let a = source(&f, "a", 1);
        let fact = step(&a, 2);
        let finder = SourceFinder::new(Some(Duration::ZERO), None);
        let report = finder.find_all(vec![(at_sink(&fact, 2), fact)], None);
        assert!(report.timed_out());
        assert!(!report.searches[0].complete);
    }

    #[test]
    fn test_visit_limit_cuts_search() {
        let f = factory();
        let a = source(&f, "a", 1);
        let mut fact = a;
        for i in 2..10u32 {
            fact = step(&fact, i);
        }
        let (sources, complete) = SourceFinder::new(None, Some(3)).find(&fact);
        assert!(!complete);
        assert!(sources.is_empty());
    }

    #[test]
    fn test_find_all_on_pool() {
        let f = factory();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let inputs: Vec<_> = (0..8)
            .map(|i| {
                let fact = step(&source(&f, "a", i), 100 + i);
                (at_sink(&fact, 100 + i), fact)
            })
            .collect();
        let report = SourceFinder::new(None, None).find_all(inputs, Some(&pool));
        assert_eq!(report.termination, None);
        assert_eq!(report.searches.len(), 8);
        assert!(report.searches.iter().all(|s| s.complete && s.sources.len() == 1));
    }

    #[test]
    fn test_terminated_finder_reports_reason() {
        let f = factory();
        let fact = step(&source(&f, "a", 1), 2);
        let finder = SourceFinder::new(None, None);
        finder.force_terminate(TerminationReason::Cancelled);
        finder.force_terminate(TerminationReason::OutOfMemory);

        let report = finder.find_all(vec![(at_sink(&fact, 2), fact)], None);
        assert_eq!(report.termination, Some(TerminationReason::Cancelled));
        assert!(!report.timed_out());
        assert!(!report.searches[0].complete);
        assert!(report.searches[0].sources.is_empty());
        assert!(!finder.is_running());
    }

    #[test]
    fn test_memory_watcher_stops_finder() {
        use crate::features::ifds_solver::infrastructure::MemoryWatcher;

        let f = factory();
        let fact = step(&source(&f, "a", 1), 2);
        let finder = Arc::new(SourceFinder::new(None, None).with_baseline_bytes(1_000));
        let mut watcher = MemoryWatcher::new(finder.clone(), 100, 0.9, Duration::from_millis(5));
        watcher.add_solver(finder.clone());
        watcher.start();

        let report = finder.find_all(vec![(at_sink(&fact, 2), fact)], None);
        watcher.stop();
        assert_eq!(report.termination, Some(TerminationReason::OutOfMemory));
        assert!(!report.searches[0].complete);
    }

    #[test]
    fn test_visited_facts_grow_the_estimate() {
        let f = factory();
        let mut fact = source(&f, "a", 1);
        for i in 2..6u32 {
            fact = step(&fact, i);
        }
        let finder = SourceFinder::new(None, None).with_baseline_bytes(10);
        assert_eq!(finder.used_bytes(), 10);
        finder.find(&fact);
        assert_eq!(finder.visited_count(), 5);
        assert_eq!(finder.used_bytes(), 10 + 5 * BYTES_PER_VISITED_FACT);
    }
}
