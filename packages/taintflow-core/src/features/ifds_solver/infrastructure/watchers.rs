//! Resource watchers
//!
//! Background threads that force-terminate registered solvers once the
//! data-flow timeout elapsed or the estimated memory use crosses the
//! configured share of the budget. Both conditions are also checked once
//! synchronously on `start`, so a zero timeout or a budget that is already
//! exhausted stops the solvers before their first edge.

use crate::features::ifds_solver::domain::TerminationReason;
use crate::features::ifds_solver::infrastructure::solver::IfdsSolver;
use crate::features::ifds_solver::ports::{MemoryEstimator, TerminatableSolver};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Rough per-statement cost of the program representation
const BYTES_PER_STMT: u64 = 256;
/// Rough cost of one jump function including its fact
const BYTES_PER_JUMP_FUNCTION: u64 = 192;

type Solvers = Vec<Arc<dyn TerminatableSolver>>;

/// Estimated footprint of a program with `stmts` statements
pub fn program_baseline_bytes(stmts: usize) -> u64 {
    stmts as u64 * BYTES_PER_STMT
}

// ============================================================================
// Shared watcher thread
// ============================================================================

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// A thread that evaluates `check` every `interval` until it fires or is stopped
struct WatcherThread {
    signal: Arc<StopSignal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl WatcherThread {
    fn spawn<F>(name: &str, interval: Duration, mut check: F) -> Option<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut stopped = thread_signal.stopped.lock();
                while !*stopped {
                    thread_signal.wake.wait_for(&mut stopped, interval);
                    if *stopped {
                        break;
                    }
                    if check() {
                        break;
                    }
                }
            });
        match handle {
            Ok(handle) => Some(Self {
                signal,
                handle: Some(handle),
            }),
            Err(e) => {
                warn!(watcher = name, error = %e, "Could not start watcher thread");
                None
            }
        }
    }

    fn stop(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Watcher thread panicked");
            }
        }
    }
}

impl Drop for WatcherThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn terminate_all(solvers: &[Arc<dyn TerminatableSolver>], reason: TerminationReason) {
    for solver in solvers {
        solver.force_terminate(reason);
    }
}

// ============================================================================
// Timeout
// ============================================================================

pub struct TimeoutWatcher {
    timeout: Duration,
    interval: Duration,
    solvers: Solvers,
    thread: Option<WatcherThread>,
}

impl TimeoutWatcher {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            solvers: Vec::new(),
            thread: None,
        }
    }

    pub fn add_solver(&mut self, solver: Arc<dyn TerminatableSolver>) {
        self.solvers.push(solver);
    }

    pub fn start(&mut self) {
        if self.timeout.is_zero() {
            warn!("Data-flow timeout of zero, terminating immediately");
            terminate_all(&self.solvers, TerminationReason::Timeout);
            return;
        }
        let started = Instant::now();
        let timeout = self.timeout;
        let solvers = self.solvers.clone();
        debug!(timeout_ms = timeout.as_millis() as u64, "Starting timeout watcher");
        self.thread = WatcherThread::spawn("taintflow-timeout", self.interval, move || {
            if started.elapsed() >= timeout {
                warn!(timeout_ms = timeout.as_millis() as u64, "Data-flow timeout reached");
                terminate_all(&solvers, TerminationReason::Timeout);
                true
            } else {
                false
            }
        });
    }

    pub fn stop(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
    }
}

// ============================================================================
// Memory
// ============================================================================

pub struct MemoryWatcher {
    estimator: Arc<dyn MemoryEstimator>,
    budget_bytes: u64,
    threshold: f64,
    interval: Duration,
    solvers: Solvers,
    thread: Option<WatcherThread>,
}

impl MemoryWatcher {
    pub fn new(
        estimator: Arc<dyn MemoryEstimator>,
        budget_bytes: u64,
        threshold: f64,
        interval: Duration,
    ) -> Self {
        Self {
            estimator,
            budget_bytes,
            threshold,
            interval,
            solvers: Vec::new(),
            thread: None,
        }
    }

    pub fn add_solver(&mut self, solver: Arc<dyn TerminatableSolver>) {
        self.solvers.push(solver);
    }

    fn limit(&self) -> u64 {
        (self.budget_bytes as f64 * self.threshold) as u64
    }

    /// Whether the estimate already exceeds the limit
    pub fn is_exhausted(&self) -> bool {
        self.estimator.used_bytes() > self.limit()
    }

    pub fn start(&mut self) {
        let limit = self.limit();
        if self.is_exhausted() {
            warn!(
                used = self.estimator.used_bytes(),
                limit, "Memory budget exhausted before propagation"
            );
            terminate_all(&self.solvers, TerminationReason::OutOfMemory);
            return;
        }
        let estimator = Arc::clone(&self.estimator);
        let solvers = self.solvers.clone();
        self.thread = WatcherThread::spawn("taintflow-memory", self.interval, move || {
            let used = estimator.used_bytes();
            if used > limit {
                warn!(used, limit, "Memory threshold crossed");
                terminate_all(&solvers, TerminationReason::OutOfMemory);
                true
            } else {
                false
            }
        });
    }

    pub fn stop(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
        }
    }
}

/// Estimates memory from the program size and the solvers' table sizes
pub struct SolverMemoryEstimator {
    baseline: u64,
    solvers: Mutex<Vec<Weak<IfdsSolver>>>,
}

impl SolverMemoryEstimator {
    pub fn new(program_stmts: usize) -> Self {
        Self {
            baseline: program_baseline_bytes(program_stmts),
            solvers: Mutex::new(Vec::new()),
        }
    }

    pub fn track(&self, solver: &Arc<IfdsSolver>) {
        self.solvers.lock().push(Arc::downgrade(solver));
    }
}

impl MemoryEstimator for SolverMemoryEstimator {
    fn used_bytes(&self) -> u64 {
        let tables: u64 = self
            .solvers
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|s| s.jump_function_count() as u64 * BYTES_PER_JUMP_FUNCTION)
            .sum();
        self.baseline + tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Recorder {
        reason: Mutex<Option<TerminationReason>>,
    }

    impl TerminatableSolver for Recorder {
        fn force_terminate(&self, reason: TerminationReason) {
            self.reason.lock().get_or_insert(reason);
        }

        fn termination_reason(&self) -> Option<TerminationReason> {
            *self.reason.lock()
        }

        fn is_running(&self) -> bool {
            self.reason.lock().is_none()
        }
    }

    struct FixedEstimate(AtomicU64);

    impl MemoryEstimator for FixedEstimate {
        fn used_bytes(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_zero_timeout_terminates_synchronously() {
        let recorder = Arc::new(Recorder::default());
        let mut watcher = TimeoutWatcher::new(Duration::ZERO, Duration::from_millis(10));
        watcher.add_solver(recorder.clone());
        watcher.start();
        assert_eq!(recorder.termination_reason(), Some(TerminationReason::Timeout));
        watcher.stop();
    }

    #[test]
    fn test_timeout_fires_in_background() {
        let recorder = Arc::new(Recorder::default());
        let mut watcher = TimeoutWatcher::new(Duration::from_millis(20), Duration::from_millis(5));
        watcher.add_solver(recorder.clone());
        watcher.start();
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.termination_reason().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        watcher.stop();
        assert_eq!(recorder.termination_reason(), Some(TerminationReason::Timeout));
    }

    #[test]
    fn test_stopped_watcher_never_fires() {
        let recorder = Arc::new(Recorder::default());
        let mut watcher = TimeoutWatcher::new(Duration::from_secs(3600), Duration::from_millis(5));
        watcher.add_solver(recorder.clone());
        watcher.start();
        watcher.stop();
        assert_eq!(recorder.termination_reason(), None);
    }

    #[test]
    fn test_exhausted_budget_terminates_before_start() {
        let recorder = Arc::new(Recorder::default());
        let estimator = Arc::new(FixedEstimate(AtomicU64::new(1_000)));
        let mut watcher = MemoryWatcher::new(estimator, 100, 0.9, Duration::from_millis(5));
        watcher.add_solver(recorder.clone());
        watcher.start();
        assert_eq!(recorder.termination_reason(), Some(TerminationReason::OutOfMemory));
    }

    #[test]
    fn test_growing_estimate_trips_memory_watcher() {
        let recorder = Arc::new(Recorder::default());
        let estimator = Arc::new(FixedEstimate(AtomicU64::new(10)));
        let mut watcher =
            MemoryWatcher::new(estimator.clone(), 1_000, 0.5, Duration::from_millis(5));
        watcher.add_solver(recorder.clone());
        watcher.start();
        assert_eq!(recorder.termination_reason(), None);
        estimator.0.store(900, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.termination_reason().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        watcher.stop();
        assert_eq!(recorder.termination_reason(), Some(TerminationReason::OutOfMemory));
    }

    #[test]
    fn test_estimator_counts_program_baseline() {
        let estimator = SolverMemoryEstimator::new(4);
        assert_eq!(estimator.used_bytes(), 4 * BYTES_PER_STMT);
    }
}
