//! Interruptible task executor shared by the forward and the alias solver
//!
//! Tasks run on a rayon pool. The executor counts tasks in flight so the
//! driver can block until both solvers have converged; a task scheduled
//! from inside another task keeps the count above zero, which is how an edge
//! injected into an idle solver wakes it up again.

use parking_lot::{Condvar, Mutex};
use rayon::ThreadPool;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Default)]
struct ExecutorState {
    in_flight: Mutex<usize>,
    idle: Condvar,
    interrupted: AtomicBool,
    faults: Mutex<Vec<String>>,
}

impl ExecutorState {
    fn finish_one(&self) {
        let mut n = self.in_flight.lock();
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.idle.notify_all();
        }
    }

    fn record_fault(&self, payload: Box<dyn Any + Send>) {
        let message = panic_message(payload.as_ref());
        error!(fault = %message, "Solver task panicked");
        self.faults.lock().push(message);
        // One broken task invalidates the fixed point
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct SolverExecutor {
    pool: Arc<ThreadPool>,
    state: Arc<ExecutorState>,
}

impl SolverExecutor {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool,
            state: Arc::new(ExecutorState::default()),
        }
    }

    /// Builds a dedicated pool with `threads` workers
    pub fn with_threads(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("taintflow-solver-{}", i))
            .build()?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Schedules `task`; dropped silently once the executor is interrupted
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_interrupted() {
            return;
        }
        *self.state.in_flight.lock() += 1;
        let state = Arc::clone(&self.state);
        self.pool.spawn(move || {
            if !state.interrupted.load(Ordering::SeqCst) {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                    state.record_fault(payload);
                }
            }
            state.finish_one();
        });
    }

    /// Blocks until no task is queued or running
    pub fn await_completion(&self) {
        let mut n = self.state.in_flight.lock();
        while *n > 0 {
            self.state.idle.wait(&mut n);
        }
    }

    /// Like [`Self::await_completion`], giving up after `timeout`; returns
    /// whether the executor drained
    pub fn await_completion_for(&self, timeout: Duration) -> bool {
        let mut n = self.state.in_flight.lock();
        while *n > 0 {
            if self.state.idle.wait_for(&mut n, timeout).timed_out() {
                return *n == 0;
            }
        }
        true
    }

    /// Queued tasks are skipped, running ones finish normally
    pub fn interrupt(&self) {
        if !self.state.interrupted.swap(true, Ordering::SeqCst) {
            warn!("Solver executor interrupted");
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.interrupted.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        *self.state.in_flight.lock()
    }

    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    /// Messages of all panicked tasks so far
    pub fn faults(&self) -> Vec<String> {
        self.state.faults.lock().clone()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_await_covers_nested_tasks() {
        let executor = SolverExecutor::with_threads(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let inner = executor.clone();
            let counter = Arc::clone(&counter);
            executor.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let counter = Arc::clone(&counter);
                inner.execute(move || {
                    counter.fetch_add(10, Ordering::SeqCst);
                });
            });
        }
        executor.await_completion();
        assert_eq!(counter.load(Ordering::SeqCst), 44);
        assert_eq!(executor.in_flight(), 0);
    }

    #[test]
    fn test_panicking_task_is_recorded() {
        let executor = SolverExecutor::with_threads(1).unwrap();
        executor.execute(|| panic!("broken flow function"));
        executor.await_completion();
        assert_eq!(executor.faults(), vec!["broken flow function".to_string()]);
        assert!(executor.is_interrupted());
    }

    #[test]
    fn test_interrupted_executor_drops_new_tasks() {
        let executor = SolverExecutor::with_threads(1).unwrap();
        executor.interrupt();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        executor.execute(move || flag.store(true, Ordering::SeqCst));
        assert!(executor.await_completion_for(Duration::from_secs(5)));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
