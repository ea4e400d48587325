//! Caller-side cancellation
//!
//! An [`AbortHandle`] is shared between the driver and whoever wants to stop
//! the run. Every solver of the current phase is registered with it; a solver
//! registered after the abort is terminated on registration, so a cancel
//! racing the start of a phase is never lost.

use crate::features::ifds_solver::domain::TerminationReason;
use crate::features::ifds_solver::ports::TerminatableSolver;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
struct AbortState {
    aborted: AtomicBool,
    solvers: Mutex<Vec<Arc<dyn TerminatableSolver>>>,
}

#[derive(Clone, Default)]
pub struct AbortHandle {
    state: Arc<AbortState>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminates every registered solver with [`TerminationReason::Cancelled`].
    /// Repeated calls are no-ops.
    pub fn abort(&self) {
        if self.state.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Analysis cancelled by the caller");
        for solver in self.state.solvers.lock().iter() {
            solver.force_terminate(TerminationReason::Cancelled);
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    /// Registers `solver` for the current phase
    pub fn register(&self, solver: Arc<dyn TerminatableSolver>) {
        let mut solvers = self.state.solvers.lock();
        // Checked under the lock: `abort` sets the flag before walking the list
        if self.is_aborted() {
            solver.force_terminate(TerminationReason::Cancelled);
        }
        solvers.push(solver);
    }

    /// Forgets the solvers of a finished phase
    pub fn clear(&self) {
        self.state.solvers.lock().clear();
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .field("solvers", &self.state.solvers.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_abort_reaches_registered_solvers() {
        let handle = AbortHandle::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        handle.register(a.clone());
        handle.clone().register(b.clone());
        assert_eq!(a.termination_reason(), None);

        handle.abort();
        assert!(handle.is_aborted());
        assert_eq!(a.termination_reason(), Some(TerminationReason::Cancelled));
        assert_eq!(b.termination_reason(), Some(TerminationReason::Cancelled));
    }

    #[test]
    fn test_solver_registered_after_abort_is_stopped() {
        let handle = AbortHandle::new();
        handle.abort();
        let late = Arc::new(Recorder::default());
        handle.register(late.clone());
        assert_eq!(late.termination_reason(), Some(TerminationReason::Cancelled));
    }

    #[test]
    fn test_cleared_solvers_are_left_alone() {
        let handle = AbortHandle::new();
        let done = Arc::new(Recorder::default());
        handle.register(done.clone());
        handle.clear();
        handle.abort();
        assert_eq!(done.termination_reason(), None);
    }

    #[test]
    fn test_first_reason_wins_over_cancel() {
        let handle = AbortHandle::new();
        let solver = Arc::new(Recorder::default());
        solver.force_terminate(TerminationReason::Timeout);
        handle.register(solver.clone());
        handle.abort();
        assert_eq!(solver.termination_reason(), Some(TerminationReason::Timeout));
    }
}
