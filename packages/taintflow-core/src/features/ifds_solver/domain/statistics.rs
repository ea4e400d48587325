//! Solver counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of one solver, updated concurrently by its tasks
#[derive(Debug, Default)]
pub struct SolverCounters {
    propagation_count: AtomicU64,
    processed_edges: AtomicU64,
    neighbors_added: AtomicU64,
    summary_reuses: AtomicU64,
}

impl SolverCounters {
    pub fn record_scheduled(&self) {
        self.propagation_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed_edges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_neighbor(&self) {
        self.neighbors_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_summary_reuse(&self) {
        self.summary_reuses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SolverStatistics {
        SolverStatistics {
            propagation_count: self.propagation_count.load(Ordering::Relaxed),
            processed_edges: self.processed_edges.load(Ordering::Relaxed),
            neighbors_added: self.neighbors_added.load(Ordering::Relaxed),
            summary_reuses: self.summary_reuses.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}

/// Solver statistics at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverStatistics {
    /// Edges scheduled for processing
    pub propagation_count: u64,

    /// Edges whose flow functions were evaluated
    pub processed_edges: u64,

    /// Facts merged into an existing join point instead of being reprocessed
    pub neighbors_added: u64,

    /// Callee summaries applied at a call site without re-analysing the callee
    pub summary_reuses: u64,

    /// Entries of the jump-function table
    pub jump_functions: u64,

    /// Entries of the end-summary table
    pub end_summaries: u64,
}
