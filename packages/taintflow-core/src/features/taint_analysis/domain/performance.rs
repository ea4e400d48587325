//! Run statistics

use serde::Serialize;
use std::time::Duration;

/// Counters and timings of one analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceData {
    /// Edges scheduled by the forward solver
    pub forward_propagation_count: u64,
    /// Edges scheduled by the alias solver
    pub alias_propagation_count: u64,
    pub seed_count: usize,
    pub source_count: usize,
    pub sink_count: usize,
    pub data_flow_time: Duration,
    pub path_reconstruction_time: Duration,
    pub total_time: Duration,
    /// Largest memory estimate observed at the end of a data-flow phase
    pub max_memory_estimate_bytes: u64,
}

impl PerformanceData {
    pub fn edge_propagation_count(&self) -> u64 {
        self.forward_propagation_count + self.alias_propagation_count
    }

    pub fn update_max_memory(&mut self, bytes: u64) {
        self.max_memory_estimate_bytes = self.max_memory_estimate_bytes.max(bytes);
    }

    /// Accumulates the statistics of another data-flow run over the same program
    pub fn add(&mut self, other: &PerformanceData) {
        self.forward_propagation_count += other.forward_propagation_count;
        self.alias_propagation_count += other.alias_propagation_count;
        self.seed_count += other.seed_count;
        self.source_count = self.source_count.max(other.source_count);
        self.sink_count = self.sink_count.max(other.sink_count);
        self.data_flow_time += other.data_flow_time;
        self.path_reconstruction_time += other.path_reconstruction_time;
        self.total_time += other.total_time;
        self.update_max_memory(other.max_memory_estimate_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sums_counts_and_keeps_peaks() {
        let mut a = PerformanceData {
            forward_propagation_count: 10,
            alias_propagation_count: 2,
            seed_count: 1,
            source_count: 3,
            data_flow_time: Duration::from_millis(5),
            max_memory_estimate_bytes: 100,
            ..Default::default()
        };
        let b = PerformanceData {
            forward_propagation_count: 7,
            seed_count: 1,
            source_count: 3,
            data_flow_time: Duration::from_millis(3),
            max_memory_estimate_bytes: 400,
            ..Default::default()
        };
        a.add(&b);
        assert_eq!(a.edge_propagation_count(), 19);
        assert_eq!(a.seed_count, 2);
        assert_eq!(a.source_count, 3);
        assert_eq!(a.data_flow_time, Duration::from_millis(8));
        assert_eq!(a.max_memory_estimate_bytes, 400);
    }
}
