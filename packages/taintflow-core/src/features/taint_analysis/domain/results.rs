//! Results of an analysis run
//!
//! A run always produces an `InfoflowResults`, also when it stopped early or a
//! solver task panicked. Callers tell the outcomes apart through
//! `termination_state()` and `exceptions()`.

use super::performance::PerformanceData;
use crate::features::abstraction::{AbstractionAtSink, SourceContext, SourceSinkDefinition};
use crate::features::access_path::ApRef;
use crate::features::ifds_solver::TerminationState;
use crate::shared::ir::StmtId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

/// Where a flow ends
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultSinkInfo {
    definition: Arc<SourceSinkDefinition>,
    stmt: StmtId,
    access_path: ApRef,
}

impl ResultSinkInfo {
    pub fn new(definition: Arc<SourceSinkDefinition>, stmt: StmtId, access_path: ApRef) -> Self {
        Self {
            definition,
            stmt,
            access_path,
        }
    }

    pub fn from_abstraction_at_sink(at_sink: &AbstractionAtSink) -> Self {
        Self::new(
            Arc::clone(at_sink.sink_definition()),
            at_sink.sink_stmt(),
            Arc::clone(at_sink.abstraction().access_path()),
        )
    }

    pub fn definition(&self) -> &Arc<SourceSinkDefinition> {
        &self.definition
    }

    pub fn stmt(&self) -> StmtId {
        self.stmt
    }

    pub fn access_path(&self) -> &ApRef {
        &self.access_path
    }
}

impl fmt::Display for ResultSinkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} ({})", self.access_path, self.stmt, self.definition)
    }
}

/// Where a flow starts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultSourceInfo {
    definition: Arc<SourceSinkDefinition>,
    stmt: StmtId,
    access_path: ApRef,
    user_data: Option<Arc<str>>,
}

impl ResultSourceInfo {
    pub fn definition(&self) -> &Arc<SourceSinkDefinition> {
        &self.definition
    }

    pub fn stmt(&self) -> StmtId {
        self.stmt
    }

    pub fn access_path(&self) -> &ApRef {
        &self.access_path
    }

    pub fn user_data(&self) -> Option<&str> {
        self.user_data.as_deref()
    }
}

impl From<&SourceContext> for ResultSourceInfo {
    fn from(ctx: &SourceContext) -> Self {
        Self {
            definition: Arc::clone(ctx.definition()),
            stmt: ctx.stmt(),
            access_path: Arc::clone(ctx.access_path()),
            user_data: ctx.user_data().map(Arc::from),
        }
    }
}

impl fmt::Display for ResultSourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} ({})", self.access_path, self.stmt, self.definition)
    }
}

/// One source-to-sink connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataFlowResult {
    pub source: ResultSourceInfo,
    pub sink: ResultSinkInfo,
}

#[derive(Debug, Clone, Default)]
pub struct InfoflowResults {
    results: FxHashMap<ResultSinkInfo, FxHashSet<ResultSourceInfo>>,
    abstractions_at_sink: Vec<AbstractionAtSink>,
    termination_state: TerminationState,
    exceptions: Vec<String>,
    performance: PerformanceData,
}

impl InfoflowResults {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Flows
    // ========================================================================

    pub fn add_result(&mut self, sink: ResultSinkInfo, source: ResultSourceInfo) {
        self.results.entry(sink).or_default().insert(source);
    }

    /// Keeps the raw sink observation whose provenance DAG carries the path
    pub fn add_abstraction_at_sink(&mut self, at_sink: AbstractionAtSink) {
        self.abstractions_at_sink.push(at_sink);
    }

    /// Number of distinct sinks reached
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of source-sink pairs
    pub fn num_connections(&self) -> usize {
        self.results.values().map(FxHashSet::len).sum()
    }

    pub fn results(&self) -> &FxHashMap<ResultSinkInfo, FxHashSet<ResultSourceInfo>> {
        &self.results
    }

    /// All connections ordered by sink statement, then source statement
    pub fn result_set(&self) -> Vec<DataFlowResult> {
        let mut flat: Vec<DataFlowResult> = self
            .results
            .iter()
            .flat_map(|(sink, sources)| {
                sources.iter().map(move |source| DataFlowResult {
                    source: source.clone(),
                    sink: sink.clone(),
                })
            })
            .collect();
        flat.sort_by(|a, b| {
            (a.sink.stmt, a.source.stmt)
                .cmp(&(b.sink.stmt, b.source.stmt))
                .then_with(|| a.sink.access_path.to_string().cmp(&b.sink.access_path.to_string()))
                .then_with(|| {
                    a.source
                        .access_path
                        .to_string()
                        .cmp(&b.source.access_path.to_string())
                })
        });
        flat
    }

    pub fn abstractions_at_sink(&self) -> &[AbstractionAtSink] {
        &self.abstractions_at_sink
    }

    pub fn sources_of(&self, sink_stmt: StmtId) -> Vec<&ResultSourceInfo> {
        self.results
            .iter()
            .filter(|(sink, _)| sink.stmt == sink_stmt)
            .flat_map(|(_, sources)| sources.iter())
            .collect()
    }

    pub fn contains_sink(&self, stmt: StmtId) -> bool {
        self.results.keys().any(|sink| sink.stmt == stmt)
    }

    pub fn contains_sink_method(&self, sink_id: &str) -> bool {
        self.results.keys().any(|sink| sink.definition.id() == sink_id)
    }

    pub fn is_path_between(&self, sink_stmt: StmtId, source_stmt: StmtId) -> bool {
        self.results.iter().any(|(sink, sources)| {
            sink.stmt == sink_stmt && sources.iter().any(|src| src.stmt == source_stmt)
        })
    }

    /// Path between definitions matched by their ids (method signatures for
    /// the default oracle)
    pub fn is_path_between_methods(&self, sink_id: &str, source_id: &str) -> bool {
        self.results.iter().any(|(sink, sources)| {
            sink.definition.id() == sink_id
                && sources.iter().any(|src| src.definition.id() == source_id)
        })
    }

    /// Folds the results of another run into this one
    pub fn merge(&mut self, other: InfoflowResults) {
        for (sink, sources) in other.results {
            self.results.entry(sink).or_default().extend(sources);
        }
        self.abstractions_at_sink.extend(other.abstractions_at_sink);
        self.termination_state |= other.termination_state;
        self.exceptions.extend(other.exceptions);
        self.performance.add(&other.performance);
    }

    // ========================================================================
    // Run outcome
    // ========================================================================

    pub fn termination_state(&self) -> TerminationState {
        self.termination_state
    }

    pub fn add_termination_state(&mut self, state: TerminationState) {
        self.termination_state |= state;
    }

    pub fn was_aborted_timeout(&self) -> bool {
        self.termination_state.contains(TerminationState::DATA_FLOW_TIMEOUT)
            || self.termination_state.contains(TerminationState::PATH_RECON_TIMEOUT)
    }

    pub fn was_terminated_out_of_memory(&self) -> bool {
        self.termination_state.contains(TerminationState::DATA_FLOW_OOM)
            || self.termination_state.contains(TerminationState::PATH_RECON_OOM)
    }

    pub fn was_cancelled(&self) -> bool {
        self.termination_state.contains(TerminationState::DATA_FLOW_CANCELLED)
            || self.termination_state.contains(TerminationState::PATH_RECON_CANCELLED)
    }

    /// Messages of solver tasks that panicked
    pub fn exceptions(&self) -> &[String] {
        &self.exceptions
    }

    pub fn add_exception(&mut self, message: impl Into<String>) {
        self.exceptions.push(message.into());
    }

    /// Ran to completion without a fault
    pub fn is_complete(&self) -> bool {
        self.termination_state.is_success() && self.exceptions.is_empty()
    }

    pub fn performance_data(&self) -> &PerformanceData {
        &self.performance
    }

    pub fn performance_data_mut(&mut self) -> &mut PerformanceData {
        &mut self.performance
    }
}

impl fmt::Display for InfoflowResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "No results found ({})", self.termination_state)?;
        }
        let flows = self.result_set();
        let mut current: Option<&ResultSinkInfo> = None;
        for flow in &flows {
            if current != Some(&flow.sink) {
                writeln!(f, "Found a flow to sink {}, from the following sources:", flow.sink)?;
                current = Some(&flow.sink);
            }
            writeln!(f, "\t- {}", flow.source)?;
        }
        for ex in &self.exceptions {
            writeln!(f, "Fault: {}", ex)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::access_path::AccessPathFactory;
    use crate::shared::ir::{ClassHierarchy, Local, LocalId, Type, Value};
    use pretty_assertions::assert_eq;

    fn ap(name: &str) -> ApRef {
        let factory =
            AccessPathFactory::new(&InfoflowConfig::default(), Arc::new(ClassHierarchy::default()));
        let local = Local::new(LocalId(0), name, Type::string());
        factory.create(&Value::local(&local), true).unwrap()
    }

    fn sink(stmt: u32, id: &str) -> ResultSinkInfo {
        ResultSinkInfo::new(Arc::new(SourceSinkDefinition::sink(id)), StmtId(stmt), ap("y"))
    }

    fn source(stmt: u32, id: &str) -> ResultSourceInfo {
        let ctx = SourceContext::new(
            Arc::new(SourceSinkDefinition::source(id)),
            ap("x"),
            StmtId(stmt),
            Some(Arc::from("tag")),
        );
        ResultSourceInfo::from(&ctx)
    }

    #[test]
    fn test_queries() {
        let mut results = InfoflowResults::new();
        results.add_result(sink(10, "leak"), source(1, "secret"));
        results.add_result(sink(10, "leak"), source(2, "secret"));
        results.add_result(sink(20, "log"), source(1, "secret"));

        assert_eq!(results.len(), 2);
        assert_eq!(results.num_connections(), 3);
        assert!(results.contains_sink(StmtId(10)));
        assert!(!results.contains_sink(StmtId(11)));
        assert!(results.contains_sink_method("log"));
        assert!(results.is_path_between(StmtId(20), StmtId(1)));
        assert!(!results.is_path_between(StmtId(20), StmtId(2)));
        assert!(results.is_path_between_methods("leak", "secret"));
        assert_eq!(results.sources_of(StmtId(10)).len(), 2);
        assert_eq!(source(1, "secret").user_data(), Some("tag"));

        let order: Vec<(u32, u32)> = results
            .result_set()
            .iter()
            .map(|r| (r.sink.stmt().0, r.source.stmt().0))
            .collect();
        assert_eq!(order, vec![(10, 1), (10, 2), (20, 1)]);
    }

    #[test]
    fn test_merge_combines_flows_and_flags() {
        let mut a = InfoflowResults::new();
        a.add_result(sink(10, "leak"), source(1, "secret"));
        let mut b = InfoflowResults::new();
        b.add_result(sink(10, "leak"), source(2, "secret"));
        b.add_termination_state(TerminationState::DATA_FLOW_TIMEOUT);
        b.add_exception("boom");

        a.merge(b);
        assert_eq!(a.num_connections(), 2);
        assert!(a.was_aborted_timeout());
        assert!(!a.was_terminated_out_of_memory());
        assert_eq!(a.exceptions(), &["boom".to_string()]);
        assert!(!a.is_complete());
    }

    #[test]
    fn test_display_lists_flows() {
        let mut results = InfoflowResults::new();
        assert!(results.to_string().starts_with("No results found (success)"));
        results.add_result(sink(10, "leak"), source(1, "secret"));
        let text = results.to_string();
        assert!(text.contains("Found a flow to sink"));
        assert!(text.contains("secret"));
    }
}
