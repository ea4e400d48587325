//! Facts observed at sinks during propagation
//!
//! One entry per (sink definition, fact, sink statement). A fact reaching the
//! same sink along another path is attached to the stored one as a neighbor,
//! so the source finder still sees every provenance chain.

use crate::features::abstraction::{AbsRef, Abstraction, AbstractionAtSink};
use crate::features::taint_analysis::infrastructure::manager::{is_system_class, InfoflowManager};
use crate::features::taint_analysis::ports::ResultsAvailableHandler;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

pub struct TaintPropagationResults {
    results: DashMap<AbstractionAtSink, AbsRef>,
    handlers: Vec<Arc<dyn ResultsAvailableHandler>>,
}

impl TaintPropagationResults {
    pub fn new(handlers: Vec<Arc<dyn ResultsAvailableHandler>>) -> Self {
        Self {
            results: DashMap::new(),
            handlers,
        }
    }

    /// Stores a sink observation; `false` means a handler asked to stop
    pub fn add_result(&self, manager: &InfoflowManager, at_sink: AbstractionAtSink) -> bool {
        let sink_stmt = at_sink.sink_stmt();
        if manager.config().ignore_flows_in_system_packages {
            let method = manager.program().method_of(sink_stmt);
            if is_system_class(method.class()) {
                return true;
            }
        }

        let incoming = at_sink.abstraction();
        let Some(abs) = Abstraction::derive_definitely_new(
            incoming,
            Some(Arc::clone(incoming.access_path())),
            Some(sink_stmt),
            incoming.is_implicit(),
        ) else {
            return true;
        };
        let abs = Abstraction::with_corresponding_call_site(Arc::new(abs), sink_stmt);
        let key = AbstractionAtSink::new(Arc::clone(at_sink.sink_definition()), Arc::clone(&abs), sink_stmt);

        match self.results.entry(key) {
            Entry::Occupied(stored) => {
                stored.get().add_neighbor(&abs, false);
            }
            Entry::Vacant(slot) => {
                debug!(sink = %sink_stmt, fact = %abs, "New result at sink");
                slot.insert(Arc::clone(&abs));
            }
        }

        let mut keep_going = true;
        for handler in &self.handlers {
            keep_going &= handler.on_result_available(sink_stmt, at_sink.sink_definition(), &abs);
        }
        keep_going
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Snapshot of the stored observations with their representative facts
    pub fn results(&self) -> Vec<(AbstractionAtSink, AbsRef)> {
        self.results
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::{SourceContext, SourceSinkDefinition};
    use crate::features::taint_analysis::infrastructure::icfg::ProgramIcfg;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::features::taint_analysis::ports::InterproceduralCfg;
    use crate::shared::ir::{MethodRef, ProgramBuilder, StmtId, Type, Value};
    use parking_lot::Mutex;

    struct StopAfter {
        seen: Mutex<usize>,
        limit: usize,
    }

    impl ResultsAvailableHandler for StopAfter {
        fn on_result_available(&self, _: StmtId, _: &SourceSinkDefinition, _: &AbsRef) -> bool {
            let mut seen = self.seen.lock();
            *seen += 1;
            *seen < self.limit
        }
    }

    fn fixture(
        class: &str,
        handlers: Vec<Arc<dyn ResultsAvailableHandler>>,
    ) -> (Arc<InfoflowManager>, StmtId, AbsRef) {
        let mut pb = ProgramBuilder::new();
        pb.class(class, None);
        let sig = MethodRef::new(class, "run", vec![], Type::Void);
        let mut mb = pb.method(&sig, true);
        let x = mb.local("x", Type::string());
        let stmt = mb.assign(Value::local(&x), Value::string("secret"));
        mb.ret_void();
        let m = mb.finish();
        pb.entry_point(m);
        let icfg: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(Arc::new(pb.build())));
        let mgr = InfoflowManager::builder(
            Arc::new(InfoflowConfig::default()),
            icfg,
            Arc::new(MethodSourceSinkManager::new()),
        )
        .result_handlers(handlers)
        .build();
        let ap = mgr.ap_factory().create(&Value::local(&x), true).unwrap();
        let ctx = SourceContext::new(Arc::new(SourceSinkDefinition::source("src")), ap, stmt, None);
        let fact = Arc::new(Abstraction::new_source(ctx, false, false));
        (mgr, stmt, fact)
    }

    #[test]
    fn test_duplicate_results_become_neighbors() {
        let (mgr, stmt, fact) = fixture("app.Main", vec![]);
        let sink = Arc::new(SourceSinkDefinition::sink("sink"));
        let results = TaintPropagationResults::new(vec![]);
        assert!(results.add_result(&mgr, AbstractionAtSink::new(Arc::clone(&sink), Arc::clone(&fact), stmt)));
        assert!(results.add_result(&mgr, AbstractionAtSink::new(sink, fact, stmt)));
        assert_eq!(results.len(), 1);
        let (_, stored) = &results.results()[0];
        assert_eq!(stored.neighbor_count(), 1);
        assert_eq!(stored.corresponding_call_site(), Some(stmt));
    }

    #[test]
    fn test_system_package_sinks_are_ignored() {
        let (mgr, stmt, fact) = fixture("java.util.Logger", vec![]);
        let results = TaintPropagationResults::new(vec![]);
        let sink = Arc::new(SourceSinkDefinition::sink("sink"));
        assert!(results.add_result(&mgr, AbstractionAtSink::new(sink, fact, stmt)));
        assert!(results.is_empty());
    }

    #[test]
    fn test_handler_can_stop_the_analysis() {
        let handler = Arc::new(StopAfter {
            seen: Mutex::new(0),
            limit: 1,
        });
        let (mgr, stmt, fact) = fixture(
            "app.Main",
            vec![handler.clone() as Arc<dyn ResultsAvailableHandler>],
        );
        let sink = Arc::new(SourceSinkDefinition::sink("sink"));
        assert!(!mgr.add_result(AbstractionAtSink::new(sink, fact, stmt)));
        assert!(mgr.is_aborted());
        assert_eq!(*handler.seen.lock(), 1);
    }
}
