//! Flow-insensitive static field taints
//!
//! With context- and flow-insensitive static tracking a tainted static field
//! is tainted everywhere. Each new global taint is re-injected into both
//! solvers at every reachable statement that reads the field.

use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::PathEdge;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{StmtId, Value};
use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct GlobalTaintManager {
    taints: DashSet<AbsRef>,
}

impl GlobalTaintManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `abs`; returns false if it was already known
    pub fn add(&self, manager: &InfoflowManager, abs: AbsRef) -> bool {
        if !self.taints.insert(Arc::clone(&abs)) {
            return false;
        }
        let Some(field) = abs.access_path().first_field().cloned() else {
            return true;
        };

        let readers = Self::statements_reading(manager, |v| matches!(v, Value::StaticField(f) if *f == field));
        debug!(field = %field, readers = readers.len(), "New global static field taint");

        let zero = manager.zero_value();
        let solvers = [manager.forward_solver(), manager.alias_solver()];
        for stmt in readers {
            for solver in solvers.iter().flatten() {
                solver.process_edge(PathEdge::new(Arc::clone(zero), stmt, Arc::clone(&abs)));
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.taints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taints.is_empty()
    }

    pub fn taints(&self) -> Vec<AbsRef> {
        self.taints.iter().map(|t| Arc::clone(t.key())).collect()
    }

    fn statements_reading(manager: &InfoflowManager, matches: impl Fn(&Value) -> bool) -> Vec<StmtId> {
        let icfg = manager.icfg();
        let program = manager.program();
        icfg.reachable_methods()
            .iter()
            .map(|&m| program.method(m))
            .filter(|m| m.is_concrete())
            .flat_map(|m| m.body.iter().copied())
            .filter(|&s| program.stmt(s).uses().iter().any(&matches))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::{Abstraction, SourceContext, SourceSinkDefinition};
    use crate::features::taint_analysis::infrastructure::icfg::ProgramIcfg;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::features::taint_analysis::ports::InterproceduralCfg;
    use crate::shared::ir::{Field, MethodRef, ProgramBuilder, Type};

    #[test]
    fn test_global_taint_is_registered_once() {
        let field = Field::static_field("app.Config", "secret", Type::string());
        let mut pb = ProgramBuilder::new();
        pb.class("app.Config", None);
        let sig = MethodRef::new("app.Config", "read", vec![], Type::Void);
        let mut mb = pb.method(&sig, true);
        let x = mb.local("x", Type::string());
        let read = mb.assign(Value::local(&x), Value::StaticField(field.clone()));
        mb.ret_void();
        let m = mb.finish();
        pb.entry_point(m);
        let icfg: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(Arc::new(pb.build())));
        let mgr = InfoflowManager::builder(
            Arc::new(InfoflowConfig::default()),
            icfg,
            Arc::new(MethodSourceSinkManager::new()),
        )
        .build();

        let ap = mgr.ap_factory().create(&Value::StaticField(field), true).unwrap();
        let ctx = SourceContext::new(Arc::new(SourceSinkDefinition::source("src")), ap, read, None);
        let abs = Arc::new(Abstraction::new_source(ctx, false, false));

        let readers = GlobalTaintManager::statements_reading(&mgr, |v| matches!(v, Value::StaticField(_)));
        assert_eq!(readers, vec![read]);

        let globals = GlobalTaintManager::new();
        assert!(globals.add(&mgr, Arc::clone(&abs)));
        assert!(!globals.add(&mgr, abs));
        assert_eq!(globals.len(), 1);
    }
}
