/*
 * Taint Propagation Rules
 *
 * Statement-specific parts of the forward flow functions. Every rule sees
 * each flow function evaluation, may contribute facts, and may ask the
 * chain to drop the incoming fact (`kill_source`) or everything it
 * produced (`kill_all`).
 *
 * Architecture:
 * - source.rs: zero fact -> new taint at source statements
 * - sink.rs: records facts reaching sink statements
 * - static_field.rs: static field taints across calls
 * - array.rs: array contents, lengths and tainted indices
 * - exception.rs: throw / catch of tainted exception objects
 * - wrapper.rs: library models instead of callee bodies
 * - implicit.rs: control dependencies (postdominator stack)
 * - strong_update.rs: kills on overwritten locals and fields
 * - typing.rs: kills on infeasible casts
 * - skip_system_class.rs: well-known runtime methods are stepped over
 * - stop_after_k.rs: result limit
 * - rule_manager.rs: ordered chain, result union and kill handling
 */

mod array;
mod exception;
mod implicit;
mod rule_manager;
mod sink;
mod skip_system_class;
mod source;
mod static_field;
mod stop_after_k;
mod strong_update;
mod typing;
mod wrapper;

pub use array::ArrayPropagationRule;
pub use exception::ExceptionPropagationRule;
pub use implicit::ImplicitPropagationRule;
pub use rule_manager::PropagationRuleManager;
pub use sink::SinkPropagationRule;
pub use skip_system_class::SkipSystemClassRule;
pub use source::SourcePropagationRule;
pub use static_field::StaticPropagationRule;
pub use stop_after_k::StopAfterFirstKFlowsRule;
pub use strong_update::StrongUpdatePropagationRule;
pub use typing::TypingPropagationRule;
pub use wrapper::WrapperPropagationRule;

use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::FactSet;
use crate::shared::ir::{MethodId, Stmt, Value};

/// Kill requests raised by a rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KillFlags {
    /// Do not pass the incoming fact on unchanged
    pub kill_source: bool,
    /// Drop every fact of this flow function evaluation
    pub kill_all: bool,
}

/// One link of the rule chain; every hook defaults to "no opinion"
pub trait PropagationRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Intra-procedural edge `stmt -> dest`
    fn propagate_normal_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        _dest: &Stmt,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        None
    }

    /// Edge from `stmt` into `dest`; only `kill_all` is honoured
    fn propagate_call_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        _dest: MethodId,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        None
    }

    fn propagate_call_to_return_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        None
    }

    /// Edge from `exit` back into the caller
    #[allow(clippy::too_many_arguments)]
    fn propagate_return_flow(
        &self,
        _caller_d1s: &[AbsRef],
        _callee_d1: &AbsRef,
        _source: &AbsRef,
        _exit: &Stmt,
        _ret_site: Option<&Stmt>,
        _call_site: Option<&Stmt>,
        _kill: &mut KillFlags,
    ) -> Option<FactSet> {
        None
    }
}

/// Set holding exactly `abs`
pub(crate) fn singleton(abs: AbsRef) -> FactSet {
    let mut set = FactSet::default();
    set.insert(abs);
    set
}

/// Value a backward alias search for `abs` starts from
pub(crate) fn alias_target(abs: &AbsRef) -> Option<Value> {
    let ap = abs.access_path();
    match ap.plain_value() {
        Some(plain) => Some(Value::local(plain)),
        None if ap.is_static_field_ref() => ap.first_field().cloned().map(Value::StaticField),
        None => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Small programs and managers shared by the rule tests

    use crate::config::InfoflowConfig;
    use crate::features::abstraction::{AbsRef, Abstraction, SourceContext, SourceSinkDefinition};
    use crate::features::taint_analysis::infrastructure::icfg::ProgramIcfg;
    use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::features::taint_analysis::ports::InterproceduralCfg;
    use crate::shared::ir::{Program, StmtId, Value};
    use rustc_hash::FxHashSet;
    use std::sync::Arc;

    pub fn manager_for(
        program: Program,
        config: InfoflowConfig,
        oracle: MethodSourceSinkManager,
        sources: &[StmtId],
        sinks: &[StmtId],
    ) -> Arc<InfoflowManager> {
        let icfg: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(Arc::new(program)));
        InfoflowManager::builder(Arc::new(config), icfg, Arc::new(oracle))
            .source_stmts(sources.iter().copied().collect::<FxHashSet<_>>())
            .sink_stmts(sinks.iter().copied().collect::<FxHashSet<_>>())
            .build()
    }

    /// Active taint on `val` created at `stmt`
    pub fn taint(manager: &InfoflowManager, val: &Value, stmt: StmtId) -> AbsRef {
        let ap = manager
            .ap_factory()
            .create(val, true)
            .expect("taintable value");
        let ctx = SourceContext::new(Arc::new(SourceSinkDefinition::source("src")), ap, stmt, None);
        Arc::new(Abstraction::new_source(ctx, false, false))
    }
}
