/*
 * Taint Analysis Infrastructure
 *
 * Everything one data-flow run is assembled from.
 *
 * Architecture:
 * - manager.rs: shared state of a run (config, ICFG, collaborators, results)
 * - icfg.rs: in-memory interprocedural CFG over the IR and its reversal
 * - problems/: forward taint and backward alias flow functions
 * - rules/: statement-specific propagation rules of the forward problem
 * - propagation_results.rs: facts observed at sinks
 * - global_taints.rs: flow-insensitive static field taints
 * - source_finder.rs: pairs sink observations with their sources
 * - source_sink_manager.rs: signature-keyed source/sink oracle
 * - taint_wrapper.rs: signature-keyed library models
 * - native_handler.rs: effects of native calls
 * - points_to.rs: type-based points-to oracle
 * - type_utils.rs: cast and assignability checks on access paths
 */

pub mod global_taints;
pub mod icfg;
pub mod manager;
pub mod native_handler;
pub mod points_to;
pub mod problems;
pub mod propagation_results;
pub mod rules;
pub mod source_finder;
pub mod source_sink_manager;
pub mod taint_wrapper;
pub mod type_utils;

pub use global_taints::GlobalTaintManager;
pub use icfg::{BackwardsIcfg, ProgramIcfg};
pub use manager::{is_system_class, InfoflowManager, InfoflowManagerBuilder};
pub use native_handler::DefaultNativeCallHandler;
pub use points_to::TypeBasedPointsTo;
pub use problems::{AliasProblem, InfoflowProblem};
pub use propagation_results::TaintPropagationResults;
pub use rules::{KillFlags, PropagationRule, PropagationRuleManager};
pub use source_finder::{SourceFinder, SourceFinderReport, SourceSearch};
pub use source_sink_manager::{MethodSourceSinkManager, SourceTarget};
pub use taint_wrapper::{SimpleTaintWrapper, WrapperModel};
pub use type_utils::TypeUtils;
