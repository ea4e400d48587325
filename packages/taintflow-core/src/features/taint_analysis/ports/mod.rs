/*
 * Taint Analysis Ports
 *
 * Collaborator contracts consumed by the data-flow engine. Default
 * implementations live in `infrastructure/`; callers may plug in their own.
 *
 * Architecture:
 * ```
 *   Infoflow (application)
 *        |
 *        v
 *   InfoflowProblem / AliasProblem ----> InterproceduralCfg
 *        |                         \---> SourceSinkOracle
 *        |                          \--> TaintWrapper
 *        |                           \-> NativeCallHandler
 *        v
 *   TaintPropagationResults ----------> ResultsAvailableHandler
 * ```
 */

use crate::features::abstraction::{AbsRef, SourceSinkDefinition, UnitContainer};
use crate::features::access_path::ApRef;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{Field, Local, MethodId, Program, Stmt, StmtId, Value};
use rustc_hash::FxHashSet;
use std::sync::Arc;

// ============================================================================
// Control flow
// ============================================================================

/// Interprocedural control-flow graph over statements
///
/// The same contract serves the forward view and its reversed counterpart;
/// in the reversed view successors and predecessors swap, as do start and
/// exit points.
pub trait InterproceduralCfg: Send + Sync {
    fn program(&self) -> &Program;

    fn stmt(&self, id: StmtId) -> &Stmt {
        self.program().stmt(id)
    }

    fn method_of(&self, stmt: StmtId) -> MethodId {
        self.program().stmt(stmt).method
    }

    fn succs_of(&self, stmt: StmtId) -> &[StmtId];

    fn preds_of(&self, stmt: StmtId) -> &[StmtId];

    fn callees_of_call_at(&self, call: StmtId) -> &[MethodId];

    fn callers_of(&self, method: MethodId) -> &[StmtId];

    fn start_points_of(&self, method: MethodId) -> &[StmtId];

    fn end_points_of(&self, method: MethodId) -> &[StmtId];

    fn return_sites_of_call_at(&self, call: StmtId) -> &[StmtId];

    /// All call statements inside `method`
    fn calls_from_within(&self, method: MethodId) -> &[StmtId];

    fn is_call_stmt(&self, stmt: StmtId) -> bool;

    fn is_exit_stmt(&self, stmt: StmtId) -> bool;

    fn is_start_point(&self, stmt: StmtId) -> bool;

    /// Statement directly following a call
    fn is_return_site(&self, stmt: StmtId) -> bool;

    /// `Method.invoke`-style call whose arguments arrive as an array
    fn is_reflective_call_site(&self, call: StmtId) -> bool;

    fn method_reads_value(&self, method: MethodId, local: &Local) -> bool;

    fn method_writes_value(&self, method: MethodId, local: &Local) -> bool;

    /// `method` or anything it transitively calls reads `field`
    fn is_static_field_read(&self, method: MethodId, field: &Field) -> bool;

    /// `method` or anything it transitively calls writes `field`
    fn is_static_field_used(&self, method: MethodId, field: &Field) -> bool;

    /// Immediate postdominator, or the exit of the enclosing method
    fn postdominator_of(&self, stmt: StmtId) -> UnitContainer;

    fn is_exceptional_edge_between(&self, src: StmtId, dest: StmtId) -> bool;

    /// Methods reachable from the program's entry points
    fn reachable_methods(&self) -> &[MethodId];
}

// ============================================================================
// Sources and sinks
// ============================================================================

/// What a source statement taints
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub definition: Arc<SourceSinkDefinition>,
    pub access_paths: Vec<ApRef>,
    pub user_data: Option<Arc<str>>,
}

impl SourceInfo {
    pub fn new(definition: Arc<SourceSinkDefinition>, access_paths: Vec<ApRef>) -> Self {
        Self {
            definition,
            access_paths,
            user_data: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SinkInfo {
    pub definition: Arc<SourceSinkDefinition>,
}

pub trait SourceSinkOracle: Send + Sync {
    /// Called once before propagation starts
    fn initialize(&self, _manager: &InfoflowManager) {}

    fn source_info(&self, stmt: &Stmt, manager: &InfoflowManager) -> Option<SourceInfo>;

    /// With `ap == None` only asks whether `stmt` is a sink at all
    fn sink_info(
        &self,
        stmt: &Stmt,
        manager: &InfoflowManager,
        ap: Option<&ApRef>,
    ) -> Option<SinkInfo>;
}

// ============================================================================
// Library models
// ============================================================================

/// Models the effect of calls whose bodies are not analysed
pub trait TaintWrapper: Send + Sync {
    fn initialize(&self, _manager: &InfoflowManager) {}

    /// Taints after the call for the incoming `taint`, `None` if the call is
    /// not modelled
    fn taints_for_method(
        &self,
        stmt: &Stmt,
        d1: &AbsRef,
        taint: &AbsRef,
        manager: &InfoflowManager,
    ) -> Option<FxHashSet<AbsRef>>;

    /// The wrapper alone decides what the call does to `taint`
    fn is_exclusive(&self, stmt: &Stmt, taint: &AbsRef, manager: &InfoflowManager) -> bool;

    /// Aliases a backward search must continue with, `None` if unmodelled
    fn aliases_for_method(
        &self,
        stmt: &Stmt,
        d1: &AbsRef,
        taint: &AbsRef,
        manager: &InfoflowManager,
    ) -> Option<FxHashSet<AbsRef>>;

    /// Whether the wrapper models `stmt` at all
    fn supports_callee(&self, stmt: &Stmt) -> bool;
}

pub trait NativeCallHandler: Send + Sync {
    fn initialize(&self, _manager: &InfoflowManager) {}

    /// Taints produced by a native call for an incoming taint on one of its arguments
    fn tainted_values(
        &self,
        call: &Stmt,
        source: &AbsRef,
        args: &[Value],
        manager: &InfoflowManager,
    ) -> Option<FxHashSet<AbsRef>>;

    fn supports_call(&self, call: &Stmt) -> bool;
}

// ============================================================================
// Observers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowFunctionType {
    Normal,
    Call,
    Return,
    CallToReturn,
}

/// Observes every flow function evaluation
pub trait TaintPropagationHandler: Send + Sync {
    fn notify_flow_in(
        &self,
        stmt: StmtId,
        taint: &AbsRef,
        manager: &InfoflowManager,
        kind: FlowFunctionType,
    );

    /// May replace the outgoing set; returning it unchanged is the default
    fn notify_flow_out(
        &self,
        _stmt: StmtId,
        _d1: Option<&AbsRef>,
        _incoming: &AbsRef,
        outgoing: FxHashSet<AbsRef>,
        _manager: &InfoflowManager,
        _kind: FlowFunctionType,
    ) -> FxHashSet<AbsRef> {
        outgoing
    }
}

/// Called whenever a new result is recorded; `false` stops the analysis
pub trait ResultsAvailableHandler: Send + Sync {
    fn on_result_available(
        &self,
        sink_stmt: StmtId,
        sink_definition: &SourceSinkDefinition,
        abstraction: &AbsRef,
    ) -> bool;
}

// ============================================================================
// Points-to
// ============================================================================

/// A location whose points-to set can be queried
#[derive(Debug, Clone, Copy)]
pub enum PtsTarget<'a> {
    Local(&'a Local),
    InstanceField(&'a Local, &'a Field),
    StaticField(&'a Field),
}

impl<'a> PtsTarget<'a> {
    /// Points-to target of the root of an access path
    pub fn of_access_path(ap: &'a ApRef) -> Option<Self> {
        match (ap.plain_value(), ap.first_field()) {
            (Some(base), Some(field)) => Some(PtsTarget::InstanceField(base, field)),
            (Some(base), None) => Some(PtsTarget::Local(base)),
            (None, Some(field)) => Some(PtsTarget::StaticField(field)),
            (None, None) => None,
        }
    }

    pub fn of_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::Local(l) => Some(PtsTarget::Local(l)),
            Value::InstanceField { base, field } => Some(PtsTarget::InstanceField(base, field)),
            Value::StaticField(field) => Some(PtsTarget::StaticField(field)),
            Value::ArrayRef { base, .. } => Some(PtsTarget::Local(base)),
            _ => None,
        }
    }
}

/// Whole-program points-to information
pub trait PointsToOracle: Send + Sync {
    /// The points-to sets of `a` and `b` intersect
    fn may_alias(&self, a: PtsTarget<'_>, b: PtsTarget<'_>) -> bool;
}
