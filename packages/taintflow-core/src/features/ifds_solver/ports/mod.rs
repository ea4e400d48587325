/*
 * IFDS Solver Ports
 *
 * - IfdsProblem       : flow functions over facts of type `AbsRef`, one per
 *                       ICFG edge kind
 * - TerminatableSolver: anything a watcher may stop
 * - MemoryEstimator   : memory figure the memory watcher compares against
 *                       the configured budget
 */

use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::domain::TerminationReason;
use crate::features::taint_analysis::ports::InterproceduralCfg;
use crate::shared::ir::{MethodId, StmtId};
use rustc_hash::FxHashSet;

/// Result of a flow function; empty kills the incoming fact
pub type FactSet = FxHashSet<AbsRef>;

/// IFDS problem definition
///
/// Flow functions may be invoked concurrently for different facts and must
/// not mutate published facts.
pub trait IfdsProblem: Send + Sync {
    /// Graph the solver walks; the alias problem returns a reversed view
    fn icfg(&self) -> &dyn InterproceduralCfg;

    fn zero_value(&self) -> &AbsRef;

    /// Statements and facts the solver starts from, each with the zero fact
    /// as source fact
    fn initial_seeds(&self) -> Vec<(StmtId, AbsRef)>;

    /// Facts leaving a method without a calling context flow into every caller
    fn follow_returns_past_seeds(&self) -> bool;

    /// Intra-procedural edge `curr -> succ`
    fn normal_flow(&self, d1: &AbsRef, d2: &AbsRef, curr: StmtId, succ: StmtId) -> FactSet;

    /// Edge from `call` into the start points of `callee`
    fn call_flow(&self, d1: &AbsRef, d2: &AbsRef, call: StmtId, callee: MethodId) -> FactSet;

    /// Edge from `exit` of `callee` back to `ret_site`.
    ///
    /// `call_site` and `ret_site` are `None` for a method without callers;
    /// the function is then only evaluated for its side effects.
    #[allow(clippy::too_many_arguments)]
    fn return_flow(
        &self,
        call_site: Option<StmtId>,
        callee: MethodId,
        exit: StmtId,
        ret_site: Option<StmtId>,
        d2: &AbsRef,
        callee_d1: &AbsRef,
        caller_d1s: &[AbsRef],
    ) -> FactSet;

    /// Edge bypassing the callees of `call`
    fn call_to_return_flow(
        &self,
        d1: &AbsRef,
        d2: &AbsRef,
        call: StmtId,
        ret_site: StmtId,
    ) -> FactSet;
}

pub trait TerminatableSolver: Send + Sync {
    /// Stops the solver; the first reason given wins
    fn force_terminate(&self, reason: TerminationReason);

    fn termination_reason(&self) -> Option<TerminationReason>;

    /// The solver has been started and not yet reached its fixed point
    fn is_running(&self) -> bool;
}

pub trait MemoryEstimator: Send + Sync {
    /// Estimated bytes held by the analysis
    fn used_bytes(&self) -> u64;
}
