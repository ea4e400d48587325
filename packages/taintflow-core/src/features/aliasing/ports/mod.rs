/*
 * Aliasing Ports
 *
 * A strategy is consulted whenever the forward analysis creates a new heap
 * taint. It either reports aliases directly into the caller's result set,
 * injects them into the forward solver, or (interactive strategies) answers
 * may-alias queries at the use sites instead.
 *
 * Architecture:
 * ```
 *   InfoflowProblem --compute_aliases--> Aliasing
 *                                          |
 *                    +---------------------+----------------------+
 *                    v                     v                      v
 *          FlowSensitive (backward   PtsBased (method-wide   Lazy (may_alias
 *          alias solver)             points-to scan)         at read sites)
 * ```
 */

use crate::features::abstraction::AbsRef;
use crate::features::access_path::ApRef;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, StmtId, Value};

pub trait AliasingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Finds aliases of `new_abs`, created at `src` for `target_value`
    #[allow(clippy::too_many_arguments)]
    fn compute_alias_taints(
        &self,
        d1: &AbsRef,
        src: StmtId,
        target_value: &Value,
        taint_set: &mut FactSet,
        method: MethodId,
        new_abs: &AbsRef,
        manager: &InfoflowManager,
    );

    /// Tells a context-sensitive alias search that `d3` entered `callee`
    /// from `call_site` where the caller held `d2` in context `d1`
    fn inject_calling_context(
        &self,
        _d3: &AbsRef,
        _callee: MethodId,
        _call_site: StmtId,
        _d2: &AbsRef,
        _d1: &AbsRef,
        _manager: &InfoflowManager,
    ) {
    }

    /// Aliases found by this strategy respect statement order
    fn is_flow_sensitive(&self) -> bool;

    /// Aliasing is answered by `may_alias` queries
    fn is_interactive(&self) -> bool {
        false
    }

    fn may_alias(&self, _ap1: &ApRef, _ap2: &ApRef, _manager: &InfoflowManager) -> bool {
        false
    }

    /// Aliases must also be computed for taints leaving a callee
    fn requires_analysis_on_return(&self) -> bool;

    /// Taints are propagated into callees whether or not they are read there
    fn is_lazy_analysis(&self) -> bool {
        false
    }
}
