//! Stops propagating once enough flows were found

use super::{KillFlags, PropagationRule};
use crate::features::abstraction::AbsRef;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, Stmt};
use std::sync::Arc;

pub struct StopAfterFirstKFlowsRule {
    manager: Arc<InfoflowManager>,
    k: usize,
}

impl StopAfterFirstKFlowsRule {
    pub fn new(manager: Arc<InfoflowManager>, k: usize) -> Self {
        Self { manager, k }
    }

    fn check(&self, kill: &mut KillFlags) -> Option<FactSet> {
        if self.manager.results().len() >= self.k {
            kill.kill_all = true;
        }
        None
    }
}

impl PropagationRule for StopAfterFirstKFlowsRule {
    fn name(&self) -> &'static str {
        "stop_after_first_k_flows"
    }

    fn propagate_normal_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        _dest: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        self.check(kill)
    }

    fn propagate_call_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        _dest: MethodId,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        self.check(kill)
    }

    fn propagate_call_to_return_flow(
        &self,
        _d1: &AbsRef,
        _source: &AbsRef,
        _stmt: &Stmt,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        self.check(kill)
    }

    fn propagate_return_flow(
        &self,
        _caller_d1s: &[AbsRef],
        _callee_d1: &AbsRef,
        _source: &AbsRef,
        _exit: &Stmt,
        _ret_site: Option<&Stmt>,
        _call_site: Option<&Stmt>,
        kill: &mut KillFlags,
    ) -> Option<FactSet> {
        self.check(kill)
    }
}
