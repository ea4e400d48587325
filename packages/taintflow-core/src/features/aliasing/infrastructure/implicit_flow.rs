//! Method-wide alias approximation for facts inside conditional calls
//!
//! Every heap assignment of a method relates its two sides in both
//! directions. The table is computed once per method and cached.

use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::access_path::ApRef;
use crate::features::aliasing::ports::AliasingStrategy;
use crate::features::ifds_solver::FactSet;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::shared::ir::{MethodId, StmtId, StmtKind, Value};
use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

type AliasTable = FxHashMap<ApRef, FxHashSet<ApRef>>;

#[derive(Debug, Default)]
pub struct ImplicitFlowAliasStrategy {
    tables: DashMap<MethodId, Arc<AliasTable>>,
}

impl ImplicitFlowAliasStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_for(&self, method: MethodId, manager: &InfoflowManager) -> Arc<AliasTable> {
        if let Some(table) = self.tables.get(&method) {
            return Arc::clone(table.value());
        }
        let table = Arc::new(Self::compute_table(method, manager));
        Arc::clone(self.tables.entry(method).or_insert(table).value())
    }

    fn compute_table(method: MethodId, manager: &InfoflowManager) -> AliasTable {
        let factory = manager.ap_factory();
        let mut table = AliasTable::default();
        for &sid in &manager.method(method).body {
            let StmtKind::Assign { lhs, rhs } = &manager.stmt(sid).kind else {
                continue;
            };
            let heap_store = lhs.is_field_ref() && (rhs.is_field_ref() || rhs.as_local().is_some());
            let heap_load = rhs.is_field_ref() && (lhs.is_field_ref() || lhs.as_local().is_some());
            if !heap_store && !heap_load {
                continue;
            }
            let (Some(ap_left), Some(ap_right)) = (factory.create(lhs, true), factory.create(rhs, true))
            else {
                continue;
            };
            table.entry(ap_left.clone()).or_default().insert(ap_right.clone());
            table.entry(ap_right).or_default().insert(ap_left);
        }
        table
    }

    /// Whether the alias table of `method` has been built
    pub fn has_processed_method(&self, method: MethodId) -> bool {
        self.tables.contains_key(&method)
    }
}

impl AliasingStrategy for ImplicitFlowAliasStrategy {
    fn name(&self) -> &'static str {
        "implicit_flow"
    }

    fn compute_alias_taints(
        &self,
        d1: &AbsRef,
        src: StmtId,
        target_value: &Value,
        taint_set: &mut FactSet,
        method: MethodId,
        new_abs: &AbsRef,
        manager: &InfoflowManager,
    ) {
        let Value::InstanceField { base, .. } = target_value else {
            return;
        };
        let factory = manager.ap_factory();
        let Some(base_ap) = factory.create(&Value::local(base), true) else {
            return;
        };
        let table = self.table_for(method, manager);
        let Some(aliases) = table.get(&base_ap) else {
            return;
        };

        for ap in aliases {
            let new_ap = factory.merge(ap, new_abs.access_path());
            let Some(alias_abs) = Abstraction::derive_new_abstraction(new_abs, new_ap, None) else {
                continue;
            };
            if !taint_set.insert(Arc::clone(&alias_abs)) {
                continue;
            }
            // The alias base may itself be aliased again
            if let (true, Some(plain), Some(field)) =
                (ap.is_instance_field_ref(), ap.plain_value(), ap.first_field())
            {
                let alias_base = Value::field(plain, field);
                self.compute_alias_taints(d1, src, &alias_base, taint_set, method, &alias_abs, manager);
            }
        }
    }

    fn is_flow_sensitive(&self) -> bool {
        false
    }

    fn requires_analysis_on_return(&self) -> bool {
        true
    }
}
