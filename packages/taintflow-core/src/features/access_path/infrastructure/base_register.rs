//! Registry of recursive base patterns
//!
//! When a field chain returns to an object of the type it started from,
//! the chain is cut out of the access path and recorded here under that
//! type. Alias queries re-expand the pattern on demand.

use crate::features::access_path::domain::AccessPathFragment;
use crate::shared::ir::Type;
use dashmap::DashMap;
use std::sync::Arc;

pub type BasePattern = Arc<[AccessPathFragment]>;

#[derive(Debug, Default)]
pub struct BaseRegister {
    bases: DashMap<Type, Vec<BasePattern>>,
}

impl BaseRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the pattern was already known for this type
    pub fn register(&self, ty: &Type, base: &[AccessPathFragment]) -> bool {
        let mut entry = self.bases.entry(ty.clone()).or_default();
        if entry.iter().any(|b| b.as_ref() == base) {
            return false;
        }
        entry.push(Arc::from(base));
        true
    }

    pub fn bases_for(&self, ty: &Type) -> Vec<BasePattern> {
        self.bases
            .get(ty)
            .map(|b| b.value().clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.bases.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
