//! Fact reuse between flow-function input and output
//!
//! Access paths are interned by the factory before a fact is ever built, so
//! the only remaining duplication is a flow function returning a fresh fact
//! equal to its input. Such a fact is replaced by the input before it is
//! published; published facts are never modified.

use crate::features::abstraction::AbsRef;
use crate::shared::ir::StmtId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct FactMemoryManager {
    reused: AtomicU64,
}

impl FactMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fact to publish for `output`, derived from `input`
    pub fn handle_generated(&self, input: &AbsRef, output: AbsRef) -> AbsRef {
        if Arc::ptr_eq(input, &output) {
            return output;
        }
        if **input == *output
            && (output.current_stmt().is_none() || output.current_stmt() == input.current_stmt())
        {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(input);
        }
        output
    }

    /// A join point reached through a call edge keeps all its neighbors,
    /// regardless of the configured limit
    pub fn is_essential_join_point(&self, _fact: &AbsRef, related_call_site: Option<StmtId>) -> bool {
        related_call_site.is_some()
    }

    pub fn reused_count(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }
}
