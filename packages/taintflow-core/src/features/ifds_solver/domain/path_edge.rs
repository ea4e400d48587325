//! Path edges of the exploded supergraph

use crate::features::abstraction::AbsRef;
use crate::shared::ir::StmtId;
use std::fmt;

/// Path edge: (d1, n, d2)
///
/// Fact `d2` holds at statement `n` when `d1` held at the start point of the
/// enclosing method. Equality is structural on both facts, so two edges
/// reaching the same state through different derivations collide in the
/// jump-function table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathEdge {
    /// Fact at the start point of the method
    pub source_fact: AbsRef,

    /// Statement the edge leads to
    pub target_node: StmtId,

    /// Fact at `target_node`
    pub target_fact: AbsRef,
}

impl PathEdge {
    pub fn new(source_fact: AbsRef, target_node: StmtId, target_fact: AbsRef) -> Self {
        Self {
            source_fact,
            target_node,
            target_fact,
        }
    }
}

impl fmt::Display for PathEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}> -> <{}, {}>",
            self.source_fact, self.target_node, self.target_fact
        )
    }
}

/// End summary of a method: the exit `exit_node` is reached with `exit_fact`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndSummary {
    pub exit_node: StmtId,
    pub exit_fact: AbsRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::{Abstraction, SourceContext, SourceSinkDefinition};
    use crate::features::access_path::AccessPathFactory;
    use crate::shared::ir::{ClassHierarchy, Local, LocalId, Type, Value};
    use rustc_hash::FxHashSet;
    use std::sync::Arc;

    #[test]
    fn test_equal_facts_make_equal_edges() {
        let factory =
            AccessPathFactory::new(&InfoflowConfig::default(), Arc::new(ClassHierarchy::new()));
        let zero: AbsRef = Arc::new(Abstraction::zero(factory.empty()));
        let x = Local::new(LocalId(1), "x", Type::object());
        let ap = factory.create(&Value::local(&x), true).unwrap();
        let ctx = SourceContext::new(
            Arc::new(SourceSinkDefinition::source("src")),
            ap,
            StmtId(1),
            None,
        );
        let a: AbsRef = Arc::new(Abstraction::new_source(ctx.clone(), false, false));
        let b: AbsRef = Arc::new(Abstraction::new_source(ctx, false, false));
        assert!(!Arc::ptr_eq(&a, &b));

        let mut edges = FxHashSet::default();
        edges.insert(PathEdge::new(zero.clone(), StmtId(2), a));
        assert!(!edges.insert(PathEdge::new(zero, StmtId(2), b)));
    }
}
