//! A fact observed at a sink statement

use super::abstraction::AbsRef;
use super::source_context::SourceSinkDefinition;
use crate::shared::ir::StmtId;
use std::fmt;
use std::sync::Arc;

/// Raw data-flow result: sink definition, sink statement and the fact
/// whose provenance DAG carries the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbstractionAtSink {
    sink_definition: Arc<SourceSinkDefinition>,
    abstraction: AbsRef,
    sink_stmt: StmtId,
}

impl AbstractionAtSink {
    pub fn new(sink_definition: Arc<SourceSinkDefinition>, abstraction: AbsRef, sink_stmt: StmtId) -> Self {
        Self {
            sink_definition,
            abstraction,
            sink_stmt,
        }
    }

    pub fn sink_definition(&self) -> &Arc<SourceSinkDefinition> {
        &self.sink_definition
    }

    pub fn abstraction(&self) -> &AbsRef {
        &self.abstraction
    }

    pub fn sink_stmt(&self) -> StmtId {
        self.sink_stmt
    }
}

impl fmt::Display for AbstractionAtSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.abstraction.access_path(), self.sink_stmt)
    }
}
