//! Where a taint came from

use crate::features::access_path::ApRef;
use crate::shared::ir::StmtId;
use std::fmt;
use std::sync::Arc;

/// Kind of a source or sink definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Source,
    Sink,
}

/// A matched source or sink definition.
///
/// `id` is the signature the oracle matched on; `category` groups
/// definitions for reporting (e.g. "network", "sms").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSinkDefinition {
    kind: DefinitionKind,
    id: Arc<str>,
    category: Option<Arc<str>>,
}

impl SourceSinkDefinition {
    pub fn source(id: &str) -> Self {
        Self {
            kind: DefinitionKind::Source,
            id: Arc::from(id),
            category: None,
        }
    }

    pub fn sink(id: &str) -> Self {
        Self {
            kind: DefinitionKind::Sink,
            id: Arc::from(id),
            category: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(Arc::from(category));
        self
    }

    pub fn kind(&self) -> DefinitionKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

impl fmt::Display for SourceSinkDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{} [{}]", self.id, category),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Definition, originating path and statement of a taint created at a source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceContext {
    definition: Arc<SourceSinkDefinition>,
    access_path: ApRef,
    stmt: StmtId,
    user_data: Option<Arc<str>>,
}

impl SourceContext {
    pub fn new(
        definition: Arc<SourceSinkDefinition>,
        access_path: ApRef,
        stmt: StmtId,
        user_data: Option<Arc<str>>,
    ) -> Self {
        Self {
            definition,
            access_path,
            stmt,
            user_data,
        }
    }

    pub fn definition(&self) -> &Arc<SourceSinkDefinition> {
        &self.definition
    }

    pub fn access_path(&self) -> &ApRef {
        &self.access_path
    }

    pub fn stmt(&self) -> StmtId {
        self.stmt
    }

    pub fn user_data(&self) -> Option<&str> {
        self.user_data.as_deref()
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.access_path, self.stmt)
    }
}
