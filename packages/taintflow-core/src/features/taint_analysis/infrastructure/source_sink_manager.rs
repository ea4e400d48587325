//! Signature-keyed source and sink oracle
//!
//! Sources are calls whose return value, receiver or arguments become
//! tainted, or parameters of a given method. Sinks are call arguments
//! (optionally restricted to some indices), call receivers, and values
//! returned from a given method.

use crate::features::abstraction::SourceSinkDefinition;
use crate::features::access_path::ApRef;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::features::taint_analysis::ports::{SinkInfo, SourceInfo, SourceSinkOracle};
use crate::shared::ir::{MethodRef, Stmt, StmtKind, Value};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// What a source call taints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTarget {
    Return,
    Base,
    Argument(usize),
}

#[derive(Debug, Clone)]
struct SourceSpec {
    definition: Arc<SourceSinkDefinition>,
    targets: Vec<SourceTarget>,
}

#[derive(Debug, Clone)]
struct SinkSpec {
    definition: Arc<SourceSinkDefinition>,
    /// `None` means every argument and the receiver
    arguments: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Default)]
pub struct MethodSourceSinkManager {
    call_sources: FxHashMap<String, SourceSpec>,
    parameter_sources: FxHashMap<String, (Arc<SourceSinkDefinition>, Vec<usize>)>,
    call_sinks: FxHashMap<String, SinkSpec>,
    return_sinks: FxHashMap<String, Arc<SourceSinkDefinition>>,
}

impl MethodSourceSinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to `method` taint its return value
    pub fn with_source(self, method: &MethodRef) -> Self {
        self.with_source_targets(method, &[SourceTarget::Return])
    }

    pub fn with_source_targets(mut self, method: &MethodRef, targets: &[SourceTarget]) -> Self {
        let signature = method.signature();
        let spec = self
            .call_sources
            .entry(signature.clone())
            .or_insert_with(|| SourceSpec {
                definition: Arc::new(SourceSinkDefinition::source(&signature)),
                targets: Vec::new(),
            });
        for t in targets {
            if !spec.targets.contains(t) {
                spec.targets.push(*t);
            }
        }
        self
    }

    /// Parameter `index` of `method` is tainted on entry
    pub fn with_parameter_source(mut self, method: &MethodRef, index: usize) -> Self {
        let signature = method.signature();
        let entry = self
            .parameter_sources
            .entry(signature.clone())
            .or_insert_with(|| (Arc::new(SourceSinkDefinition::source(&signature)), Vec::new()));
        if !entry.1.contains(&index) {
            entry.1.push(index);
        }
        self
    }

    /// Every argument and the receiver of calls to `method` are sinks
    pub fn with_sink(mut self, method: &MethodRef) -> Self {
        let signature = method.signature();
        self.call_sinks.insert(
            signature.clone(),
            SinkSpec {
                definition: Arc::new(SourceSinkDefinition::sink(&signature)),
                arguments: None,
            },
        );
        self
    }

    pub fn with_sink_arguments(mut self, method: &MethodRef, arguments: &[usize]) -> Self {
        let signature = method.signature();
        self.call_sinks.insert(
            signature.clone(),
            SinkSpec {
                definition: Arc::new(SourceSinkDefinition::sink(&signature)),
                arguments: Some(arguments.to_vec()),
            },
        );
        self
    }

    /// Tainted values returned from `method` are sinks
    pub fn with_return_sink(mut self, method: &MethodRef) -> Self {
        let signature = method.signature();
        self.return_sinks.insert(
            signature.clone(),
            Arc::new(SourceSinkDefinition::sink(&signature)),
        );
        self
    }

    pub fn source_count(&self) -> usize {
        self.call_sources.len() + self.parameter_sources.len()
    }

    pub fn sink_count(&self) -> usize {
        self.call_sinks.len() + self.return_sinks.len()
    }

    fn call_source_info(&self, stmt: &Stmt, manager: &InfoflowManager) -> Option<SourceInfo> {
        let inv = stmt.invoke_expr()?;
        let spec = self.call_sources.get(&inv.method.signature())?;
        let factory = manager.ap_factory();
        let mut aps = Vec::new();
        for target in &spec.targets {
            let value = match target {
                SourceTarget::Return => match &stmt.kind {
                    StmtKind::Assign { lhs, .. } => Some(lhs.clone()),
                    _ => None,
                },
                SourceTarget::Base => inv.base.as_ref().map(Value::local),
                SourceTarget::Argument(i) => inv.arg(*i).filter(|v| v.can_contain_value()).cloned(),
            };
            if let Some(ap) = value.and_then(|v| factory.create(&v, true)) {
                aps.push(ap);
            }
        }
        if aps.is_empty() {
            return None;
        }
        Some(SourceInfo::new(Arc::clone(&spec.definition), aps))
    }

    fn parameter_source_info(&self, stmt: &Stmt, manager: &InfoflowManager) -> Option<SourceInfo> {
        let StmtKind::Identity {
            local,
            rhs: Value::Parameter { index, .. },
        } = &stmt.kind
        else {
            return None;
        };
        let method = manager.program().method(stmt.method);
        let (definition, indices) = self.parameter_sources.get(&method.signature())?;
        if !indices.contains(index) {
            return None;
        }
        let ap = manager.ap_factory().create(&Value::local(local), true)?;
        Some(SourceInfo::new(Arc::clone(definition), vec![ap]))
    }
}

impl SourceSinkOracle for MethodSourceSinkManager {
    fn source_info(&self, stmt: &Stmt, manager: &InfoflowManager) -> Option<SourceInfo> {
        self.call_source_info(stmt, manager)
            .or_else(|| self.parameter_source_info(stmt, manager))
    }

    fn sink_info(
        &self,
        stmt: &Stmt,
        manager: &InfoflowManager,
        ap: Option<&ApRef>,
    ) -> Option<SinkInfo> {
        if let Some(inv) = stmt.invoke_expr() {
            if let Some(spec) = self.call_sinks.get(&inv.method.signature()) {
                let info = SinkInfo {
                    definition: Arc::clone(&spec.definition),
                };
                let Some(ap) = ap else {
                    return Some(info);
                };
                // Static fields are never passed as arguments
                let base = ap.plain_value()?;
                let arg_hit = inv.args.iter().enumerate().any(|(i, arg)| {
                    spec.arguments.as_ref().map_or(true, |only| only.contains(&i))
                        && arg.as_local() == Some(base)
                });
                let base_hit = spec.arguments.is_none() && inv.base.as_ref() == Some(base);
                return (arg_hit || base_hit).then_some(info);
            }
        }
        if let Some(op) = stmt.return_op() {
            let method = manager.program().method(stmt.method);
            if let Some(definition) = self.return_sinks.get(&method.signature()) {
                let hit = match ap {
                    None => true,
                    Some(ap) => ap.plain_value().is_some() && ap.plain_value() == op.as_local(),
                };
                return hit.then(|| SinkInfo {
                    definition: Arc::clone(definition),
                });
            }
        }
        None
    }
}
