//! Signature-keyed library summaries
//!
//! Each modelled method declares what a tainted receiver or argument does:
//! taint the returned value, taint the receiver, or be killed by the call.
//! Models load from YAML or are added through the builder methods.

use crate::config::{ConfigError, ConfigResult};
use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::features::taint_analysis::ports::TaintWrapper;
use crate::shared::ir::{MethodRef, Stmt, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One modelled method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperModel {
    /// `<Class: ret name(params)>`
    pub signature: String,
    /// A tainted receiver or argument taints the returned value
    pub taint_return: bool,
    /// A tainted argument taints the receiver
    pub taint_base: bool,
    /// The call removes the taint from its receiver and arguments
    pub kill: bool,
    /// Taints on this call are handled by the model alone
    pub exclusive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WrapperModels {
    #[serde(default)]
    methods: Vec<WrapperModel>,
}

#[derive(Debug, Clone, Default)]
pub struct SimpleTaintWrapper {
    models: FxHashMap<String, WrapperModel>,
}

impl SimpleTaintWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a document of the form `methods: [{signature: ..., taint_return: true}]`
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let doc: WrapperModels = serde_yaml::from_str(yaml)?;
        let mut wrapper = Self::new();
        for model in doc.methods {
            if model.signature.is_empty() {
                return Err(ConfigError::Validation(
                    "taint wrapper model without signature".to_string(),
                ));
            }
            wrapper.models.insert(model.signature.clone(), model);
        }
        Ok(wrapper)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    fn model_mut(&mut self, method: &MethodRef) -> &mut WrapperModel {
        let signature = method.signature();
        self.models
            .entry(signature.clone())
            .or_insert_with(|| WrapperModel {
                signature,
                ..Default::default()
            })
    }

    pub fn with_taint_return(mut self, method: &MethodRef) -> Self {
        self.model_mut(method).taint_return = true;
        self
    }

    pub fn with_taint_base(mut self, method: &MethodRef) -> Self {
        self.model_mut(method).taint_base = true;
        self
    }

    pub fn with_kill(mut self, method: &MethodRef) -> Self {
        self.model_mut(method).kill = true;
        self
    }

    pub fn with_exclusive(mut self, method: &MethodRef) -> Self {
        self.model_mut(method).exclusive = true;
        self
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    fn model_for(&self, stmt: &Stmt) -> Option<&WrapperModel> {
        let inv = stmt.invoke_expr()?;
        self.models.get(&inv.method.signature())
    }
}

impl TaintWrapper for SimpleTaintWrapper {
    fn taints_for_method(
        &self,
        stmt: &Stmt,
        _d1: &AbsRef,
        taint: &AbsRef,
        manager: &InfoflowManager,
    ) -> Option<FxHashSet<AbsRef>> {
        let model = self.model_for(stmt)?;
        let inv = stmt.invoke_expr()?;
        let ap = taint.access_path();

        let mut res = FxHashSet::default();
        // Static fields are not touched by modelled calls
        let Some(plain) = ap.plain_value() else {
            res.insert(Arc::clone(taint));
            return Some(res);
        };

        let base_tainted = inv.base.as_ref() == Some(plain);
        let arg_tainted = inv.args.iter().any(|a| a.as_local() == Some(plain));
        let lhs = match stmt.left_op() {
            Some(v @ Value::Local(_)) => Some(v),
            _ => None,
        };
        let overwritten = lhs.as_ref().and_then(Value::as_local) == Some(plain);
        let killed = model.kill && (base_tainted || arg_tainted);

        if !overwritten && !killed {
            res.insert(Arc::clone(taint));
        }
        if killed {
            return Some(res);
        }

        let factory = manager.ap_factory();
        if model.taint_return && (base_tainted || arg_tainted) {
            if let Some(lhs) = &lhs {
                let new_ap = factory.create(lhs, true);
                res.extend(Abstraction::derive_new_abstraction(taint, new_ap, Some(stmt.id)));
            }
        }
        if model.taint_base && arg_tainted {
            if let Some(base) = &inv.base {
                let new_ap = factory.create(&Value::local(base), true);
                res.extend(Abstraction::derive_new_abstraction(taint, new_ap, Some(stmt.id)));
            }
        }
        Some(res)
    }

    fn is_exclusive(&self, stmt: &Stmt, _taint: &AbsRef, _manager: &InfoflowManager) -> bool {
        self.model_for(stmt).map_or(false, |m| m.exclusive)
    }

    fn aliases_for_method(
        &self,
        _stmt: &Stmt,
        _d1: &AbsRef,
        _taint: &AbsRef,
        _manager: &InfoflowManager,
    ) -> Option<FxHashSet<AbsRef>> {
        None
    }

    fn supports_callee(&self, stmt: &Stmt) -> bool {
        self.model_for(stmt).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfoflowConfig;
    use crate::features::abstraction::{SourceContext, SourceSinkDefinition};
    use crate::features::taint_analysis::infrastructure::icfg::ProgramIcfg;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::features::taint_analysis::ports::InterproceduralCfg;
    use crate::shared::ir::{ProgramBuilder, StmtId, Type};
    use pretty_assertions::assert_eq;

    fn append() -> MethodRef {
        MethodRef::new("java.lang.StringBuilder", "append", vec![Type::string()], Type::class("java.lang.StringBuilder"))
    }

    fn to_string() -> MethodRef {
        MethodRef::new("java.lang.StringBuilder", "toString", vec![], Type::string())
    }

    struct Fixture {
        mgr: Arc<InfoflowManager>,
        append_stmt: StmtId,
        to_string_stmt: StmtId,
        s: crate::shared::ir::Local,
        sb: crate::shared::ir::Local,
    }

    fn fixture() -> Fixture {
        let mut pb = ProgramBuilder::new();
        pb.library_class("java.lang.StringBuilder", None);
        pb.declare_method(&append(), false);
        pb.declare_method(&to_string(), false);
        pb.class("app.Main", None);
        let sig = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&sig, true);
        let s = mb.local("s", Type::string());
        let sb = mb.local("sb", Type::class("java.lang.StringBuilder"));
        let out = mb.local("out", Type::string());
        let append_stmt = mb.call_virtual(&sb, &append(), vec![Value::local(&s)]);
        let to_string_stmt = mb.assign_virtual_call(Value::local(&out), &sb, &to_string(), vec![]);
        mb.ret_void();
        let m = mb.finish();
        pb.entry_point(m);
        let icfg: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(Arc::new(pb.build())));
        let mgr = InfoflowManager::builder(
            Arc::new(InfoflowConfig::default()),
            icfg,
            Arc::new(MethodSourceSinkManager::new()),
        )
        .build();
        Fixture {
            mgr,
            append_stmt,
            to_string_stmt,
            s,
            sb,
        }
    }

    fn taint_of(mgr: &InfoflowManager, local: &crate::shared::ir::Local) -> AbsRef {
        let ap = mgr.ap_factory().create(&Value::local(local), true).unwrap();
        let ctx = SourceContext::new(Arc::new(SourceSinkDefinition::source("src")), ap, StmtId(0), None);
        Arc::new(Abstraction::new_source(ctx, false, false))
    }

    fn plain_names(set: &FxHashSet<AbsRef>) -> Vec<String> {
        let mut names: Vec<String> = set
            .iter()
            .filter_map(|a| a.access_path().plain_value().map(|l| l.name().to_string()))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_argument_taints_receiver() {
        let fx = fixture();
        let wrapper = SimpleTaintWrapper::new().with_taint_base(&append());
        let stmt = fx.mgr.stmt(fx.append_stmt).clone();
        let taint = taint_of(&fx.mgr, &fx.s);
        let res = wrapper
            .taints_for_method(&stmt, fx.mgr.zero_value(), &taint, &fx.mgr)
            .unwrap();
        assert_eq!(plain_names(&res), vec!["s".to_string(), "sb".to_string()]);
    }

    #[test]
    fn test_receiver_taints_return_value() {
        let fx = fixture();
        let wrapper = SimpleTaintWrapper::new().with_taint_return(&to_string());
        let stmt = fx.mgr.stmt(fx.to_string_stmt).clone();
        let taint = taint_of(&fx.mgr, &fx.sb);
        let res = wrapper
            .taints_for_method(&stmt, fx.mgr.zero_value(), &taint, &fx.mgr)
            .unwrap();
        assert_eq!(plain_names(&res), vec!["out".to_string(), "sb".to_string()]);
        assert!(wrapper.supports_callee(&stmt));
        assert!(!wrapper.is_exclusive(&stmt, &taint, &fx.mgr));
    }

    #[test]
    fn test_kill_removes_taint() {
        let fx = fixture();
        let wrapper = SimpleTaintWrapper::new().with_kill(&append()).with_exclusive(&append());
        let stmt = fx.mgr.stmt(fx.append_stmt).clone();
        let taint = taint_of(&fx.mgr, &fx.s);
        let res = wrapper
            .taints_for_method(&stmt, fx.mgr.zero_value(), &taint, &fx.mgr)
            .unwrap();
        assert!(res.is_empty());
        assert!(wrapper.is_exclusive(&stmt, &taint, &fx.mgr));
    }

    #[test]
    fn test_unmodelled_call_is_not_handled() {
        let fx = fixture();
        let wrapper = SimpleTaintWrapper::new().with_taint_return(&to_string());
        let stmt = fx.mgr.stmt(fx.append_stmt).clone();
        let taint = taint_of(&fx.mgr, &fx.s);
        assert!(wrapper
            .taints_for_method(&stmt, fx.mgr.zero_value(), &taint, &fx.mgr)
            .is_none());
        assert!(!wrapper.supports_callee(&stmt));
    }

    #[test]
    fn test_models_from_yaml() {
        let yaml = r#"
methods:
  - signature: "<java.lang.StringBuilder: java.lang.String toString()>"
    taint_return: true
  - signature: "<app.Sanitizer: void clean(java.lang.String)>"
    kill: true
    exclusive: true
"#;
        let wrapper = SimpleTaintWrapper::from_yaml_str(yaml).unwrap();
        assert_eq!(wrapper.model_count(), 2);
        assert!(SimpleTaintWrapper::from_yaml_str("methods:\n  - taint_return: true\n").is_err());
    }
}
