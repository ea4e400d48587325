//! Models for native methods the analysis cannot look into

use crate::features::abstraction::{AbsRef, Abstraction};
use crate::features::access_path::ArrayTaintType;
use crate::features::taint_analysis::infrastructure::manager::InfoflowManager;
use crate::features::taint_analysis::ports::NativeCallHandler;
use crate::shared::ir::{Stmt, Value};
use rustc_hash::FxHashSet;

pub const SIG_ARRAYCOPY: &str =
    "<java.lang.System: void arraycopy(java.lang.Object,int,java.lang.Object,int,int)>";
pub const SIG_NEW_ARRAY: &str =
    "<java.lang.reflect.Array: java.lang.Object newArray(java.lang.Class,int)>";

/// Handles `System.arraycopy` and `Array.newArray`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNativeCallHandler;

impl DefaultNativeCallHandler {
    pub fn new() -> Self {
        Self
    }

    fn single(abs: AbsRef, call: &Stmt) -> FxHashSet<AbsRef> {
        let mut res = FxHashSet::default();
        res.insert(Abstraction::with_corresponding_call_site(abs, call.id));
        res
    }
}

impl NativeCallHandler for DefaultNativeCallHandler {
    fn tainted_values(
        &self,
        call: &Stmt,
        source: &AbsRef,
        args: &[Value],
        manager: &InfoflowManager,
    ) -> Option<FxHashSet<AbsRef>> {
        let inv = call.invoke_expr()?;
        let ap = source.access_path();
        let plain = ap.plain_value()?;
        let factory = manager.ap_factory();

        match inv.method.signature().as_str() {
            SIG_ARRAYCOPY => {
                // Inactive aliases only matter after their activation point
                if !source.is_abstraction_active() {
                    return None;
                }
                let (src, dest) = (args.first()?, args.get(2)?);
                if src.as_local() != Some(plain) {
                    return None;
                }
                if !manager.type_utils().check_cast_ap(ap, &dest.ty()) {
                    return None;
                }
                let new_ap =
                    factory.copy_with_new_value_typed(ap, dest, ap.base_type().cloned(), false);
                let abs = Abstraction::derive_new_abstraction(source, new_ap, Some(call.id))?;
                Some(Self::single(abs, call))
            }
            SIG_NEW_ARRAY => {
                if args.get(1)?.as_local() != Some(plain) {
                    return None;
                }
                let lhs = call.left_op()?;
                let new_ap = factory.copy_with_new_value_full(
                    ap,
                    &lhs,
                    None,
                    false,
                    true,
                    ArrayTaintType::Length,
                );
                let abs = Abstraction::derive_new_abstraction(source, new_ap, Some(call.id))?;
                Some(Self::single(abs, call))
            }
            _ => None,
        }
    }

    fn supports_call(&self, call: &Stmt) -> bool {
        call.invoke_expr().map_or(false, |inv| {
            matches!(inv.method.signature().as_str(), SIG_ARRAYCOPY | SIG_NEW_ARRAY)
        })
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
    use crate::shared::ir::{MethodRef, ProgramBuilder, StmtId, Type};
    use std::sync::Arc;

    fn arraycopy() -> MethodRef {
        MethodRef::new(
            "java.lang.System",
            "arraycopy",
            vec![Type::object(), Type::Int, Type::object(), Type::Int, Type::Int],
            Type::Void,
        )
    }

    #[test]
    fn test_arraycopy_taints_destination() {
        assert_eq!(arraycopy().signature(), SIG_ARRAYCOPY);

        let mut pb = ProgramBuilder::new();
        pb.library_class("java.lang.System", None);
        pb.native_method(&arraycopy(), true);
        pb.class("app.Main", None);
        let sig = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&sig, true);
        let src = mb.local("src", Type::array_of(Type::string()));
        let dst = mb.local("dst", Type::array_of(Type::string()));
        let args = vec![
            Value::local(&src),
            Value::int(0),
            Value::local(&dst),
            Value::int(0),
            Value::int(1),
        ];
        let call = mb.call_static(&arraycopy(), args.clone());
        let other = mb.nop();
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

        let ap = mgr.ap_factory().create(&Value::local(&src), true).unwrap();
        let ctx = SourceContext::new(Arc::new(SourceSinkDefinition::source("src")), ap, StmtId(0), None);
        let taint = Arc::new(Abstraction::new_source(ctx, false, false));

        let handler = DefaultNativeCallHandler::new();
        let stmt = mgr.stmt(call).clone();
        assert!(handler.supports_call(&stmt));
        assert!(!handler.supports_call(mgr.stmt(other)));

        let res = handler.tainted_values(&stmt, &taint, &args, &mgr).unwrap();
        assert_eq!(res.len(), 1);
        let out = res.iter().next().unwrap();
        assert_eq!(out.access_path().plain_value(), Some(&dst));
        assert_eq!(out.corresponding_call_site(), Some(call));

        let inactive = Abstraction::derive_inactive_abstraction(&taint, call, true);
        assert!(handler.tainted_values(&stmt, &inactive, &args, &mgr).is_none());
    }
}
