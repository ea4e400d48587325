//! Methods, programs and the program builder

use super::hierarchy::{ClassHierarchy, ClassInfo};
use super::stmt::{MethodId, Stmt, StmtId, StmtKind};
use super::types::{Type, OBJECT_CLASS, STRING_CLASS};
use super::values::{InvokeExpr, InvokeKind, Local, LocalId, MethodRef, Value};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Exception handler covering a contiguous range of a method body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    /// First covered statement
    pub begin: StmtId,
    /// Last covered statement (inclusive)
    pub end: StmtId,
    pub handler: StmtId,
    pub exception: Type,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub id: MethodId,
    pub sig: MethodRef,
    pub is_static: bool,
    pub is_native: bool,
    /// Statements in layout order; the first one is the entry
    pub body: Vec<StmtId>,
    pub this_local: Option<Local>,
    pub param_locals: Vec<Local>,
    pub locals: Vec<Local>,
    pub traps: Vec<Trap>,
}

impl Method {
    pub fn class(&self) -> &str {
        self.sig.declaring_class()
    }

    pub fn name(&self) -> &str {
        self.sig.name()
    }

    pub fn signature(&self) -> String {
        self.sig.signature()
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Has a body that can be analysed
    pub fn is_concrete(&self) -> bool {
        self.has_body() && !self.is_native
    }

    pub fn is_static_initializer(&self) -> bool {
        self.sig.name() == "<clinit>"
    }

    pub fn is_constructor(&self) -> bool {
        self.sig.name() == "<init>"
    }

    pub fn param_count(&self) -> usize {
        self.sig.params().len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    hierarchy: Arc<ClassHierarchy>,
    methods: Vec<Method>,
    stmts: Vec<Stmt>,
    by_signature: FxHashMap<String, MethodId>,
    entry_points: Vec<MethodId>,
}

impl Program {
    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn shared_hierarchy(&self) -> Arc<ClassHierarchy> {
        self.hierarchy.clone()
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0 as usize]
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn method_of(&self, stmt: StmtId) -> &Method {
        self.method(self.stmt(stmt).method)
    }

    pub fn method_by_signature(&self, signature: &str) -> Option<&Method> {
        self.by_signature.get(signature).map(|id| self.method(*id))
    }

    pub fn entry_points(&self) -> &[MethodId] {
        &self.entry_points
    }

    /// Looks up `sub_signature` in `class` and its superclasses
    pub fn resolve_in_hierarchy(&self, class: &str, sub_signature: &str) -> Option<&Method> {
        let mut current: Option<Arc<str>> = Some(Arc::from(class));
        while let Some(cls) = current {
            let sig = format!("<{}: {}>", cls, sub_signature);
            if let Some(m) = self.method_by_signature(&sig) {
                return Some(m);
            }
            current = self.hierarchy.super_class_of(&cls).cloned();
        }
        None
    }
}

/// Incrementally builds a [`Program`]
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    next_local: u32,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        let mut builder = Self::default();
        Arc::make_mut(&mut builder.program.hierarchy).add_class(OBJECT_CLASS, ClassInfo::default());
        builder.library_class(STRING_CLASS, Some(OBJECT_CLASS));
        builder
    }

    pub fn class(&mut self, name: &str, super_class: Option<&str>) -> &mut Self {
        self.class_with(
            name,
            ClassInfo {
                super_class: Some(Arc::from(super_class.unwrap_or(OBJECT_CLASS))),
                ..Default::default()
            },
        )
    }

    pub fn library_class(&mut self, name: &str, super_class: Option<&str>) -> &mut Self {
        self.class_with(
            name,
            ClassInfo {
                super_class: Some(Arc::from(super_class.unwrap_or(OBJECT_CLASS))),
                is_library: true,
                ..Default::default()
            },
        )
    }

    pub fn class_with(&mut self, name: &str, info: ClassInfo) -> &mut Self {
        Arc::make_mut(&mut self.program.hierarchy).add_class(name, info);
        self
    }

    fn add_method(&mut self, sig: &MethodRef, is_static: bool, is_native: bool) -> MethodId {
        let id = MethodId(self.program.methods.len() as u32);
        self.program.methods.push(Method {
            id,
            sig: sig.clone(),
            is_static,
            is_native,
            body: Vec::new(),
            this_local: None,
            param_locals: Vec::new(),
            locals: Vec::new(),
            traps: Vec::new(),
        });
        self.program.by_signature.insert(sig.signature(), id);
        id
    }

    /// Method without a body (library or phantom method)
    pub fn declare_method(&mut self, sig: &MethodRef, is_static: bool) -> MethodId {
        self.add_method(sig, is_static, false)
    }

    pub fn native_method(&mut self, sig: &MethodRef, is_static: bool) -> MethodId {
        self.add_method(sig, is_static, true)
    }

    /// Starts a method body; identity statements for `this` and all
    /// parameters are emitted up front
    pub fn method(&mut self, sig: &MethodRef, is_static: bool) -> MethodBuilder<'_> {
        let id = self.add_method(sig, is_static, false);
        let mut mb = MethodBuilder {
            builder: self,
            id,
        };
        if !is_static {
            let this_ty = Type::class(sig.declaring_class());
            let this = mb.local("this", this_ty.clone());
            mb.push(StmtKind::Identity {
                local: this.clone(),
                rhs: Value::This(this_ty),
            });
            mb.method_mut().this_local = Some(this);
        }
        for (index, ty) in sig.params().iter().enumerate() {
            let p = mb.local(&format!("p{}", index), ty.clone());
            mb.push(StmtKind::Identity {
                local: p.clone(),
                rhs: Value::Parameter {
                    index,
                    ty: ty.clone(),
                },
            });
            mb.method_mut().param_locals.push(p);
        }
        mb
    }

    pub fn entry_point(&mut self, method: MethodId) -> &mut Self {
        self.program.entry_points.push(method);
        self
    }

    pub fn build(self) -> Program {
        self.program
    }
}

/// Appends statements to one method body
#[derive(Debug)]
pub struct MethodBuilder<'a> {
    builder: &'a mut ProgramBuilder,
    id: MethodId,
}

impl MethodBuilder<'_> {
    fn method_mut(&mut self) -> &mut Method {
        &mut self.builder.program.methods[self.id.0 as usize]
    }

    fn method(&self) -> &Method {
        &self.builder.program.methods[self.id.0 as usize]
    }

    fn push(&mut self, kind: StmtKind) -> StmtId {
        let id = StmtId(self.builder.program.stmts.len() as u32);
        self.builder.program.stmts.push(Stmt {
            id,
            method: self.id,
            kind,
        });
        self.method_mut().body.push(id);
        id
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    pub fn this_local(&self) -> Option<Local> {
        self.method().this_local.clone()
    }

    pub fn param(&self, index: usize) -> Option<Local> {
        self.method().param_locals.get(index).cloned()
    }

    pub fn local(&mut self, name: &str, ty: Type) -> Local {
        let local = Local::new(LocalId(self.builder.next_local), name, ty);
        self.builder.next_local += 1;
        self.method_mut().locals.push(local.clone());
        local
    }

    /// Id the next appended statement will receive
    pub fn next_id(&self) -> StmtId {
        StmtId(self.builder.program.stmts.len() as u32)
    }

    pub fn assign(&mut self, lhs: Value, rhs: Value) -> StmtId {
        self.push(StmtKind::Assign { lhs, rhs })
    }

    pub fn invoke(&mut self, inv: InvokeExpr) -> StmtId {
        self.push(StmtKind::Invoke(inv))
    }

    pub fn call_static(&mut self, method: &MethodRef, args: Vec<Value>) -> StmtId {
        self.invoke(InvokeExpr {
            kind: InvokeKind::Static,
            method: method.clone(),
            base: None,
            args,
        })
    }

    pub fn call_virtual(&mut self, base: &Local, method: &MethodRef, args: Vec<Value>) -> StmtId {
        self.invoke(InvokeExpr {
            kind: InvokeKind::Virtual,
            method: method.clone(),
            base: Some(base.clone()),
            args,
        })
    }

    /// `lhs = Class.method(args)`
    pub fn assign_static_call(&mut self, lhs: Value, method: &MethodRef, args: Vec<Value>) -> StmtId {
        self.assign(
            lhs,
            Value::Invoke(InvokeExpr {
                kind: InvokeKind::Static,
                method: method.clone(),
                base: None,
                args,
            }),
        )
    }

    /// `lhs = base.method(args)`
    pub fn assign_virtual_call(
        &mut self,
        lhs: Value,
        base: &Local,
        method: &MethodRef,
        args: Vec<Value>,
    ) -> StmtId {
        self.assign(
            lhs,
            Value::Invoke(InvokeExpr {
                kind: InvokeKind::Virtual,
                method: method.clone(),
                base: Some(base.clone()),
                args,
            }),
        )
    }

    pub fn ret(&mut self, value: Value) -> StmtId {
        self.push(StmtKind::Return(value))
    }

    pub fn ret_void(&mut self) -> StmtId {
        self.push(StmtKind::ReturnVoid)
    }

    /// Conditional branch; the target is patched with [`Self::set_target`]
    pub fn if_goto(&mut self, cond: Value) -> StmtId {
        let own = self.next_id();
        self.push(StmtKind::If { cond, target: own })
    }

    pub fn goto(&mut self) -> StmtId {
        let own = self.next_id();
        self.push(StmtKind::Goto(own))
    }

    pub fn set_target(&mut self, branch: StmtId, target: StmtId) {
        match &mut self.builder.program.stmts[branch.0 as usize].kind {
            StmtKind::If { target: t, .. } | StmtKind::Goto(t) => *t = target,
            _ => {}
        }
    }

    pub fn throw(&mut self, value: Value) -> StmtId {
        self.push(StmtKind::Throw(value))
    }

    pub fn nop(&mut self) -> StmtId {
        self.push(StmtKind::Nop)
    }

    /// `local := @caughtexception`
    pub fn catch_into(&mut self, local: &Local) -> StmtId {
        let ty = local.ty().clone();
        self.push(StmtKind::Identity {
            local: local.clone(),
            rhs: Value::CaughtException(ty),
        })
    }

    pub fn trap(&mut self, begin: StmtId, end: StmtId, handler: StmtId, exception: Type) {
        self.method_mut().traps.push(Trap {
            begin,
            end,
            handler,
            exception,
        });
    }

    pub fn finish(self) -> MethodId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_emits_identity_statements() {
        let mut pb = ProgramBuilder::new();
        pb.class("Foo", None);
        let sig = MethodRef::new("Foo", "bar", vec![Type::Int], Type::Void);
        let mut mb = pb.method(&sig, false);
        let this = mb.this_local().unwrap();
        let p0 = mb.param(0).unwrap();
        mb.ret_void();
        let id = mb.finish();
        let program = pb.build();

        let m = program.method(id);
        assert_eq!(m.body.len(), 3);
        assert_eq!(m.this_local.as_ref(), Some(&this));
        assert_eq!(program.stmt(m.body[1]).defined_local(), Some(&p0));
        assert!(program.method_by_signature("<Foo: void bar(int)>").is_some());
    }

    #[test]
    fn test_resolve_in_superclass() {
        let mut pb = ProgramBuilder::new();
        pb.class("Base", None);
        pb.class("Derived", Some("Base"));
        let sig = MethodRef::new("Base", "run", vec![], Type::Void);
        let mut mb = pb.method(&sig, false);
        mb.ret_void();
        mb.finish();
        let program = pb.build();
        let m = program.resolve_in_hierarchy("Derived", "void run()");
        assert_eq!(m.map(|m| m.class()), Some("Base"));
    }

    #[test]
    fn test_branch_target_patching() {
        let mut pb = ProgramBuilder::new();
        let sig = MethodRef::new("Foo", "f", vec![Type::Int], Type::Void);
        let mut mb = pb.method(&sig, true);
        let p = mb.param(0).unwrap();
        let branch = mb.if_goto(Value::Binary {
            op: super::super::values::BinOp::Eq,
            lhs: Box::new(Value::local(&p)),
            rhs: Box::new(Value::int(0)),
        });
        let end = mb.ret_void();
        mb.set_target(branch, end);
        mb.finish();
        let program = pb.build();
        assert!(matches!(program.stmt(branch).kind, StmtKind::If { target, .. } if target == end));
    }
}
