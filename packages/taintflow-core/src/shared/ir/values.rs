//! Values and expressions of the three-address IR

use super::types::Type;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// Method-local variable
///
/// Identity is the program-wide unique id; name and type are carried for
/// display and type checks.
#[derive(Debug, Clone)]
pub struct Local {
    id: LocalId,
    name: Arc<str>,
    ty: Type,
}

impl Local {
    pub fn new(id: LocalId, name: &str, ty: Type) -> Self {
        Self {
            id,
            name: Arc::from(name),
            ty,
        }
    }

    pub fn id(&self) -> LocalId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl PartialEq for Local {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Local {}

impl Hash for Local {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct FieldSig {
    declaring_class: Arc<str>,
    name: Arc<str>,
    ty: Type,
    is_static: bool,
}

/// Field signature, shared by all references to the same field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field(Arc<FieldSig>);

impl Field {
    pub fn new(declaring_class: &str, name: &str, ty: Type, is_static: bool) -> Self {
        Field(Arc::new(FieldSig {
            declaring_class: Arc::from(declaring_class),
            name: Arc::from(name),
            ty,
            is_static,
        }))
    }

    pub fn instance(declaring_class: &str, name: &str, ty: Type) -> Self {
        Self::new(declaring_class, name, ty, false)
    }

    pub fn static_field(declaring_class: &str, name: &str, ty: Type) -> Self {
        Self::new(declaring_class, name, ty, true)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn declaring_class(&self) -> &str {
        &self.0.declaring_class
    }

    pub fn declaring_type(&self) -> Type {
        Type::Ref(self.0.declaring_class.clone())
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn is_static(&self) -> bool {
        self.0.is_static
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {} {}>", self.0.declaring_class, self.0.ty, self.0.name)
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct MethodSig {
    declaring_class: Arc<str>,
    name: Arc<str>,
    params: Vec<Type>,
    ret: Type,
}

/// Reference to a method signature as it appears at an invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef(Arc<MethodSig>);

impl MethodRef {
    pub fn new(declaring_class: &str, name: &str, params: Vec<Type>, ret: Type) -> Self {
        MethodRef(Arc::new(MethodSig {
            declaring_class: Arc::from(declaring_class),
            name: Arc::from(name),
            params,
            ret,
        }))
    }

    pub fn declaring_class(&self) -> &str {
        &self.0.declaring_class
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn params(&self) -> &[Type] {
        &self.0.params
    }

    pub fn return_type(&self) -> &Type {
        &self.0.ret
    }

    /// `ret name(params)`, the dispatch key
    pub fn sub_signature(&self) -> String {
        let params: Vec<String> = self.0.params.iter().map(|p| p.to_string()).collect();
        format!("{} {}({})", self.0.ret, self.0.name, params.join(","))
    }

    /// `<Class: ret name(params)>`
    pub fn signature(&self) -> String {
        format!("<{}: {}>", self.0.declaring_class, self.sub_signature())
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Int(i64),
    Str(Arc<str>),
    Class(Arc<str>),
    Null,
}

impl Constant {
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int(_) => Type::Int,
            Constant::Str(_) => Type::string(),
            Constant::Class(_) => Type::class("java.lang.Class"),
            Constant::Null => Type::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    /// Three-way comparison (`cmp`, `cmpl`, `cmpg`)
    Cmp,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn is_condition(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_comparison(self) -> bool {
        self == BinOp::Cmp
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Cmp => "cmp",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Virtual,
    Interface,
    Special,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokeExpr {
    pub kind: InvokeKind,
    pub method: MethodRef,
    /// Receiver for instance invocations
    pub base: Option<Local>,
    pub args: Vec<Value>,
}

impl InvokeExpr {
    pub fn is_instance(&self) -> bool {
        self.base.is_some()
    }

    pub fn arg(&self, idx: usize) -> Option<&Value> {
        self.args.get(idx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Local(Local),
    InstanceField { base: Local, field: Field },
    StaticField(Field),
    ArrayRef { base: Local, index: Box<Value> },
    Constant(Constant),
    Cast { cast_type: Type, op: Box<Value> },
    InstanceOf { op: Box<Value>, check_type: Type },
    Length(Box<Value>),
    New(Type),
    NewArray { element_type: Type, size: Box<Value> },
    Binary { op: BinOp, lhs: Box<Value>, rhs: Box<Value> },
    Negate(Box<Value>),
    Invoke(InvokeExpr),
    /// `@this` reference in identity statements
    This(Type),
    /// `@parameterN` reference in identity statements
    Parameter { index: usize, ty: Type },
    /// `@caughtexception` reference in identity statements
    CaughtException(Type),
}

impl Value {
    pub fn local(l: &Local) -> Self {
        Value::Local(l.clone())
    }

    pub fn field(base: &Local, field: &Field) -> Self {
        Value::InstanceField {
            base: base.clone(),
            field: field.clone(),
        }
    }

    pub fn int(v: i64) -> Self {
        Value::Constant(Constant::Int(v))
    }

    pub fn string(s: &str) -> Self {
        Value::Constant(Constant::Str(Arc::from(s)))
    }

    pub fn null() -> Self {
        Value::Constant(Constant::Null)
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Local(l) => l.ty().clone(),
            Value::InstanceField { field, .. } | Value::StaticField(field) => field.ty().clone(),
            Value::ArrayRef { base, .. } => base
                .ty()
                .element_type()
                .cloned()
                .unwrap_or_else(Type::object),
            Value::Constant(c) => c.ty(),
            Value::Cast { cast_type, .. } => cast_type.clone(),
            Value::InstanceOf { .. } => Type::Boolean,
            Value::Length(_) => Type::Int,
            Value::New(t) => t.clone(),
            Value::NewArray { element_type, .. } => Type::array_of(element_type.clone()),
            Value::Binary { op, lhs, .. } => {
                if op.is_comparison() {
                    Type::Int
                } else if op.is_condition() {
                    Type::Boolean
                } else {
                    lhs.ty()
                }
            }
            Value::Negate(v) => v.ty(),
            Value::Invoke(inv) => inv.method.return_type().clone(),
            Value::This(t) | Value::CaughtException(t) => t.clone(),
            Value::Parameter { ty, .. } => ty.clone(),
        }
    }

    pub fn as_local(&self) -> Option<&Local> {
        match self {
            Value::Local(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }

    pub fn is_field_ref(&self) -> bool {
        matches!(self, Value::InstanceField { .. } | Value::StaticField(_))
    }

    /// Locals, field references and array references can hold taint
    pub fn can_contain_value(&self) -> bool {
        matches!(
            self,
            Value::Local(_)
                | Value::InstanceField { .. }
                | Value::StaticField(_)
                | Value::ArrayRef { .. }
        )
    }

    /// Local at the root of a reference, if any
    pub fn base_local(&self) -> Option<&Local> {
        match self {
            Value::Local(l) => Some(l),
            Value::InstanceField { base, .. } | Value::ArrayRef { base, .. } => Some(base),
            _ => None,
        }
    }

    /// Collects all values read when evaluating this value, excluding itself
    pub fn collect_uses(&self, out: &mut Vec<Value>) {
        match self {
            Value::InstanceField { base, .. } => out.push(Value::Local(base.clone())),
            Value::ArrayRef { base, index } => {
                out.push(Value::Local(base.clone()));
                out.push((**index).clone());
                index.collect_uses(out);
            }
            Value::Cast { op, .. }
            | Value::InstanceOf { op, .. }
            | Value::Length(op)
            | Value::Negate(op)
            | Value::NewArray { size: op, .. } => {
                out.push((**op).clone());
                op.collect_uses(out);
            }
            Value::Binary { lhs, rhs, .. } => {
                out.push((**lhs).clone());
                lhs.collect_uses(out);
                out.push((**rhs).clone());
                rhs.collect_uses(out);
            }
            Value::Invoke(inv) => {
                if let Some(b) = &inv.base {
                    out.push(Value::Local(b.clone()));
                }
                for a in &inv.args {
                    out.push(a.clone());
                    a.collect_uses(out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Local(l) => write!(f, "{}", l),
            Value::InstanceField { base, field } => write!(f, "{}.{}", base, field.name()),
            Value::StaticField(field) => write!(f, "{}", field),
            Value::ArrayRef { base, index } => write!(f, "{}[{}]", base, index),
            Value::Constant(Constant::Int(v)) => write!(f, "{}", v),
            Value::Constant(Constant::Str(s)) => write!(f, "\"{}\"", s),
            Value::Constant(Constant::Class(c)) => write!(f, "class \"{}\"", c),
            Value::Constant(Constant::Null) => write!(f, "null"),
            Value::Cast { cast_type, op } => write!(f, "({}) {}", cast_type, op),
            Value::InstanceOf { op, check_type } => write!(f, "{} instanceof {}", op, check_type),
            Value::Length(op) => write!(f, "lengthof {}", op),
            Value::New(t) => write!(f, "new {}", t),
            Value::NewArray { element_type, size } => write!(f, "newarray ({})[{}]", element_type, size),
            Value::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Value::Negate(v) => write!(f, "neg {}", v),
            Value::Invoke(inv) => {
                let args: Vec<String> = inv.args.iter().map(|a| a.to_string()).collect();
                match &inv.base {
                    Some(b) => write!(f, "{}.{}({})", b, inv.method.name(), args.join(", ")),
                    None => write!(
                        f,
                        "{}.{}({})",
                        inv.method.declaring_class(),
                        inv.method.name(),
                        args.join(", ")
                    ),
                }
            }
            Value::This(_) => write!(f, "@this"),
            Value::Parameter { index, .. } => write!(f, "@parameter{}", index),
            Value::CaughtException(_) => write!(f, "@caughtexception"),
        }
    }
}
