//! Statements

use super::values::{InvokeExpr, Local, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// `l := @this`, `l := @parameterN`, `l := @caughtexception`
    Identity { local: Local, rhs: Value },
    Assign { lhs: Value, rhs: Value },
    Invoke(InvokeExpr),
    Return(Value),
    ReturnVoid,
    If { cond: Value, target: StmtId },
    Goto(StmtId),
    Throw(Value),
    Nop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub id: StmtId,
    pub method: MethodId,
    pub kind: StmtKind,
}

impl Stmt {
    /// Identity or assignment
    pub fn is_definition(&self) -> bool {
        matches!(self.kind, StmtKind::Identity { .. } | StmtKind::Assign { .. })
    }

    pub fn is_assign(&self) -> bool {
        matches!(self.kind, StmtKind::Assign { .. })
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, StmtKind::Identity { .. })
    }

    pub fn left_op(&self) -> Option<Value> {
        match &self.kind {
            StmtKind::Identity { local, .. } => Some(Value::Local(local.clone())),
            StmtKind::Assign { lhs, .. } => Some(lhs.clone()),
            _ => None,
        }
    }

    pub fn right_op(&self) -> Option<&Value> {
        match &self.kind {
            StmtKind::Identity { rhs, .. } | StmtKind::Assign { rhs, .. } => Some(rhs),
            _ => None,
        }
    }

    pub fn invoke_expr(&self) -> Option<&InvokeExpr> {
        match &self.kind {
            StmtKind::Invoke(inv) => Some(inv),
            StmtKind::Assign {
                rhs: Value::Invoke(inv),
                ..
            } => Some(inv),
            _ => None,
        }
    }

    pub fn contains_invoke(&self) -> bool {
        self.invoke_expr().is_some()
    }

    /// Value returned by a `return x` statement
    pub fn return_op(&self) -> Option<&Value> {
        match &self.kind {
            StmtKind::Return(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_) | StmtKind::ReturnVoid)
    }

    pub fn is_throw(&self) -> bool {
        matches!(self.kind, StmtKind::Throw(_))
    }

    /// Identity statement receiving a caught exception
    pub fn is_caught_exception_def(&self) -> bool {
        matches!(
            &self.kind,
            StmtKind::Identity {
                rhs: Value::CaughtException(_),
                ..
            }
        )
    }

    /// Every value read by this statement, including nested sub-expressions
    pub fn uses(&self) -> Vec<Value> {
        let mut out = Vec::new();
        match &self.kind {
            StmtKind::Identity { rhs, .. } => out.push(rhs.clone()),
            StmtKind::Assign { lhs, rhs } => {
                lhs.collect_uses(&mut out);
                out.push(rhs.clone());
                rhs.collect_uses(&mut out);
            }
            StmtKind::Invoke(inv) => {
                let v = Value::Invoke(inv.clone());
                v.collect_uses(&mut out);
                out.push(v);
            }
            StmtKind::Return(v) | StmtKind::Throw(v) | StmtKind::If { cond: v, .. } => {
                out.push(v.clone());
                v.collect_uses(&mut out);
            }
            StmtKind::ReturnVoid | StmtKind::Goto(_) | StmtKind::Nop => {}
        }
        out
    }

    /// Locals written by this statement
    pub fn defined_local(&self) -> Option<&Local> {
        match &self.kind {
            StmtKind::Identity { local, .. } => Some(local),
            StmtKind::Assign {
                lhs: Value::Local(l),
                ..
            } => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Identity { local, rhs } => write!(f, "{} := {}", local, rhs),
            StmtKind::Assign { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            StmtKind::Invoke(inv) => write!(f, "{}", Value::Invoke(inv.clone())),
            StmtKind::Return(v) => write!(f, "return {}", v),
            StmtKind::ReturnVoid => write!(f, "return"),
            StmtKind::If { cond, target } => write!(f, "if {} goto {}", cond, target),
            StmtKind::Goto(target) => write!(f, "goto {}", target),
            StmtKind::Throw(v) => write!(f, "throw {}", v),
            StmtKind::Nop => write!(f, "nop"),
        }
    }
}
