/*
 * Program IR
 *
 * Typed three-address code the analysis runs on:
 * - types      : primitive, class, array and null types
 * - hierarchy  : class hierarchy, assignment compatibility, type narrowing
 * - values     : locals, fields, references, expressions, invocations
 * - stmt       : statements (identity, assign, invoke, return, branch, throw)
 * - program    : methods, traps, programs and the builder
 */

pub mod hierarchy;
pub mod program;
pub mod stmt;
pub mod types;
pub mod values;

pub use hierarchy::{ClassHierarchy, ClassInfo};
pub use program::{Method, MethodBuilder, Program, ProgramBuilder, Trap};
pub use stmt::{MethodId, Stmt, StmtId, StmtKind};
pub use types::Type;
pub use values::{
    BinOp, Constant, Field, InvokeExpr, InvokeKind, Local, LocalId, MethodRef, Value,
};
