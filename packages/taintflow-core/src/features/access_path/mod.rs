// Access paths
//
// Architecture:
// - domain/         : AccessPath value type, fragments, array taint kinds
// - infrastructure/ : factory (canonicalization pipeline, interning),
//                     reductions and the recursive base register

pub mod domain;
pub mod infrastructure;

pub use domain::{AccessPath, AccessPathFragment, ApRef, ArrayTaintType};
pub use infrastructure::{AccessPathFactory, AccessPathRequest};
