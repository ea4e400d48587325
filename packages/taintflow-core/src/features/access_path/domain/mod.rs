//! Access path domain types

pub mod access_path;

pub use access_path::{AccessPath, AccessPathFragment, ApRef, ArrayTaintType};
