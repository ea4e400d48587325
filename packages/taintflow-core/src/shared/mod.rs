//! Shared building blocks used by every feature

pub mod ir;
pub mod macros;
