//! Access path construction and canonicalization

pub mod base_register;
pub mod factory;
pub mod reduction;

pub use base_register::{BasePattern, BaseRegister};
pub use factory::{AccessPathFactory, AccessPathRequest};
