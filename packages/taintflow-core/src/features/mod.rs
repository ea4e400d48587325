//! Feature modules - Each feature follows Hexagonal Architecture
//!
//! Each feature contains (as needed):
//! - domain/     - Value types
//! - ports/      - Interface definitions (traits)
//! - application/ - Use cases
//! - infrastructure/ - Implementations

pub mod abstraction;
pub mod access_path;
pub mod aliasing;
pub mod ifds_solver;
pub mod taint_analysis;
