/*
 * Taintflow Core - Interprocedural Taint Analysis
 *
 * Field- and flow-sensitive, context-sensitive IFDS taint tracking with an
 * on-demand backward alias search.
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Program IR (types, values, statements, class hierarchy)
 * - config/      : InfoflowConfig (presets, YAML, validation)
 * - features/    : access_path -> abstraction -> ifds_solver -> aliasing -> taint_analysis
 * - errors.rs    : setup errors
 *
 * Concurrency:
 * - Forward and alias solvers share one rayon pool per run
 * - Timeout and memory watchers stop both solvers and keep partial results
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Flow functions mirror the IFDS edge signature
#![allow(clippy::type_complexity)] // Nested fact tables
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::unnecessary_map_or)] // map_or style for compatibility

/// Shared models and utilities
pub mod shared;

/// Analysis features
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{InfoflowConfig, Preset};
pub use errors::{InfoflowError, Result};
pub use features::ifds_solver::TerminationState;
pub use features::taint_analysis::{Infoflow, InfoflowResults};
