//! Analysis configuration
//!
//! Configuration is an explicit value handed to the analysis driver and
//! shared read-only with every component. Three levels of control:
//! - Preset: `InfoflowConfig::from_preset(Preset::Fast)`
//! - Builder overrides: `InfoflowConfig::default().with_access_path_length(3)`
//! - YAML: `InfoflowConfig::from_yaml_str(text)`

pub mod error;
pub mod infoflow_config;

pub use error::{ConfigError, ConfigResult};
pub use infoflow_config::{
    AccessPathConfig, AliasingAlgorithm, ImplicitFlowMode, InfoflowConfig, PathConfig, Preset,
    SolverConfig, StaticFieldTrackingMode,
};
