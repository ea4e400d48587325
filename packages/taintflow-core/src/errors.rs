//! Error types for taintflow-core
//!
//! Only setup problems are errors. Running out of time or memory is reported
//! through the termination state of the results instead.

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfoflowError {
    /// Invalid or contradictory configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The program or a collaborator cannot be analyzed
    #[error("Setup error: {0}")]
    Setup(String),

    /// The worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl InfoflowError {
    pub fn setup(msg: impl Into<String>) -> Self {
        InfoflowError::Setup(msg.into())
    }
}

/// Result type alias for analysis setup
pub type Result<T> = std::result::Result<T, InfoflowError>;
