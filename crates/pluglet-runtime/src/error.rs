//! Runtime error types.

use thiserror::Error;

use pluglet_framework::PipelineError;

use crate::config::ConfigError;

/// Errors that can occur while starting or running the server.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A pipeline could not be refreshed, e.g. a strategy failed to build.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
