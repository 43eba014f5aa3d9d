//! Error types for pipelines.

use thiserror::Error;

use pluglet_core::{PluginDomain, PluginError, RepositoryError};

/// A refresh could not produce a new snapshot set.
///
/// When this is returned the previously published snapshots stay live.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{domain} plugin for tenant '{tenant}' failed to load: {source}")]
    Plugin {
        domain: PluginDomain,
        tenant: String,
        #[source]
        source: PluginError,
    },
}
