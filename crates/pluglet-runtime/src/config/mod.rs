//! Layered configuration: defaults, files, environment, overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AccountConfig, ApplicationConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    PlugletConfig, PluginEntry, RefreshConfig, SecurityConfig, ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
