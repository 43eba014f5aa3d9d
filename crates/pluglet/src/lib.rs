//! # Pluglet
//!
//! A multi-tenant plugin pipeline with a built-in identity server.
//!
//! ## Overview
//!
//! Plugins are described by configuration records stored per tenant. Each
//! record names a registered plugin type and carries its parameters; the
//! pipelines resolve the records into live instances and run them as
//! ordered chains:
//!
//! ```text
//! ┌────────────┐     ┌──────────┐     ┌──────────────────────────────┐
//! │ Repository │────▶│ Pipeline │────▶│ Snapshot (tenant "master")   │──▶ chain
//! │  (records) │     │ + Resolver────▶│ Snapshot (tenant "acme")     │──▶ chain
//! └────────────┘     └──────────┘     └──────────────────────────────┘
//! ```
//!
//! - **Core**: records, control schemas, descriptors and the factory
//! - **Framework**: resolvers, dynamic adapters, chains and the five domains
//!   (filter, predicate, storage, broadcaster, strategy)
//! - **Security**: accounts, sessions and the OAuth 2.0 authorization flow
//! - **Runtime**: configuration, logging and the HTTP server
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pluglet::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = PlugletRuntime::builder()
//!         .config_file("pluglet.toml")
//!         .build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use pluglet_core as core;
pub use pluglet_framework as framework;
pub use pluglet_runtime as runtime;
pub use pluglet_security as security;

pub use pluglet_macros::ControlSchema;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use pluglet::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use pluglet_runtime::{PlugletConfig, PlugletRuntime, RuntimeBuilder};

    // Plugin records and schemas
    pub use pluglet_core::{
        ControlField, ControlKind, ControlSchema, Lifecycle, Payload, PluginConfig,
        PluginConfigRepository, PluginDomain, PluginError, Pluglet,
    };
    pub use pluglet_macros::ControlSchema;

    // Pipelines
    pub use pluglet_framework::{Pipeline, PluginType, Resolver, Snapshot};

    // Domain contracts - for writing plugins
    pub use pluglet_framework::{
        Broadcaster, Filter, GatewayExchange, LogRecord, Predicate, Reply, SecurityExchange,
        Storage, Strategy,
    };
}
