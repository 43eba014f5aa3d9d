//! Pluglet Runtime - configuration, logging and the server process.
//!
//! This crate provides:
//! - layered configuration (`ConfigLoader`, `PlugletConfig`)
//! - logging setup (`LoggingBuilder`)
//! - the five domain pipelines behind one factory (`Pipelines`)
//! - runtime orchestration (`PlugletRuntime`): the identity and domain
//!   endpoints, the periodic pipeline refresh and the expired-record sweeper
//!
//! ```ignore
//! use pluglet_runtime::PlugletRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = PlugletRuntime::builder().build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipelines;
pub mod runtime;

pub use api::ApiState;
pub use config::{ConfigError, ConfigLoader, ConfigResult, PlugletConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use pipelines::{DomainPipeline, Pipelines, RefreshSummary};
pub use runtime::{PlugletRuntime, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;
