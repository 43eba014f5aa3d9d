//! Foundation of the Pluglet plugin pipeline.
//!
//! This crate turns persisted, untyped plugin configuration into validated,
//! typed plugin instances:
//!
//! - [`ControlField`] / [`ControlSchema`]: the declarative description of a
//!   plugin type's configurable fields
//! - [`PluginDescriptor`]: the validated control table of one type
//! - [`PlugletFactory`]: validation, coercion, binding and init, with a
//!   per-type descriptor cache
//! - [`PluginInstance`]: a live instance with exactly-once teardown
//! - [`Payload`]: type-tagged message bodies for generic delegates
//! - [`PluginConfig`] / [`PluginConfigRepository`]: persisted records and
//!   where they come from
//!
//! Domain traits, resolvers and chains live in `pluglet-framework`.

pub mod config;
pub mod control;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod instance;
pub mod lifecycle;
pub mod payload;

pub use config::{
    MemoryConfigRepository, ParamMap, PluginConfig, PluginConfigRepository, PluginDomain,
};
pub use control::{ControlField, ControlKind, ControlSchema};
pub use descriptor::PluginDescriptor;
pub use error::{BoxError, PluginError, RepositoryError, SchemaError, ValidationError};
pub use factory::PlugletFactory;
pub use instance::PluginInstance;
pub use lifecycle::{Lifecycle, Pluglet};
pub use payload::{Payload, PayloadType};
