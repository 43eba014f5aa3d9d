//! # Pluglet Framework
//!
//! Plugin domains on top of `pluglet-core`.
//!
//! This layer provides:
//! - [`Resolver`]: the registry of plugin types of one domain
//! - [`DynamicAdapter`]: one configuration record bound to a live instance
//! - [`Pipeline`]: per-tenant snapshots with copy-on-write refresh
//! - [`Chain`]: ordered chain-of-responsibility over an exchange, also
//!   usable as a tower `Service` or `Layer`
//! - the filter, predicate, storage, broadcaster and strategy domains with
//!   their built-in plugin types

pub mod adapter;
pub mod builtin;
pub mod chain;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod pipeline;
pub mod resolver;

pub use adapter::{DynamicAdapter, PayloadSink};
pub use chain::{
    Chain, ChainEntry, ChainLayer, ChainResult, ChainService, FnLink, Link, Next, Terminal,
    noop_terminal,
};
pub use domain::broadcaster::{
    Broadcaster, BroadcasterObject, BroadcasterPipeline, Multicast, MulticastError, StandardBody,
    broadcaster_pipeline, broadcaster_resolver,
};
pub use domain::collector::{CollectReport, LogCollector};
pub use domain::filter::{
    Filter, FilterPipeline, GatewayExchange, GatewayRequest, filter_pipeline, filter_request,
    filter_resolver,
};
pub use domain::log::{LogLevel, LogRecord};
pub use domain::predicate::{Predicate, PredicatePipeline, predicate_pipeline, predicate_resolver};
pub use domain::storage::{Storage, StoragePipeline, storage_pipeline, storage_resolver};
pub use domain::strategy::{
    SecurityExchange, SecurityRequest, Strategy, StrategyPipeline, dispatch_security,
    strategy_pipeline, strategy_resolver,
};
pub use error::PipelineError;
pub use exchange::{Attribute, Attributes, Reply};
pub use pipeline::{Pipeline, RefreshReport, Snapshot, UnresolvedPolicy};
pub use resolver::{PluginType, Resolver};
