//! Dynamic adapter: one configuration record bound to a live delegate.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, trace};

use pluglet_core::{
    BoxError, Lifecycle, Payload, PayloadType, PluginConfig, PluginError, PluginInstance,
};

use crate::chain::{ChainResult, Link, Next};
use crate::resolver::Resolver;

/// A delegate that consumes payloads of one declared body type.
pub trait PayloadSink: Send + Sync {
    /// The body type this sink deserializes payloads into.
    fn payload_type(&self) -> PayloadType;

    fn accept(&self, payload: Payload) -> BoxFuture<'_, Result<(), BoxError>>;
}

/// Wraps a [`PluginConfig`] and the delegate resolved from it.
///
/// The delegate is built when the adapter is constructed and released when
/// the adapter is disposed or dropped, whichever comes first. Holding the
/// adapter in an `Arc` keeps the delegate alive for in-flight work.
pub struct DynamicAdapter<O: ?Sized + Lifecycle + 'static> {
    config: PluginConfig,
    resolver: Arc<Resolver<O>>,
    delegate: PluginInstance<O>,
    disposed: AtomicBool,
}

impl<O: ?Sized + Lifecycle + 'static> DynamicAdapter<O> {
    /// Parses the record's params and resolves its type code.
    pub fn new(config: PluginConfig, resolver: Arc<Resolver<O>>) -> Result<Self, PluginError> {
        let params = config.param_map()?;
        let delegate = resolver
            .resolve(&config.type_code, &params)
            .map_err(|e| PluginError::for_config(&config.id, &config.type_code, e))?
            .ok_or_else(|| PluginError::UnresolvedPluginType {
                id: config.id.clone(),
                type_code: config.type_code.clone(),
            })?;

        debug!(
            domain = %resolver.domain(),
            id = %config.id,
            plugin = %config.type_code,
            "Plugin adapter ready"
        );
        Ok(Self {
            config,
            resolver,
            delegate,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn priority(&self) -> i32 {
        self.config.priority
    }

    pub fn delegate(&self) -> &O {
        &self.delegate
    }

    /// Releases the delegate through its resolver; later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(id = %self.config.id, plugin = %self.config.type_code, "Disposing plugin adapter");
        self.resolver.destroy(&self.delegate);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<O: ?Sized + Lifecycle + PayloadSink + 'static> DynamicAdapter<O> {
    /// The delegate's declared body type.
    pub fn payload_type(&self) -> PayloadType {
        self.delegate.payload_type()
    }

    /// Forwards a payload, converting it when its type is not the delegate's.
    pub async fn publish(&self, payload: Payload) -> Result<(), BoxError> {
        let expected = self.delegate.payload_type();
        let payload = if payload.payload_type() == expected {
            trace!(id = %self.config.id, body = expected.name(), "Passing payload through");
            payload
        } else {
            debug!(
                id = %self.config.id,
                from = payload.payload_type().name(),
                to = expected.name(),
                "Converting payload"
            );
            payload.into_json()?
        };
        self.delegate.accept(payload).await
    }
}

#[async_trait]
impl<X, O> Link<X> for DynamicAdapter<O>
where
    X: Send + Sync + 'static,
    O: ?Sized + Lifecycle + Link<X> + 'static,
{
    async fn execute(&self, exchange: Arc<X>, next: Next<X>) -> ChainResult {
        self.delegate.execute(exchange, next).await
    }
}

impl<O: ?Sized + Lifecycle + 'static> Drop for DynamicAdapter<O> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<O: ?Sized + Lifecycle + 'static> fmt::Debug for DynamicAdapter<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicAdapter")
            .field("id", &self.config.id)
            .field("type", &self.config.type_code)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
