//! Multicast broadcasters: deliver messages to an external channel.
//!
//! A [`Broadcaster`] declares its own body type; the adapter converts any
//! published [`Payload`] into that type before delivery. Every broadcaster
//! also accepts the channel-neutral [`StandardBody`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use pluglet_core::{BoxError, Lifecycle, Payload, PayloadType, PlugletFactory, PluginDomain};

use crate::adapter::PayloadSink;
use crate::builtin::broadcaster::{LogBroadcaster, MemoryBroadcaster};
use crate::pipeline::{Pipeline, UnresolvedPolicy};
use crate::resolver::Resolver;

/// Channel-neutral message understood by every broadcaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardBody {
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[async_trait]
pub trait Broadcaster: Lifecycle {
    /// The channel-specific message type.
    type Body: Serialize + DeserializeOwned + Send + 'static;

    async fn standard_publish(&self, body: StandardBody) -> Result<(), BoxError>;

    async fn custom_publish(&self, body: Self::Body) -> Result<(), BoxError>;
}

/// Object-safe form of [`Broadcaster`], implemented for every broadcaster.
pub trait BroadcasterObject: Lifecycle + PayloadSink {
    fn standard(&self, body: StandardBody) -> BoxFuture<'_, Result<(), BoxError>>;
}

impl<T: Broadcaster> PayloadSink for T {
    fn payload_type(&self) -> PayloadType {
        PayloadType::of::<T::Body>()
    }

    fn accept(&self, payload: Payload) -> BoxFuture<'_, Result<(), BoxError>> {
        async move {
            let body: T::Body = payload.into_body()?;
            self.custom_publish(body).await
        }
        .boxed()
    }
}

impl<T: Broadcaster> BroadcasterObject for T {
    fn standard(&self, body: StandardBody) -> BoxFuture<'_, Result<(), BoxError>> {
        self.standard_publish(body)
    }
}

pub fn erase_broadcaster<T: Broadcaster + 'static>(
    broadcaster: Box<T>,
) -> Box<dyn BroadcasterObject> {
    broadcaster
}

/// Resolver with the built-in broadcasters.
pub fn broadcaster_resolver(factory: Arc<PlugletFactory>) -> Resolver<dyn BroadcasterObject> {
    Resolver::new(PluginDomain::Broadcaster, factory)
        .register::<LogBroadcaster>("log", "Log", erase_broadcaster)
        .register::<MemoryBroadcaster>("memory", "Memory", erase_broadcaster)
}

pub type BroadcasterPipeline = Pipeline<dyn BroadcasterObject>;

pub fn broadcaster_pipeline(factory: Arc<PlugletFactory>) -> BroadcasterPipeline {
    Pipeline::new(Arc::new(broadcaster_resolver(factory)), UnresolvedPolicy::SkipAndLog)
}

#[derive(Debug, Error)]
pub enum MulticastError {
    #[error("tenant '{tenant}' has no broadcaster '{id}'")]
    NotFound { tenant: String, id: String },

    #[error("broadcaster '{id}' failed: {source}")]
    Delivery {
        id: String,
        #[source]
        source: BoxError,
    },
}

/// Publishes messages through a tenant's configured broadcasters.
#[derive(Debug, Clone)]
pub struct Multicast {
    pipeline: Arc<BroadcasterPipeline>,
}

impl Multicast {
    pub fn new(pipeline: Arc<BroadcasterPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<BroadcasterPipeline> {
        &self.pipeline
    }

    /// Publishes a channel-specific payload through broadcaster `id`.
    pub async fn publish(
        &self,
        tenant_code: &str,
        id: &str,
        payload: Payload,
    ) -> Result<(), MulticastError> {
        let snapshot = self.pipeline.snapshot(tenant_code);
        let adapter = snapshot.find(id).ok_or_else(|| MulticastError::NotFound {
            tenant: tenant_code.to_owned(),
            id: id.to_owned(),
        })?;
        debug!(tenant = tenant_code, broadcaster = id, "Publishing custom message");
        adapter.publish(payload).await.map_err(|source| MulticastError::Delivery {
            id: id.to_owned(),
            source,
        })
    }

    /// Publishes a standard message through broadcaster `id`.
    pub async fn publish_standard(
        &self,
        tenant_code: &str,
        id: &str,
        body: StandardBody,
    ) -> Result<(), MulticastError> {
        let snapshot = self.pipeline.snapshot(tenant_code);
        let adapter = snapshot.find(id).ok_or_else(|| MulticastError::NotFound {
            tenant: tenant_code.to_owned(),
            id: id.to_owned(),
        })?;
        debug!(tenant = tenant_code, broadcaster = id, "Publishing standard message");
        adapter.delegate().standard(body).await.map_err(|source| MulticastError::Delivery {
            id: id.to_owned(),
            source,
        })
    }
}
