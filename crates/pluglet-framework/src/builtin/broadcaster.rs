//! Built-in broadcasters.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use pluglet_macros::ControlSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use pluglet_core::{BoxError, Lifecycle};

use crate::domain::broadcaster::{Broadcaster, StandardBody};

/// Message body of the [`LogBroadcaster`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Debug,
    Info,
    Warn,
}

/// Writes messages to the service log.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct LogBroadcaster {
    #[control(kind = "select", label = "Level", default = "info", values("debug", "info", "warn"))]
    level: Level,

    #[control(kind = "text", label = "Prefix", default = "[multicast]", max = 32)]
    prefix: String,
}

impl LogBroadcaster {
    fn emit(&self, title: &str, content: &str) {
        match self.level {
            Level::Debug => debug!(title, "{} {}", self.prefix, content),
            Level::Info => info!(title, "{} {}", self.prefix, content),
            Level::Warn => warn!(title, "{} {}", self.prefix, content),
        }
    }
}

impl Lifecycle for LogBroadcaster {}

#[async_trait]
impl Broadcaster for LogBroadcaster {
    type Body = LogMessage;

    async fn standard_publish(&self, body: StandardBody) -> Result<(), BoxError> {
        self.emit(&body.subject, &body.content);
        Ok(())
    }

    async fn custom_publish(&self, body: LogMessage) -> Result<(), BoxError> {
        self.emit(&body.title, &body.content);
        Ok(())
    }
}

/// Retains the latest messages in memory.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct MemoryBroadcaster {
    #[control(kind = "number", label = "Capacity", default = "100", min = 1, max = 10000)]
    capacity: usize,

    #[serde(skip)]
    messages: Mutex<VecDeque<Value>>,
}

impl MemoryBroadcaster {
    pub fn messages(&self) -> Vec<Value> {
        self.messages.lock().iter().cloned().collect()
    }

    fn push(&self, message: Value) {
        let mut messages = self.messages.lock();
        if messages.len() == self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }
}

impl Lifecycle for MemoryBroadcaster {
    fn destroy(&self) {
        self.messages.lock().clear();
    }
}

#[async_trait]
impl Broadcaster for MemoryBroadcaster {
    type Body = Value;

    async fn standard_publish(&self, body: StandardBody) -> Result<(), BoxError> {
        self.push(serde_json::to_value(body)?);
        Ok(())
    }

    async fn custom_publish(&self, body: Value) -> Result<(), BoxError> {
        self.push(body);
        Ok(())
    }
}
