//! Shared pieces of chain exchanges: typed attributes and replies.
//!
//! An exchange is created once per request and passed to every link as an
//! `Arc`, so everything a link may change lives behind interior mutability.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, LOCATION, SET_COOKIE};
use http::{HeaderMap, StatusCode};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

// ─── Attributes ───────────────────────────────────────────────────────────────

/// A typed attribute key with its fallback value.
///
/// ```ignore
/// pub const TIMEOUT: Attribute<u64> = Attribute::new("session.timeout", || 30);
/// ```
pub struct Attribute<T> {
    key: &'static str,
    default: fn() -> T,
}

impl<T> Attribute<T> {
    pub const fn new(key: &'static str, default: fn() -> T) -> Self {
        Self { key, default }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Attribute").field(&self.key).finish()
    }
}

/// Per-exchange attribute storage written by links and read downstream.
#[derive(Default)]
pub struct Attributes {
    values: RwLock<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Send + Sync + 'static>(&self, attribute: &Attribute<T>, value: T) {
        self.values.write().insert(attribute.key, Box::new(value));
    }

    /// The stored value, or the attribute's default when unset.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, attribute: &Attribute<T>) -> T {
        let values = self.values.read();
        match values.get(attribute.key).map(|v| v.downcast_ref::<T>()) {
            Some(Some(value)) => value.clone(),
            Some(None) => {
                warn!(attribute = attribute.key, "Attribute holds a value of another type");
                attribute.default_value()
            }
            None => attribute.default_value(),
        }
    }

    pub fn contains<T>(&self, attribute: &Attribute<T>) -> bool {
        self.values.read().contains_key(attribute.key)
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.read().keys()).finish()
    }
}

// ─── Reply ────────────────────────────────────────────────────────────────────

/// A transport-neutral response produced by a link or a terminal handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    /// `302 Found` to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::new(StatusCode::FOUND).with_header(LOCATION, location)
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut reply = Self::new(status).with_header(CONTENT_TYPE, "text/plain; charset=utf-8");
        reply.body = body.into();
        reply
    }

    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_string(body) {
            Ok(body) => {
                let mut reply = Self::new(status).with_header(CONTENT_TYPE, "application/json");
                reply.body = body;
                reply
            }
            Err(e) => Self::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    /// Adds a header; values that are not valid header text are dropped.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => warn!(header = %name, "Dropping invalid header value"),
        }
        self
    }

    pub fn with_cookie(self, cookie: &str) -> Self {
        self.with_header(SET_COOKIE, cookie)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}
