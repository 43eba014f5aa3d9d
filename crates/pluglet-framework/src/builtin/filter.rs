//! Built-in gateway filters.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use pluglet_macros::ControlSchema;
use serde::Deserialize;
use tracing::debug;

use pluglet_core::{BoxError, Lifecycle};

use crate::chain::{ChainResult, Link, Next};
use crate::domain::filter::GatewayExchange;
use crate::exchange::Reply;

// ─── Headers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ControlSchema)]
pub struct AddRequestHeaderFilter {
    #[control(kind = "text", label = "Header", required, pattern = "[!#$%&'*+.^_`|~0-9A-Za-z-]+")]
    name: String,

    #[control(kind = "text", label = "Value", required)]
    value: String,

    #[serde(skip)]
    header: Option<(HeaderName, HeaderValue)>,
}

impl Lifecycle for AddRequestHeaderFilter {
    fn init(&mut self) -> Result<(), BoxError> {
        let name = HeaderName::from_bytes(self.name.as_bytes())?;
        let value = HeaderValue::from_str(&self.value)?;
        self.header = Some((name, value));
        Ok(())
    }
}

#[async_trait]
impl Link<GatewayExchange> for AddRequestHeaderFilter {
    async fn execute(
        &self,
        exchange: Arc<GatewayExchange>,
        next: Next<GatewayExchange>,
    ) -> ChainResult {
        if let Some((name, value)) = &self.header {
            exchange.request_mut().headers.insert(name.clone(), value.clone());
        }
        next.run(exchange).await
    }
}

#[derive(Debug, Deserialize, ControlSchema)]
pub struct RemoveRequestHeaderFilter {
    #[control(kind = "text", label = "Header", required, pattern = "[!#$%&'*+.^_`|~0-9A-Za-z-]+")]
    name: String,
}

impl Lifecycle for RemoveRequestHeaderFilter {
    fn init(&mut self) -> Result<(), BoxError> {
        HeaderName::from_bytes(self.name.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl Link<GatewayExchange> for RemoveRequestHeaderFilter {
    async fn execute(
        &self,
        exchange: Arc<GatewayExchange>,
        next: Next<GatewayExchange>,
    ) -> ChainResult {
        exchange.request_mut().headers.remove(self.name.as_str());
        next.run(exchange).await
    }
}

// ─── Path ─────────────────────────────────────────────────────────────────────

/// Removes leading path segments, e.g. `/api/v1/users` with `parts = 1`
/// becomes `/v1/users`.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct StripPrefixFilter {
    #[control(kind = "number", label = "Parts", default = "1", min = 0, max = 16)]
    parts: usize,
}

impl StripPrefixFilter {
    fn strip(&self, path: &str) -> String {
        let rest: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .skip(self.parts)
            .collect();
        let mut stripped = format!("/{}", rest.join("/"));
        if path.ends_with('/') && !rest.is_empty() {
            stripped.push('/');
        }
        stripped
    }
}

impl Lifecycle for StripPrefixFilter {}

#[async_trait]
impl Link<GatewayExchange> for StripPrefixFilter {
    async fn execute(
        &self,
        exchange: Arc<GatewayExchange>,
        next: Next<GatewayExchange>,
    ) -> ChainResult {
        {
            let mut request = exchange.request_mut();
            request.path = self.strip(&request.path);
        }
        next.run(exchange).await
    }
}

// ─── Guards ───────────────────────────────────────────────────────────────────

/// Rejects requests whose declared body exceeds `max_size` bytes.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct RequestSizeFilter {
    #[control(
        kind = "number",
        label = "Max size",
        comment = "In bytes",
        default = "5242880",
        min = 1
    )]
    max_size: u64,
}

impl Lifecycle for RequestSizeFilter {}

#[async_trait]
impl Link<GatewayExchange> for RequestSizeFilter {
    async fn execute(
        &self,
        exchange: Arc<GatewayExchange>,
        next: Next<GatewayExchange>,
    ) -> ChainResult {
        let declared = exchange.request().content_length.unwrap_or_default();
        if declared > self.max_size {
            debug!(declared, limit = self.max_size, "Request body too large");
            exchange.respond(Reply::text(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("request size {declared} exceeds the limit of {} bytes", self.max_size),
            ));
            return Ok(());
        }
        next.run(exchange).await
    }
}

/// Rejects requests from listed client addresses.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct IpBlacklistFilter {
    #[control(kind = "text", label = "Addresses", comment = "Comma separated", required)]
    addresses: String,

    #[serde(skip)]
    blocked: HashSet<IpAddr>,
}

impl Lifecycle for IpBlacklistFilter {
    fn init(&mut self) -> Result<(), BoxError> {
        for address in self.addresses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let ip: IpAddr = address
                .parse()
                .map_err(|e| format!("invalid address '{address}': {e}"))?;
            self.blocked.insert(ip);
        }
        Ok(())
    }
}

#[async_trait]
impl Link<GatewayExchange> for IpBlacklistFilter {
    async fn execute(
        &self,
        exchange: Arc<GatewayExchange>,
        next: Next<GatewayExchange>,
    ) -> ChainResult {
        let remote = exchange.request().remote_addr;
        if let Some(ip) = remote.filter(|ip| self.blocked.contains(ip)) {
            debug!(%ip, "Blocked client address");
            exchange.respond(Reply::text(StatusCode::FORBIDDEN, "access denied"));
            return Ok(());
        }
        next.run(exchange).await
    }
}
