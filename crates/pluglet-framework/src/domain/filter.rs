//! Gateway filters: chain links over an incoming HTTP request.

use std::net::IpAddr;
use std::sync::Arc;

use http::{HeaderMap, Method};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pluglet_core::{Lifecycle, PlugletFactory, PluginDomain};

use crate::builtin::filter::{
    AddRequestHeaderFilter, IpBlacklistFilter, RemoveRequestHeaderFilter, RequestSizeFilter,
    StripPrefixFilter,
};
use crate::chain::{ChainResult, Link, Terminal};
use crate::exchange::{Attributes, Reply};
use crate::pipeline::{Pipeline, UnresolvedPolicy};
use crate::resolver::Resolver;

/// The request as forwarded upstream; filters may rewrite it.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub remote_addr: Option<IpAddr>,
    pub content_length: Option<u64>,
}

impl GatewayRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            remote_addr: None,
            content_length: None,
        }
    }
}

/// Per-request state shared by the filter chain.
#[derive(Debug)]
pub struct GatewayExchange {
    tenant_code: String,
    request: RwLock<GatewayRequest>,
    reply: Mutex<Option<Reply>>,
    attributes: Attributes,
}

impl GatewayExchange {
    pub fn new(tenant_code: impl Into<String>, request: GatewayRequest) -> Self {
        Self {
            tenant_code: tenant_code.into(),
            request: RwLock::new(request),
            reply: Mutex::new(None),
            attributes: Attributes::new(),
        }
    }

    pub fn tenant_code(&self) -> &str {
        &self.tenant_code
    }

    pub fn request(&self) -> RwLockReadGuard<'_, GatewayRequest> {
        self.request.read()
    }

    pub fn request_mut(&self) -> RwLockWriteGuard<'_, GatewayRequest> {
        self.request.write()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Sets the response; used by filters that short-circuit.
    pub fn respond(&self, reply: Reply) {
        *self.reply.lock() = Some(reply);
    }

    pub fn reply(&self) -> Option<Reply> {
        self.reply.lock().clone()
    }
}

/// A gateway filter.
///
/// Implement [`Lifecycle`] and `Link<GatewayExchange>`; this trait is
/// implemented automatically.
pub trait Filter: Lifecycle + Link<GatewayExchange> {}

impl<T: Lifecycle + Link<GatewayExchange>> Filter for T {}

pub fn erase_filter<T: Filter + 'static>(filter: Box<T>) -> Box<dyn Filter> {
    filter
}

/// Resolver with the built-in gateway filters.
pub fn filter_resolver(factory: Arc<PlugletFactory>) -> Resolver<dyn Filter> {
    Resolver::new(PluginDomain::Filter, factory)
        .register::<AddRequestHeaderFilter>(
            "add_request_header",
            "Add Request Header",
            erase_filter,
        )
        .register::<RemoveRequestHeaderFilter>(
            "remove_request_header",
            "Remove Request Header",
            erase_filter,
        )
        .register::<StripPrefixFilter>("strip_prefix", "Strip Prefix", erase_filter)
        .register::<RequestSizeFilter>("request_size", "Request Size", erase_filter)
        .register::<IpBlacklistFilter>("ip_blacklist", "IP Blacklist", erase_filter)
}

pub type FilterPipeline = Pipeline<dyn Filter>;

pub fn filter_pipeline(factory: Arc<PlugletFactory>) -> FilterPipeline {
    Pipeline::new(Arc::new(filter_resolver(factory)), UnresolvedPolicy::SkipAndLog)
}

/// Runs the tenant's filters in front of `upstream`.
pub async fn filter_request(
    pipeline: &FilterPipeline,
    exchange: Arc<GatewayExchange>,
    upstream: Terminal<GatewayExchange>,
) -> ChainResult {
    let snapshot = pipeline.snapshot(exchange.tenant_code());
    snapshot.chain(upstream).execute(exchange).await
}
