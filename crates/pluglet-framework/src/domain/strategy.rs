//! Security strategies: chain links run in front of every identity endpoint.
//!
//! Strategies do not answer requests themselves as a rule; they publish
//! tenant policy (password rules, session lifetime, OAuth switches) as typed
//! [`Attribute`]s on the [`SecurityExchange`] for the endpoint to read.

use std::sync::Arc;

use http::header::{AUTHORIZATION, COOKIE};
use http::{HeaderMap, Method};
use parking_lot::Mutex;

use pluglet_core::{Lifecycle, PlugletFactory, PluginDomain};

use crate::builtin::strategy::{OAuthStrategy, PasswordStrategy, SessionStrategy};
use crate::chain::{ChainResult, Link, Terminal};
use crate::exchange::{Attribute, Attributes, Reply};
use crate::pipeline::{Pipeline, UnresolvedPolicy};
use crate::resolver::Resolver;

/// The identity request as seen by strategies and endpoints.
#[derive(Debug, Clone)]
pub struct SecurityRequest {
    pub method: Method,
    /// Absolute URL of the request as the client sent it.
    pub url: String,
    pub headers: HeaderMap,
    /// Query and form parameters, in order of appearance.
    pub params: Vec<(String, String)>,
}

impl SecurityRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// First value of a parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Every value of a parameter.
    pub fn param_values(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Value of a request cookie.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Token of an `Authorization: Bearer` header.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
            .filter(|t| !t.is_empty())
    }
}

/// Per-request state shared by the strategy chain and the endpoint.
#[derive(Debug)]
pub struct SecurityExchange {
    tenant_code: String,
    request: SecurityRequest,
    attributes: Attributes,
    reply: Mutex<Option<Reply>>,
}

impl SecurityExchange {
    pub fn new(tenant_code: impl Into<String>, request: SecurityRequest) -> Self {
        Self {
            tenant_code: tenant_code.into(),
            request,
            attributes: Attributes::new(),
            reply: Mutex::new(None),
        }
    }

    pub fn tenant_code(&self) -> &str {
        &self.tenant_code
    }

    pub fn request(&self) -> &SecurityRequest {
        &self.request
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute<T: Clone + Send + Sync + 'static>(&self, attribute: &Attribute<T>) -> T {
        self.attributes.get(attribute)
    }

    pub fn respond(&self, reply: Reply) {
        *self.reply.lock() = Some(reply);
    }

    pub fn take_reply(&self) -> Option<Reply> {
        self.reply.lock().take()
    }
}

/// A security strategy; implement [`Lifecycle`] and `Link<SecurityExchange>`.
pub trait Strategy: Lifecycle + Link<SecurityExchange> {}

impl<T: Lifecycle + Link<SecurityExchange>> Strategy for T {}

pub fn erase_strategy<T: Strategy + 'static>(strategy: Box<T>) -> Box<dyn Strategy> {
    strategy
}

/// Resolver with the built-in strategies.
pub fn strategy_resolver(factory: Arc<PlugletFactory>) -> Resolver<dyn Strategy> {
    Resolver::new(PluginDomain::Strategy, factory)
        .register::<PasswordStrategy>("password", "Password", erase_strategy)
        .register::<SessionStrategy>("session", "Session", erase_strategy)
        .register::<OAuthStrategy>("oauth", "OAuth 2.0", erase_strategy)
}

pub type StrategyPipeline = Pipeline<dyn Strategy>;

/// Strategy pipelines fail fast: a tenant never runs with a partial
/// security policy.
pub fn strategy_pipeline(factory: Arc<PlugletFactory>) -> StrategyPipeline {
    Pipeline::new(Arc::new(strategy_resolver(factory)), UnresolvedPolicy::FailFast)
}

/// Runs the tenant's strategies in front of `endpoint`.
pub async fn dispatch_security(
    pipeline: &StrategyPipeline,
    exchange: Arc<SecurityExchange>,
    endpoint: Terminal<SecurityExchange>,
) -> ChainResult {
    let snapshot = pipeline.snapshot(exchange.tenant_code());
    snapshot.chain(endpoint).execute(exchange).await
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn reads_cookies_and_bearer_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; Authorization=tok; empty="));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer AT-123"));
        let request =
            SecurityRequest::new(Method::GET, "https://sso.example.com/").with_headers(headers);

        assert_eq!(request.cookie("Authorization"), Some("tok"));
        assert_eq!(request.cookie("a"), Some("1"));
        assert_eq!(request.cookie("empty"), None);
        assert_eq!(request.cookie("missing"), None);
        assert_eq!(request.bearer_token(), Some("AT-123"));
    }

    #[test]
    fn repeated_params_are_kept() {
        let request = SecurityRequest::new(Method::POST, "https://sso.example.com/")
            .with_param("scopes", "basic")
            .with_param("scopes", "contact");
        assert_eq!(request.param("scopes"), Some("basic"));
        assert_eq!(request.param_values("scopes"), vec!["basic", "contact"]);
    }
}
