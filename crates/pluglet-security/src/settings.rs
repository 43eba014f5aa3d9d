//! Process-wide security settings and how strategy attributes override them.

use std::time::Duration;

use pluglet_framework::{Attribute, SecurityExchange};

/// Fallbacks for every tenant whose strategies leave a value unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuritySettings {
    /// Tenant used when a request carries no `X-Tenant-Code` header.
    pub default_tenant: String,
    /// Base URL clients see, used to rebuild full request URLs.
    pub external_url: String,
    pub login_path: String,
    pub session_cookie: String,
    pub transaction_cookie: String,
    pub session_timeout: Duration,
    pub session_issuer: String,
    pub oauth_enabled: bool,
    pub auto_granting: bool,
    pub code_timeout: Duration,
    pub transaction_timeout: Duration,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            default_tenant: "master".to_owned(),
            external_url: "http://127.0.0.1:3100".to_owned(),
            login_path: "/sso/login".to_owned(),
            session_cookie: "Authorization".to_owned(),
            transaction_cookie: "oauth_transaction".to_owned(),
            session_timeout: Duration::from_secs(30 * 60),
            session_issuer: "com.central-x.security".to_owned(),
            oauth_enabled: true,
            auto_granting: false,
            code_timeout: Duration::from_secs(180),
            transaction_timeout: Duration::from_secs(300),
        }
    }
}

impl SecuritySettings {
    /// External base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.external_url.trim_end_matches('/')
    }
}

/// The value a strategy published on the exchange, else `fallback`.
pub(crate) fn resolve<T>(exchange: &SecurityExchange, attribute: &Attribute<T>, fallback: &T) -> T
where
    T: Clone + Send + Sync + 'static,
{
    if exchange.attributes().contains(attribute) {
        exchange.attribute(attribute)
    } else {
        fallback.clone()
    }
}
