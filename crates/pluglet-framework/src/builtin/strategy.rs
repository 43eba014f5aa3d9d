//! Built-in security strategies and the attributes they publish.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pluglet_macros::ControlSchema;
use serde::Deserialize;

use pluglet_core::{BoxError, Lifecycle};

use crate::chain::{ChainResult, Link, Next};
use crate::domain::strategy::SecurityExchange;

/// Attribute keys written by the built-in strategies.
pub mod attributes {
    pub mod password {
        use std::sync::Arc;

        use crate::builtin::strategy::PasswordPolicy;
        use crate::exchange::Attribute;

        /// `None` when the tenant has no password strategy.
        pub const POLICY: Attribute<Option<Arc<PasswordPolicy>>> =
            Attribute::new("password.policy", || None);
    }

    pub mod session {
        use std::time::Duration;

        use crate::exchange::Attribute;

        pub const TIMEOUT: Attribute<Duration> =
            Attribute::new("session.timeout", || Duration::from_secs(30 * 60));
        pub const ISSUER: Attribute<String> =
            Attribute::new("session.issuer", || "com.central-x.security".to_owned());
    }

    pub mod oauth {
        use std::time::Duration;

        use crate::exchange::Attribute;

        pub const ENABLED: Attribute<bool> = Attribute::new("oauth.enabled", || true);
        pub const AUTO_GRANTING: Attribute<bool> = Attribute::new("oauth.auto_granting", || false);
        pub const CODE_TIMEOUT: Attribute<Duration> =
            Attribute::new("oauth.code_timeout", || Duration::from_secs(180));
        pub const TRANSACTION_TIMEOUT: Attribute<Duration> =
            Attribute::new("oauth.transaction_timeout", || Duration::from_secs(300));
    }
}

// ─── Password ─────────────────────────────────────────────────────────────────

/// Password composition rules of a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min: usize,
    pub max: usize,
    pub uppercase: usize,
    pub lowercase: usize,
    pub numbers: usize,
    pub symbols: usize,
    pub symbol_set: HashSet<char>,
}

impl PasswordPolicy {
    /// Every rule the password breaks; empty when it complies.
    pub fn check(&self, password: &str) -> Vec<String> {
        let mut violations = Vec::new();
        let length = password.chars().count();
        if length < self.min || length > self.max {
            violations.push(format!("length must be between {} and {}", self.min, self.max));
        }

        let count = |f: &dyn Fn(char) -> bool| password.chars().filter(|c| f(*c)).count();
        let rules = [
            (count(&|c| c.is_ascii_uppercase()), self.uppercase, "uppercase letters"),
            (count(&|c| c.is_ascii_lowercase()), self.lowercase, "lowercase letters"),
            (count(&|c| c.is_ascii_digit()), self.numbers, "digits"),
            (count(&|c| self.symbol_set.contains(&c)), self.symbols, "symbols"),
        ];
        for (found, required, what) in rules {
            if found < required {
                violations.push(format!("at least {required} {what} required"));
            }
        }

        let unsupported: String = password
            .chars()
            .filter(|c| !c.is_ascii_alphanumeric() && !self.symbol_set.contains(c))
            .collect();
        if !unsupported.is_empty() {
            violations.push(format!("unsupported characters: {unsupported}"));
        }
        violations
    }
}

#[derive(Debug, Deserialize, ControlSchema)]
pub struct PasswordStrategy {
    // Only rendered in the control table.
    #[allow(dead_code)]
    #[control(
        kind = "label",
        label = "Notice",
        default = "Rules applied when an account sets or changes its password"
    )]
    notice: String,

    #[control(kind = "number", label = "Min length", default = "8", min = 6, max = 32)]
    min: usize,

    #[control(kind = "number", label = "Max length", default = "16", min = 6, max = 32)]
    max: usize,

    #[control(kind = "number", label = "Uppercase letters", default = "0", min = 0, max = 32)]
    uppercase: usize,

    #[control(kind = "number", label = "Lowercase letters", default = "0", min = 0, max = 32)]
    lowercase: usize,

    #[control(kind = "number", label = "Digits", default = "0", min = 0, max = 32)]
    numbers: usize,

    #[control(kind = "number", label = "Symbols", default = "0", min = 0, max = 32)]
    symbols: usize,

    #[control(
        kind = "text",
        label = "Symbol set",
        default = "\\!\"#$%&'()*+,-./:;<>=?@[]_^`{}~|",
        required
    )]
    symbol_set: String,

    #[serde(skip)]
    policy: Option<Arc<PasswordPolicy>>,
}

impl Lifecycle for PasswordStrategy {
    fn init(&mut self) -> Result<(), BoxError> {
        if self.min > self.max {
            return Err(format!("min length {} exceeds max length {}", self.min, self.max).into());
        }
        let required = self.uppercase + self.lowercase + self.numbers + self.symbols;
        if required > self.max {
            return Err(
                format!("{required} required characters exceed max length {}", self.max).into(),
            );
        }
        self.policy = Some(Arc::new(PasswordPolicy {
            min: self.min,
            max: self.max,
            uppercase: self.uppercase,
            lowercase: self.lowercase,
            numbers: self.numbers,
            symbols: self.symbols,
            symbol_set: self.symbol_set.chars().collect(),
        }));
        Ok(())
    }
}

#[async_trait]
impl Link<SecurityExchange> for PasswordStrategy {
    async fn execute(
        &self,
        exchange: Arc<SecurityExchange>,
        next: Next<SecurityExchange>,
    ) -> ChainResult {
        exchange.attributes().set(&attributes::password::POLICY, self.policy.clone());
        next.run(exchange).await
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ControlSchema)]
pub struct SessionStrategy {
    #[control(
        kind = "number",
        label = "Timeout",
        comment = "In minutes",
        default = "30",
        min = 1,
        max = 43200
    )]
    timeout: u64,

    #[control(
        kind = "text",
        label = "Issuer",
        default = "com.central-x.security",
        required,
        max = 128
    )]
    issuer: String,
}

impl Lifecycle for SessionStrategy {}

#[async_trait]
impl Link<SecurityExchange> for SessionStrategy {
    async fn execute(
        &self,
        exchange: Arc<SecurityExchange>,
        next: Next<SecurityExchange>,
    ) -> ChainResult {
        let attrs = exchange.attributes();
        attrs.set(&attributes::session::TIMEOUT, Duration::from_secs(self.timeout * 60));
        attrs.set(&attributes::session::ISSUER, self.issuer.clone());
        next.run(exchange).await
    }
}

// ─── OAuth ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ControlSchema)]
pub struct OAuthStrategy {
    #[control(kind = "checkbox", label = "Enabled", default = "true")]
    enabled: bool,

    #[control(
        kind = "checkbox",
        label = "Auto granting",
        comment = "Skip the consent page and grant every requested scope",
        default = "false"
    )]
    auto_granting: bool,

    #[control(
        kind = "number",
        label = "Code timeout",
        comment = "In seconds",
        default = "180",
        min = 10,
        max = 3600
    )]
    code_timeout: u64,

    #[control(
        kind = "number",
        label = "Consent timeout",
        comment = "In seconds",
        default = "300",
        min = 30,
        max = 3600
    )]
    transaction_timeout: u64,
}

impl Lifecycle for OAuthStrategy {}

#[async_trait]
impl Link<SecurityExchange> for OAuthStrategy {
    async fn execute(
        &self,
        exchange: Arc<SecurityExchange>,
        next: Next<SecurityExchange>,
    ) -> ChainResult {
        let attrs = exchange.attributes();
        attrs.set(&attributes::oauth::ENABLED, self.enabled);
        attrs.set(&attributes::oauth::AUTO_GRANTING, self.auto_granting);
        attrs.set(&attributes::oauth::CODE_TIMEOUT, Duration::from_secs(self.code_timeout));
        attrs.set(
            &attributes::oauth::TRANSACTION_TIMEOUT,
            Duration::from_secs(self.transaction_timeout),
        );
        next.run(exchange).await
    }
}

#[cfg(test)]
mod tests {
    use pluglet_core::{ParamMap, PlugletFactory, PluginError};
    use serde_json::json;

    use super::*;

    fn params(value: serde_json::Value) -> ParamMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn password_defaults_are_valid() {
        let factory = PlugletFactory::new();
        let strategy = factory.create::<PasswordStrategy>(&ParamMap::new()).unwrap();
        let policy = strategy.policy.clone().unwrap();
        assert_eq!((policy.min, policy.max), (8, 16));
        assert!(policy.symbol_set.contains(&'~'));
        assert_eq!(strategy.notice, "Rules applied when an account sets or changes its password");
    }

    #[test]
    fn password_min_below_bound_is_rejected() {
        let factory = PlugletFactory::new();
        let err = factory
            .create::<PasswordStrategy>(&params(json!({"min": 4})))
            .unwrap_err();
        assert_eq!(err.validation().map(|v| v.field()), Some("min"));
    }

    #[test]
    fn password_min_above_max_fails_init() {
        let factory = PlugletFactory::new();
        let err = factory
            .create::<PasswordStrategy>(&params(json!({"min": 20, "max": 10})))
            .unwrap_err();
        assert!(matches!(err, PluginError::Initialization { .. }));
    }

    #[test]
    fn policy_reports_each_broken_rule() {
        let factory = PlugletFactory::new();
        let strategy = factory
            .create::<PasswordStrategy>(&params(json!({"uppercase": 1, "numbers": "2"})))
            .unwrap();
        let policy = strategy.policy.clone().unwrap();

        assert!(policy.check("Secret12").is_empty());
        let violations = policy.check("secret");
        assert_eq!(violations.len(), 3, "{violations:?}");
        assert!(policy.check("Secret12 ").iter().any(|v| v.starts_with("unsupported")));
    }
}
