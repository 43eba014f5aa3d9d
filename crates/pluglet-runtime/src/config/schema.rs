//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use pluglet_core::{PluginConfig, PluginDomain};
use pluglet_security::{Account, Application, SecuritySettings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlugletConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Client applications allowed to use the authorization endpoints.
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Plugin configuration rows of every tenant and domain.
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

impl PlugletConfig {
    /// Plugin rows as repository records; rows without a tenant belong to
    /// the default tenant.
    pub fn plugin_configs(&self) -> Vec<PluginConfig> {
        self.plugins
            .iter()
            .map(|entry| entry.to_plugin_config(&self.security.default_tenant))
            .collect()
    }

    /// Security settings with the external URL taken from `[server]`.
    pub fn security_settings(&self) -> SecuritySettings {
        let security = &self.security;
        SecuritySettings {
            default_tenant: security.default_tenant.clone(),
            external_url: self.server.external_url(),
            login_path: security.login_path.clone(),
            session_cookie: security.session_cookie.clone(),
            transaction_cookie: security.transaction_cookie.clone(),
            session_timeout: Duration::from_secs(security.session_timeout_minutes * 60),
            session_issuer: security.session_issuer.clone(),
            oauth_enabled: security.oauth_enabled,
            auto_granting: security.auto_granting,
            code_timeout: Duration::from_secs(security.code_timeout_secs),
            transaction_timeout: Duration::from_secs(security.transaction_timeout_secs),
        }
    }
}

// ─── Server ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Base URL clients reach the server at; defaults to `http://{bind}`.
    #[serde(default)]
    pub external_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            external_url: None,
        }
    }
}

impl ServerConfig {
    pub fn external_url(&self) -> String {
        self.external_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.bind))
    }
}

fn default_bind() -> String {
    "127.0.0.1:3100".to_string()
}

// ─── Logging ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When a log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target levels, e.g. `pluglet_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: BTreeMap::new(),
        }
    }
}

// ─── Security ─────────────────────────────────────────────────────────────────

/// Process-wide security fallbacks; tenant strategies override most of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_tenant")]
    pub default_tenant: String,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    #[serde(default = "default_transaction_cookie")]
    pub transaction_cookie: String,

    #[serde(default = "default_session_timeout_minutes")]
    pub session_timeout_minutes: u64,

    #[serde(default = "default_session_issuer")]
    pub session_issuer: String,

    #[serde(default = "default_true")]
    pub oauth_enabled: bool,

    #[serde(default)]
    pub auto_granting: bool,

    #[serde(default = "default_code_timeout_secs")]
    pub code_timeout_secs: u64,

    #[serde(default = "default_transaction_timeout_secs")]
    pub transaction_timeout_secs: u64,

    /// How often expired codes, transactions and sessions are purged.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            default_tenant: default_tenant(),
            login_path: default_login_path(),
            session_cookie: default_session_cookie(),
            transaction_cookie: default_transaction_cookie(),
            session_timeout_minutes: default_session_timeout_minutes(),
            session_issuer: default_session_issuer(),
            oauth_enabled: true,
            auto_granting: false,
            code_timeout_secs: default_code_timeout_secs(),
            transaction_timeout_secs: default_transaction_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_tenant() -> String {
    "master".to_string()
}

fn default_login_path() -> String {
    "/sso/login".to_string()
}

fn default_session_cookie() -> String {
    "Authorization".to_string()
}

fn default_transaction_cookie() -> String {
    "oauth_transaction".to_string()
}

fn default_session_timeout_minutes() -> u64 {
    30
}

fn default_session_issuer() -> String {
    "com.central-x.security".to_string()
}

fn default_code_timeout_secs() -> u64 {
    180
}

fn default_transaction_timeout_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

// ─── Refresh ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between pipeline refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    30
}

// ─── Directory ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Owning tenant; the default tenant when omitted.
    #[serde(default)]
    pub tenant: Option<String>,
    pub code: String,
    pub name: String,
    pub secret: String,
    pub url: String,
    #[serde(default)]
    pub context_path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ApplicationConfig {
    pub fn to_application(&self) -> Application {
        Application {
            code: self.code.clone(),
            name: self.name.clone(),
            secret: self.secret.clone(),
            url: self.url.clone(),
            context_path: self.context_path.clone(),
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub tenant: Option<String>,
    pub id: String,
    pub username: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

impl AccountConfig {
    pub fn to_account(&self) -> Account {
        Account {
            id: self.id.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            email: self.email.clone(),
            mobile: self.mobile.clone(),
        }
    }
}

// ─── Plugins ──────────────────────────────────────────────────────────────────

/// One `[[plugins]]` row.
///
/// ```toml
/// [[plugins]]
/// id = "password"
/// domain = "strategy"
/// type = "password"
/// params = { min = 8, max = 20, uppercase = 1 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    pub id: String,
    #[serde(default)]
    pub tenant: Option<String>,
    pub domain: PluginDomain,
    #[serde(rename = "type")]
    pub type_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl PluginEntry {
    pub fn to_plugin_config(&self, default_tenant: &str) -> PluginConfig {
        PluginConfig {
            id: self.id.clone(),
            tenant_code: self.tenant.clone().unwrap_or_else(|| default_tenant.to_string()),
            domain: self.domain,
            type_code: self.type_code.clone(),
            name: self.name.clone(),
            params: Value::Object(self.params.clone()).to_string(),
            priority: self.priority,
            enabled: self.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plugin_rows_fall_back_to_the_default_tenant() {
        let mut params = Map::new();
        params.insert("min".into(), json!(10));
        let config = PlugletConfig {
            plugins: vec![PluginEntry {
                id: "pw".into(),
                tenant: None,
                domain: PluginDomain::Strategy,
                type_code: "password".into(),
                name: String::new(),
                params,
                priority: 1,
                enabled: true,
            }],
            ..Default::default()
        };

        let records = config.plugin_configs();
        assert_eq!(records[0].tenant_code, "master");
        assert_eq!(records[0].params, r#"{"min":10}"#);
        assert_eq!(records[0].param_map().unwrap().get("min"), Some(&json!(10)));
    }

    #[test]
    fn external_url_defaults_to_the_bind_address() {
        let mut config = PlugletConfig::default();
        assert_eq!(config.security_settings().external_url, "http://127.0.0.1:3100");

        config.server.external_url = Some("https://sso.example.com".into());
        config.security.session_timeout_minutes = 5;
        let settings = config.security_settings();
        assert_eq!(settings.external_url, "https://sso.example.com");
        assert_eq!(settings.session_timeout, Duration::from_secs(300));
    }
}
