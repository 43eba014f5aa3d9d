//! Configuration validation utilities.

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, PlugletConfig, PluginEntry, SecurityConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &PlugletConfig) -> ConfigResult<()> {
    validate_server(config)?;
    validate_logging(config)?;
    validate_security(&config.security)?;
    if config.refresh.interval_secs == 0 {
        return Err(ConfigError::validation("Refresh interval must be greater than 0"));
    }
    validate_directory(config)?;
    validate_plugins(&config.plugins)?;
    Ok(())
}

fn validate_server(config: &PlugletConfig) -> ConfigResult<()> {
    if config.server.bind.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::InvalidAddress(config.server.bind.clone()));
    }

    let external = config.server.external_url();
    let url =
        Url::parse(&external).map_err(|e| ConfigError::invalid_url(&external, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid_url(external, "scheme must be http or https"));
    }
    Ok(())
}

fn validate_logging(config: &PlugletConfig) -> ConfigResult<()> {
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_security(security: &SecurityConfig) -> ConfigResult<()> {
    if security.default_tenant.trim().is_empty() {
        return Err(ConfigError::missing_field("security.default_tenant"));
    }
    if !security.login_path.starts_with('/') {
        return Err(ConfigError::validation(format!(
            "Login path must start with '/': {}",
            security.login_path
        )));
    }
    if security.session_cookie.is_empty() || security.transaction_cookie.is_empty() {
        return Err(ConfigError::validation("Cookie names must not be empty"));
    }
    if security.session_cookie == security.transaction_cookie {
        return Err(ConfigError::validation(
            "Session and transaction cookies must have different names",
        ));
    }

    let timeouts = [
        ("security.session_timeout_minutes", security.session_timeout_minutes),
        ("security.code_timeout_secs", security.code_timeout_secs),
        ("security.transaction_timeout_secs", security.transaction_timeout_secs),
        ("security.sweep_interval_secs", security.sweep_interval_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::validation(format!("{field} must be greater than 0")));
        }
    }
    Ok(())
}

fn validate_directory(config: &PlugletConfig) -> ConfigResult<()> {
    let default_tenant = config.security.default_tenant.as_str();

    let mut applications = HashSet::new();
    for app in &config.applications {
        let tenant = app.tenant.as_deref().unwrap_or(default_tenant);
        if app.code.is_empty() {
            return Err(ConfigError::missing_field("applications.code"));
        }
        if !applications.insert((tenant, app.code.as_str())) {
            return Err(ConfigError::DuplicateEntry {
                kind: "application",
                tenant: tenant.to_string(),
                key: app.code.clone(),
            });
        }
        Url::parse(&app.url).map_err(|e| ConfigError::invalid_url(&app.url, e.to_string()))?;
    }

    let mut ids = HashSet::new();
    let mut usernames = HashSet::new();
    for account in &config.accounts {
        let tenant = account.tenant.as_deref().unwrap_or(default_tenant);
        if account.id.is_empty() {
            return Err(ConfigError::missing_field("accounts.id"));
        }
        if !ids.insert((tenant, account.id.as_str())) {
            return Err(ConfigError::DuplicateEntry {
                kind: "account",
                tenant: tenant.to_string(),
                key: account.id.clone(),
            });
        }
        if !usernames.insert((tenant, account.username.as_str())) {
            return Err(ConfigError::DuplicateEntry {
                kind: "username",
                tenant: tenant.to_string(),
                key: account.username.clone(),
            });
        }
    }
    Ok(())
}

/// Row-level checks only; parameters are validated when a pipeline
/// resolves the row.
fn validate_plugins(plugins: &[PluginEntry]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for plugin in plugins {
        if plugin.id.trim().is_empty() {
            return Err(ConfigError::missing_field("plugins.id"));
        }
        if plugin.type_code.trim().is_empty() {
            return Err(ConfigError::missing_field(format!("plugins[{}].type", plugin.id)));
        }
        if !seen.insert(plugin.id.as_str()) {
            return Err(ConfigError::DuplicatePluginId(plugin.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pluglet_core::PluginDomain;
    use serde_json::Map;

    use super::*;
    use crate::config::schema::{AccountConfig, ApplicationConfig};

    fn plugin(id: &str) -> PluginEntry {
        PluginEntry {
            id: id.into(),
            tenant: None,
            domain: PluginDomain::Filter,
            type_code: "strip_prefix".into(),
            name: String::new(),
            params: Map::new(),
            priority: 0,
            enabled: true,
        }
    }

    fn account(id: &str, username: &str) -> AccountConfig {
        AccountConfig {
            tenant: None,
            id: id.into(),
            username: username.into(),
            name: username.into(),
            password: "x.123456".into(),
            avatar: None,
            email: None,
            mobile: None,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&PlugletConfig::default()).is_ok());
    }

    #[test]
    fn bind_address_must_parse() {
        let mut config = PlugletConfig::default();
        config.server.bind = "localhost".into();
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn external_url_must_be_http() {
        let mut config = PlugletConfig::default();
        config.server.external_url = Some("ftp://sso.example.com".into());
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn file_output_needs_a_path() {
        let mut config = PlugletConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "logging.file_path"
        ));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut config = PlugletConfig::default();
        config.security.sweep_interval_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = PlugletConfig::default();
        config.refresh.interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn duplicate_plugin_ids_are_rejected() {
        let config = PlugletConfig {
            plugins: vec![plugin("a"), plugin("b"), plugin("a")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicatePluginId(ref id)) if id == "a"
        ));
    }

    #[test]
    fn accounts_are_unique_per_tenant() {
        let mut other = account("2", "syssa");
        other.tenant = Some("acme".into());
        let config = PlugletConfig {
            accounts: vec![account("1", "syssa"), other],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());

        let config = PlugletConfig {
            accounts: vec![account("1", "syssa"), account("2", "syssa")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateEntry { kind: "username", .. })
        ));
    }

    #[test]
    fn application_url_must_parse() {
        let config = PlugletConfig {
            applications: vec![ApplicationConfig {
                tenant: None,
                code: "crm".into(),
                name: "CRM".into(),
                secret: "s".into(),
                url: "not a url".into(),
                context_path: String::new(),
                enabled: true,
            }],
            ..Default::default()
        };
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidUrl { .. })));
    }
}
