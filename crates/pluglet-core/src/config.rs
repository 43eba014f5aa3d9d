//! Persisted plugin configuration records and their repository.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PluginError, RepositoryError};

/// Untyped plugin parameters as stored in a configuration record.
pub type ParamMap = serde_json::Map<String, Value>;

/// The service area a plugin configuration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginDomain {
    Filter,
    Predicate,
    Storage,
    Broadcaster,
    Strategy,
}

impl PluginDomain {
    pub const ALL: [PluginDomain; 5] = [
        Self::Filter,
        Self::Predicate,
        Self::Storage,
        Self::Broadcaster,
        Self::Strategy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Predicate => "predicate",
            Self::Storage => "storage",
            Self::Broadcaster => "broadcaster",
            Self::Strategy => "strategy",
        }
    }
}

impl fmt::Display for PluginDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted plugin instance: which type to build, with which
/// parameters, for which tenant, at which position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub id: String,
    pub tenant_code: String,
    pub domain: PluginDomain,
    #[serde(rename = "type")]
    pub type_code: String,
    #[serde(default)]
    pub name: String,
    /// Raw JSON text of the parameter object.
    #[serde(default)]
    pub params: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl PluginConfig {
    /// Parses the stored parameters. Blank text yields an empty map.
    pub fn param_map(&self) -> Result<ParamMap, PluginError> {
        if self.params.trim().is_empty() {
            return Ok(ParamMap::new());
        }
        match serde_json::from_str::<Value>(&self.params) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(ParamMap::new()),
            Ok(other) => Err(PluginError::MalformedParams {
                id: self.id.clone(),
                message: format!("expected an object, found {other}"),
            }),
            Err(e) => Err(PluginError::MalformedParams {
                id: self.id.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// Source of plugin configuration records.
#[async_trait]
pub trait PluginConfigRepository: Send + Sync {
    /// Every tenant that currently has configuration.
    async fn tenants(&self) -> Result<Vec<String>, RepositoryError>;

    /// Enabled records of one tenant and domain, in any order.
    async fn list_enabled_by_tenant(
        &self,
        tenant_code: &str,
        domain: PluginDomain,
    ) -> Result<Vec<PluginConfig>, RepositoryError>;
}

/// A repository over an in-memory record set, replaceable at runtime.
#[derive(Debug, Default)]
pub struct MemoryConfigRepository {
    records: RwLock<Vec<PluginConfig>>,
}

impl MemoryConfigRepository {
    pub fn new(records: Vec<PluginConfig>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Replaces the whole record set; picked up by the next refresh.
    pub fn replace(&self, records: Vec<PluginConfig>) {
        *self.records.write() = records;
    }

    /// Inserts a record or replaces the one with the same id.
    pub fn upsert(&self, record: PluginConfig) {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn remove(&self, id: &str) -> Option<PluginConfig> {
        let mut records = self.records.write();
        let pos = records.iter().position(|r| r.id == id)?;
        Some(records.remove(pos))
    }
}

#[async_trait]
impl PluginConfigRepository for MemoryConfigRepository {
    async fn tenants(&self) -> Result<Vec<String>, RepositoryError> {
        let tenants: BTreeSet<String> = self
            .records
            .read()
            .iter()
            .map(|r| r.tenant_code.clone())
            .collect();
        Ok(tenants.into_iter().collect())
    }

    async fn list_enabled_by_tenant(
        &self,
        tenant_code: &str,
        domain: PluginDomain,
    ) -> Result<Vec<PluginConfig>, RepositoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.enabled && r.domain == domain && r.tenant_code == tenant_code)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, tenant: &str, domain: PluginDomain, enabled: bool) -> PluginConfig {
        PluginConfig {
            id: id.into(),
            tenant_code: tenant.into(),
            domain,
            type_code: "level".into(),
            name: String::new(),
            params: String::new(),
            priority: 0,
            enabled,
        }
    }

    #[test]
    fn blank_params_parse_to_an_empty_map() {
        let mut config = record("1", "master", PluginDomain::Predicate, true);
        assert!(config.param_map().unwrap().is_empty());

        config.params = "  ".into();
        assert!(config.param_map().unwrap().is_empty());

        config.params = r#"{"levels": "info"}"#.into();
        assert_eq!(config.param_map().unwrap().len(), 1);

        config.params = "[1, 2]".into();
        assert!(matches!(
            config.param_map(),
            Err(PluginError::MalformedParams { .. })
        ));
    }

    #[test]
    fn deserializes_camel_case_rows() {
        let config: PluginConfig = serde_json::from_str(
            r#"{"id":"7","tenantCode":"master","domain":"strategy","type":"password"}"#,
        )
        .unwrap();
        assert_eq!(config.type_code, "password");
        assert!(config.enabled);
        assert_eq!(config.priority, 0);
    }

    #[tokio::test]
    async fn lists_only_enabled_records_of_the_domain() {
        let repo = MemoryConfigRepository::new(vec![
            record("1", "master", PluginDomain::Predicate, true),
            record("2", "master", PluginDomain::Predicate, false),
            record("3", "master", PluginDomain::Storage, true),
            record("4", "other", PluginDomain::Predicate, true),
        ]);

        let listed = repo
            .list_enabled_by_tenant("master", PluginDomain::Predicate)
            .await
            .unwrap();
        assert_eq!(listed.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(repo.tenants().await.unwrap(), vec!["master", "other"]);

        repo.upsert(record("2", "master", PluginDomain::Predicate, true));
        assert_eq!(
            repo.list_enabled_by_tenant("master", PluginDomain::Predicate)
                .await
                .unwrap()
                .len(),
            2
        );
    }
}
