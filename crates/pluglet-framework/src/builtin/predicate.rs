//! Built-in log predicates.

use std::collections::HashSet;

use pluglet_macros::ControlSchema;
use regex::Regex;
use serde::Deserialize;

use pluglet_core::{BoxError, Lifecycle};

use crate::domain::log::{LogLevel, LogRecord};
use crate::domain::predicate::Predicate;

/// Keeps records whose level is one of the selected levels.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct LevelPredicate {
    #[control(
        kind = "checkbox",
        label = "Levels",
        comment = "Records at these levels are kept",
        default = "info",
        required,
        min = 1,
        values("trace", "debug", "info", "warn", "error")
    )]
    levels: Vec<LogLevel>,

    #[serde(skip)]
    accepted: HashSet<LogLevel>,
}

impl Lifecycle for LevelPredicate {
    fn init(&mut self) -> Result<(), BoxError> {
        self.accepted = self.levels.iter().copied().collect();
        Ok(())
    }
}

impl Predicate for LevelPredicate {
    fn test(&self, record: &LogRecord) -> bool {
        self.accepted.contains(&record.level)
    }
}

/// Keeps records of the listed tenants.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct TenantPredicate {
    #[control(kind = "text", label = "Tenants", comment = "Comma separated tenant codes", required)]
    tenants: String,

    #[serde(skip)]
    accepted: HashSet<String>,
}

impl Lifecycle for TenantPredicate {
    fn init(&mut self) -> Result<(), BoxError> {
        self.accepted = self
            .tenants
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        if self.accepted.is_empty() {
            return Err("no tenant code given".into());
        }
        Ok(())
    }
}

impl Predicate for TenantPredicate {
    fn test(&self, record: &LogRecord) -> bool {
        self.accepted.contains(&record.tenant_code)
    }
}

/// Keeps records whose logger name matches a regex.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct LoggerPredicate {
    #[control(
        kind = "text",
        label = "Pattern",
        comment = "Regular expression on the logger name",
        required
    )]
    pattern: String,

    #[control(
        kind = "checkbox",
        label = "Exclude",
        comment = "Drop matches instead of keeping them",
        default = "false"
    )]
    exclude: bool,

    #[serde(skip)]
    regex: Option<Regex>,
}

impl Lifecycle for LoggerPredicate {
    fn init(&mut self) -> Result<(), BoxError> {
        self.regex = Some(Regex::new(&self.pattern)?);
        Ok(())
    }
}

impl Predicate for LoggerPredicate {
    fn test(&self, record: &LogRecord) -> bool {
        let matched = self.regex.as_ref().is_some_and(|re| re.is_match(&record.logger));
        matched != self.exclude
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pluglet_core::{ParamMap, PlugletFactory, PluginError};
    use serde_json::json;

    use super::*;

    fn params(value: serde_json::Value) -> ParamMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn record(level: LogLevel, logger: &str) -> LogRecord {
        LogRecord::new("master", level, logger, "message")
    }

    #[test]
    fn level_defaults_to_info() {
        let factory = Arc::new(PlugletFactory::new());
        let predicate = factory.create::<LevelPredicate>(&ParamMap::new()).unwrap();
        assert!(predicate.test(&record(LogLevel::Info, "app")));
        assert!(!predicate.test(&record(LogLevel::Debug, "app")));
    }

    #[test]
    fn level_accepts_a_comma_list() {
        let factory = PlugletFactory::new();
        let predicate = factory
            .create::<LevelPredicate>(&params(json!({"levels": "warn,error"})))
            .unwrap();
        assert!(predicate.test(&record(LogLevel::Error, "app")));
        assert!(!predicate.test(&record(LogLevel::Info, "app")));
    }

    #[test]
    fn level_rejects_unknown_levels() {
        let factory = PlugletFactory::new();
        let err = factory
            .create::<LevelPredicate>(&params(json!({"levels": ["fatal"]})))
            .unwrap_err();
        assert!(matches!(err, PluginError::Configuration { .. }));
    }

    #[test]
    fn logger_pattern_and_exclusion() {
        let factory = PlugletFactory::new();
        let keep = factory
            .create::<LoggerPredicate>(&params(json!({"pattern": "^security::"})))
            .unwrap();
        let drop = factory
            .create::<LoggerPredicate>(&params(json!({"pattern": "^security::", "exclude": "on"})))
            .unwrap();

        let security = record(LogLevel::Info, "security::oauth");
        let gateway = record(LogLevel::Info, "gateway::proxy");
        assert!(keep.test(&security) && !keep.test(&gateway));
        assert!(!drop.test(&security) && drop.test(&gateway));
    }

    #[test]
    fn invalid_logger_regex_fails_init() {
        let factory = PlugletFactory::new();
        let err = factory
            .create::<LoggerPredicate>(&params(json!({"pattern": "("})))
            .unwrap_err();
        assert!(matches!(err, PluginError::Initialization { .. }));
    }

    #[test]
    fn tenant_list_is_trimmed() {
        let factory = PlugletFactory::new();
        let predicate = factory
            .create::<TenantPredicate>(&params(json!({"tenants": " master , other "})))
            .unwrap();
        assert!(predicate.test(&record(LogLevel::Info, "app")));
    }
}
