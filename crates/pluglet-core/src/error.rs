//! Error types for control schemas and plugin construction.
//!
//! The taxonomy is layered: [`ValidationError`] describes why one parameter
//! was rejected, [`SchemaError`] why a type's control table is unusable, and
//! [`PluginError`] wraps both together with binding and init failures.

use std::error::Error as StdError;

use thiserror::Error;

/// Type-erased error used by plugin hooks and chain links.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A single parameter failed coercion or a constraint check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The raw value cannot be converted to the field's kind.
    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// The value converted but violates `required`, `min`, `max` or `pattern`.
    #[error("field '{field}' {message}")]
    ConstraintViolation { field: String, message: String },
}

impl ValidationError {
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            found: found.into(),
        }
    }

    pub fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::TypeMismatch { field, .. } | Self::ConstraintViolation { field, .. } => field,
        }
    }
}

/// The control table declared by a plugin type is inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("type '{type_name}' declares field '{field}' more than once")]
    DuplicateField {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("type '{type_name}' field '{field}' has an invalid default: {source}")]
    InvalidDefault {
        type_name: &'static str,
        field: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("type '{type_name}' field '{field}' has an invalid pattern: {message}")]
    InvalidPattern {
        type_name: &'static str,
        field: &'static str,
        message: String,
    },

    #[error("type '{type_name}' field '{field}' is a select without allowed values")]
    MissingAllowedValues {
        type_name: &'static str,
        field: &'static str,
    },
}

/// Building a plugin instance failed.
///
/// Whatever the variant, no instance exists afterwards and no cleanup hook
/// has been run.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid parameters for '{type_name}': {source}")]
    Configuration {
        type_name: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("cannot bind parameters onto '{type_name}': {source}")]
    Bind {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("init of '{type_name}' failed: {source}")]
    Initialization {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("params of plugin[id={id}] are not a JSON object: {message}")]
    MalformedParams { id: String, message: String },

    #[error("cannot find type '{type_code}' for plugin[id={id}]")]
    UnresolvedPluginType { id: String, type_code: String },

    /// Construction of a configured plugin failed; carries the record identity.
    #[error("init plugin[id={id}, type={type_code}] failed: {source}")]
    Adapter {
        id: String,
        type_code: String,
        #[source]
        source: Box<PluginError>,
    },
}

impl PluginError {
    /// Wraps a construction error with the identity of the config record.
    pub fn for_config(id: impl Into<String>, type_code: impl Into<String>, source: Self) -> Self {
        Self::Adapter {
            id: id.into(),
            type_code: type_code.into(),
            source: Box::new(source),
        }
    }

    /// Returns the underlying validation error, looking through adapter wrapping.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Configuration { source, .. } => Some(source),
            Self::Adapter { source, .. } => source.validation(),
            _ => None,
        }
    }
}

/// A configuration repository could not be read.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
