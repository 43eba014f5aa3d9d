//! Plugin descriptor: the validated, ordered control table of one type.

use regex::Regex;
use serde_json::Value;

use crate::ParamMap;
use crate::control::{ControlField, ControlKind, ControlSchema};
use crate::error::{SchemaError, ValidationError};

#[derive(Debug)]
struct DescribedField {
    field: ControlField,
    pattern: Option<Regex>,
}

/// The control table of a plugin type after schema validation.
///
/// Building a descriptor compiles every pattern and checks every declared
/// default against its own constraints, so a descriptor that exists can
/// always validate parameters. [`PlugletFactory`](crate::PlugletFactory)
/// keeps one per type.
#[derive(Debug)]
pub struct PluginDescriptor {
    type_name: &'static str,
    fields: Vec<DescribedField>,
}

impl PluginDescriptor {
    /// Builds the descriptor of a schema type.
    pub fn of<T: ControlSchema + 'static>() -> Result<Self, SchemaError> {
        Self::from_fields(std::any::type_name::<T>(), T::control_fields())
    }

    /// Builds a descriptor from a hand-written control table.
    pub fn from_fields(
        type_name: &'static str,
        fields: Vec<ControlField>,
    ) -> Result<Self, SchemaError> {
        let mut described: Vec<DescribedField> = Vec::with_capacity(fields.len());

        for field in fields {
            if described.iter().any(|d| d.field.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    type_name,
                    field: field.name,
                });
            }
            if field.kind == ControlKind::Select && field.allowed_values.is_empty() {
                return Err(SchemaError::MissingAllowedValues {
                    type_name,
                    field: field.name,
                });
            }

            let pattern = field
                .pattern
                .map(|p| Regex::new(&format!("^(?:{p})$")))
                .transpose()
                .map_err(|e| SchemaError::InvalidPattern {
                    type_name,
                    field: field.name,
                    message: e.to_string(),
                })?;

            let entry = DescribedField { field, pattern };
            let checked_default = entry
                .field
                .default_value
                .filter(|_| entry.field.kind != ControlKind::Label);
            if let Some(default) = checked_default {
                entry
                    .resolve(Some(&Value::String(default.to_owned())))
                    .map_err(|source| SchemaError::InvalidDefault {
                        type_name,
                        field: entry.field.name,
                        source,
                    })?;
            }
            described.push(entry);
        }

        Ok(Self {
            type_name,
            fields: described,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &ControlField> {
        self.fields.iter().map(|d| &d.field)
    }

    /// Validates and coerces raw parameters.
    ///
    /// The result holds exactly one entry per declared field; undeclared keys
    /// are dropped and optional fields without a value are bound to `null`.
    pub fn validate(&self, raw: &ParamMap) -> Result<ParamMap, ValidationError> {
        self.fields
            .iter()
            .map(|d| Ok((d.field.name.to_owned(), d.resolve(raw.get(d.field.name))?)))
            .collect()
    }
}

impl DescribedField {
    fn resolve(&self, raw: Option<&Value>) -> Result<Value, ValidationError> {
        let field = &self.field;
        if field.kind == ControlKind::Label {
            return field.coerce(&Value::Null);
        }

        let present = raw.filter(|v| !is_absent(field.kind, v));
        let value = match (present, field.default_value) {
            (Some(v), _) => field.coerce(v)?,
            (None, Some(default)) => field.coerce(&Value::String(default.to_owned()))?,
            (None, None) if field.required => {
                return Err(ValidationError::constraint(field.name, "is required"));
            }
            (None, None) => return Ok(Value::Null),
        };

        field.check(&value, self.pattern.as_ref())?;
        Ok(value)
    }
}

/// `null` is always absent; a blank string is absent for non-text kinds,
/// which is what HTML forms send for untouched inputs.
fn is_absent(kind: ControlKind, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            !matches!(kind, ControlKind::Text | ControlKind::Password) && s.trim().is_empty()
        }
        _ => false,
    }
}
