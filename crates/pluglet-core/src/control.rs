//! Declarative description of configurable plugin fields.
//!
//! A [`ControlField`] is the static metadata of one parameter: its kind, its
//! default, and the constraints a raw value must satisfy. Plugin types expose
//! an ordered list of them through [`ControlSchema`], normally generated by
//! `#[derive(ControlSchema)]`.
//!
//! Raw parameters arrive as untyped JSON. [`ControlField::coerce`] converts a
//! raw value to the field's kind and [`ControlField::check`] applies the
//! constraints to the converted value.

use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::ValidationError;

// ─── ControlKind ─────────────────────────────────────────────────────────────

/// The editor kind of a control field, which also decides how raw values are
/// coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Display-only text; always bound to its declared default.
    Label,
    Text,
    Number,
    /// A boolean switch, or a multi-choice list when allowed values are set.
    Checkbox,
    Password,
    /// Exactly one of the allowed values.
    Select,
}

impl ControlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Text => "text",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
            Self::Password => "password",
            Self::Select => "select",
        }
    }
}

// ─── ControlField ────────────────────────────────────────────────────────────

/// Static metadata for one configurable field of a plugin type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlField {
    pub name: &'static str,
    pub label: &'static str,
    pub comment: &'static str,
    pub kind: ControlKind,
    pub default_value: Option<&'static str>,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<&'static str>,
    pub allowed_values: &'static [&'static str],
}

impl ControlField {
    pub const fn new(name: &'static str, kind: ControlKind) -> Self {
        Self {
            name,
            label: name,
            comment: "",
            kind,
            default_value: None,
            required: false,
            min: None,
            max: None,
            pattern: None,
            allowed_values: &[],
        }
    }

    pub const fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub const fn comment(mut self, comment: &'static str) -> Self {
        self.comment = comment;
        self
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub const fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub const fn values(mut self, values: &'static [&'static str]) -> Self {
        self.allowed_values = values;
        self
    }

    /// Whether a checkbox field holds a list of selections rather than a flag.
    pub fn is_multi_choice(&self) -> bool {
        self.kind == ControlKind::Checkbox && !self.allowed_values.is_empty()
    }

    /// Converts a raw value to this field's kind.
    pub fn coerce(&self, raw: &Value) -> Result<Value, ValidationError> {
        match self.kind {
            ControlKind::Label => Ok(self
                .default_value
                .map_or(Value::Null, |d| Value::String(d.to_owned()))),
            ControlKind::Text | ControlKind::Password => match raw {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(self.mismatch("a string", other)),
            },
            ControlKind::Number => match raw {
                Value::Number(n) => Ok(normalize_number(n).unwrap_or_else(|| raw.clone())),
                Value::String(s) => {
                    parse_number(s.trim()).ok_or_else(|| self.mismatch("a number", raw))
                }
                other => Err(self.mismatch("a number", other)),
            },
            ControlKind::Checkbox if self.is_multi_choice() => {
                let items: Vec<String> = match raw {
                    Value::Array(items) => items
                        .iter()
                        .map(|item| {
                            scalar_text(item).ok_or_else(|| self.mismatch("a list of choices", raw))
                        })
                        .collect::<Result<_, _>>()?,
                    Value::String(s) => s
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect(),
                    other => return Err(self.mismatch("a list of choices", other)),
                };
                for item in &items {
                    self.ensure_allowed(item)?;
                }
                Ok(Value::Array(items.into_iter().map(Value::String).collect()))
            }
            ControlKind::Checkbox => match raw {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(self.mismatch("a boolean", raw)),
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "on" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "off" | "no" => Ok(Value::Bool(false)),
                    _ => Err(self.mismatch("a boolean", raw)),
                },
                other => Err(self.mismatch("a boolean", other)),
            },
            ControlKind::Select => {
                let text =
                    scalar_text(raw).ok_or_else(|| self.mismatch("one of the choices", raw))?;
                self.ensure_allowed(&text)?;
                Ok(Value::String(text))
            }
        }
    }

    /// Applies `required`, `min`, `max` and `pattern` to a coerced value.
    ///
    /// `pattern` is the compiled form of [`ControlField::pattern`]; callers
    /// compile it once per type.
    pub fn check(&self, value: &Value, pattern: Option<&Regex>) -> Result<(), ValidationError> {
        match (self.kind, value) {
            (ControlKind::Number, Value::Number(n)) => {
                let v = n.as_f64().unwrap_or_default();
                self.check_range(v, "be at least", "be at most", "")
            }
            (ControlKind::Text | ControlKind::Password, Value::String(s)) => {
                if self.required && s.trim().is_empty() {
                    return Err(ValidationError::constraint(self.name, "must not be blank"));
                }
                self.check_range(
                    s.chars().count() as f64,
                    "be at least",
                    "be at most",
                    " characters long",
                )?;
                match pattern {
                    Some(re) if !re.is_match(s) => Err(ValidationError::constraint(
                        self.name,
                        format!("must match pattern '{}'", self.pattern.unwrap_or_default()),
                    )),
                    _ => Ok(()),
                }
            }
            (ControlKind::Checkbox, Value::Array(items)) => {
                if self.required && items.is_empty() {
                    return Err(ValidationError::constraint(
                        self.name,
                        "requires at least one selection",
                    ));
                }
                self.check_range(
                    items.len() as f64,
                    "have at least",
                    "have at most",
                    " selections",
                )
            }
            _ => Ok(()),
        }
    }

    fn check_range(
        &self,
        v: f64,
        at_least: &str,
        at_most: &str,
        unit: &str,
    ) -> Result<(), ValidationError> {
        if let Some(min) = self.min.filter(|min| v < *min) {
            return Err(ValidationError::constraint(
                self.name,
                format!("must {at_least} {min}{unit}"),
            ));
        }
        if let Some(max) = self.max.filter(|max| v > *max) {
            return Err(ValidationError::constraint(
                self.name,
                format!("must {at_most} {max}{unit}"),
            ));
        }
        Ok(())
    }

    fn ensure_allowed(&self, text: &str) -> Result<(), ValidationError> {
        if self.allowed_values.contains(&text) {
            Ok(())
        } else {
            Err(ValidationError::type_mismatch(
                self.name,
                "one of the choices",
                format!("'{text}' (allowed: {})", self.allowed_values.join(", ")),
            ))
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) -> ValidationError {
        ValidationError::type_mismatch(self.name, expected, describe(found))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(f).and_then(|n| normalize_number(&n).or(Some(Value::Number(n))))
}

/// Integral floats become integers so they bind onto integer fields.
fn normalize_number(n: &Number) -> Option<Value> {
    if n.is_i64() || n.is_u64() {
        return None;
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Value::from(f as i64))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string '{s}'"),
        Value::Array(_) => "an array".into(),
        Value::Object(_) => "an object".into(),
    }
}

// ─── ControlSchema ───────────────────────────────────────────────────────────

/// A type whose configurable fields are described by a control table.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Deserialize, ControlSchema)]
/// struct Level {
///     #[control(kind = "checkbox", default = "info", values("debug", "info"))]
///     levels: Vec<String>,
/// }
/// ```
pub trait ControlSchema {
    /// The ordered control table. Order is the declaration order.
    fn control_fields() -> Vec<ControlField>;
}
