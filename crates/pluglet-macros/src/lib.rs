//! Procedural macros for Pluglet.
//!
//! This crate provides `#[derive(ControlSchema)]`, which generates the
//! ordered control table of a plugin type from `#[control(...)]` field
//! attributes:
//!
//! ```rust,ignore
//! use pluglet_core::Lifecycle;
//! use pluglet_macros::ControlSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, ControlSchema)]
//! pub struct PasswordStrategy {
//!     #[control(kind = "number", label = "Min length", default = "8", min = 6, max = 32)]
//!     min: u32,
//!
//!     #[control(kind = "text", label = "Symbols", default = "!@#$%")]
//!     symbols: String,
//!
//!     // Not a control: computed in `init`.
//!     #[serde(skip)]
//!     charset: Vec<char>,
//! }
//! ```

mod control;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `pluglet_core::ControlSchema`.
///
/// Only fields carrying `#[control(...)]` become controls, in declaration
/// order. Other fields are left to serde (typically `#[serde(skip)]` plus
/// `Default`).
///
/// # Field attributes
///
/// | Key | Example | Description |
/// |-----|---------|-------------|
/// | `kind` | `"number"` | `label`, `text`, `number`, `checkbox`, `password` or `select` (default `text`) |
/// | `name` | `"maxSize"` | Parameter key (default: the field name) |
/// | `label` | `"Max size"` | Display label |
/// | `comment` | `"In bytes"` | Help text |
/// | `default` | `"8"` | Default value, as text |
/// | `required` | | Value must be present |
/// | `min` / `max` | `6` | Numeric range, length bound, or selection count |
/// | `pattern` | `"[a-z]+"` | Regex the whole value must match |
/// | `values(...)` | `values("a", "b")` | Allowed values for `select` / `checkbox` |
#[proc_macro_derive(ControlSchema, attributes(control))]
pub fn derive_control_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    control::derive_control_schema(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
