//! Lifecycle hooks shared by every plugin type.

use serde::de::DeserializeOwned;

use crate::control::ControlSchema;
use crate::error::BoxError;

/// Init and cleanup hooks of a plugin.
///
/// `init` runs once after the coerced parameters have been bound and before
/// the instance is handed out; derived state is computed here. `destroy` runs
/// at most once, when the owning pipeline releases the instance. An instance
/// whose `init` failed is discarded without `destroy`.
///
/// The trait is object safe so domain traits can use it as a supertrait.
pub trait Lifecycle: Send + Sync {
    fn init(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn destroy(&self) {}
}

/// A plugin implementation type the factory can build.
///
/// Blanket-implemented for every type that describes its controls, has
/// lifecycle hooks and can be deserialized from the coerced parameter map.
pub trait Pluglet: ControlSchema + Lifecycle + DeserializeOwned + 'static {}

impl<T> Pluglet for T where T: ControlSchema + Lifecycle + DeserializeOwned + 'static {}
