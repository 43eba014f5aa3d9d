//! Live plugin instances with exactly-once teardown.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::lifecycle::Lifecycle;

/// A constructed, initialized plugin.
///
/// The instance runs its `destroy` hook exactly once: on the first call to
/// [`release`](Self::release), or on drop if it was never released. Sharing
/// an instance through an `Arc` therefore defers teardown until the last
/// holder lets go.
pub struct PluginInstance<O: ?Sized + Lifecycle> {
    type_code: String,
    released: AtomicBool,
    inner: Box<O>,
}

impl<O: ?Sized + Lifecycle> PluginInstance<O> {
    pub fn new(type_code: impl Into<String>, inner: Box<O>) -> Self {
        Self {
            type_code: type_code.into(),
            released: AtomicBool::new(false),
            inner,
        }
    }

    /// The registry code this instance was resolved from.
    pub fn type_code(&self) -> &str {
        &self.type_code
    }

    /// Runs the cleanup hook if it has not run yet.
    ///
    /// Returns `true` when this call performed the teardown.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        debug!(plugin = %self.type_code, "Destroying plugin instance");
        self.inner.destroy();
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl<O: ?Sized + Lifecycle> Deref for PluginInstance<O> {
    type Target = O;

    fn deref(&self) -> &O {
        &self.inner
    }
}

impl<O: ?Sized + Lifecycle> Drop for PluginInstance<O> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<O: ?Sized + Lifecycle> fmt::Debug for PluginInstance<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("type_code", &self.type_code)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
