//! Plugin factory: validate, bind, initialize.

use std::any::{TypeId, type_name};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::ParamMap;
use crate::control::ControlSchema;
use crate::descriptor::PluginDescriptor;
use crate::error::{PluginError, SchemaError};
use crate::instance::PluginInstance;
use crate::lifecycle::{Lifecycle, Pluglet};

/// Builds plugin instances from untyped parameters.
///
/// Descriptors are derived once per implementation type and cached for the
/// lifetime of the factory. A factory is usually shared between all
/// resolvers of a process through an `Arc`.
#[derive(Debug, Default)]
pub struct PlugletFactory {
    descriptors: DashMap<TypeId, Arc<PluginDescriptor>>,
}

impl PlugletFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor of `T`, deriving it on first use.
    pub fn describe<T: ControlSchema + 'static>(
        &self,
    ) -> Result<Arc<PluginDescriptor>, SchemaError> {
        let id = TypeId::of::<T>();
        if let Some(cached) = self.descriptors.get(&id) {
            return Ok(Arc::clone(&cached));
        }

        let descriptor = Arc::new(PluginDescriptor::of::<T>()?);
        trace!(plugin = descriptor.type_name(), "Derived plugin descriptor");
        Ok(Arc::clone(&*self.descriptors.entry(id).or_insert(descriptor)))
    }

    /// Validates `raw` against `T`'s descriptor, binds the coerced values and
    /// runs the init hook.
    ///
    /// On any failure no instance is returned and no cleanup hook runs.
    pub fn create<T: Pluglet>(&self, raw: &ParamMap) -> Result<T, PluginError> {
        let type_name = type_name::<T>();
        let descriptor = self.describe::<T>()?;

        let params = descriptor
            .validate(raw)
            .map_err(|source| PluginError::Configuration { type_name, source })?;

        let mut plugin: T = serde_json::from_value(Value::Object(params))
            .map_err(|source| PluginError::Bind { type_name, source })?;

        plugin
            .init()
            .map_err(|source| PluginError::Initialization { type_name, source })?;

        debug!(plugin = type_name, "Plugin instance created");
        Ok(plugin)
    }

    /// Runs the cleanup hook of an instance; repeated calls are no-ops.
    pub fn destroy<O: ?Sized + Lifecycle>(&self, instance: &PluginInstance<O>) {
        instance.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::control::{ControlField, ControlKind};
    use crate::error::{BoxError, ValidationError};

    static INITS: AtomicUsize = AtomicUsize::new(0);
    static DESTROYS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Deserialize)]
    struct Password {
        min: u32,
        max: u32,
        #[serde(skip)]
        span: u32,
    }

    impl ControlSchema for Password {
        fn control_fields() -> Vec<ControlField> {
            vec![
                ControlField::new("min", ControlKind::Number)
                    .default_value("8")
                    .min(6.0)
                    .max(32.0),
                ControlField::new("max", ControlKind::Number)
                    .default_value("16")
                    .min(6.0)
                    .max(32.0),
            ]
        }
    }

    impl Lifecycle for Password {
        fn init(&mut self) -> Result<(), BoxError> {
            INITS.fetch_add(1, Ordering::SeqCst);
            if self.min > self.max {
                return Err(format!("min {} exceeds max {}", self.min, self.max).into());
            }
            self.span = self.max - self.min;
            Ok(())
        }

        fn destroy(&self) {
            DESTROYS.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn params(value: Value) -> ParamMap {
        match value {
            Value::Object(map) => map,
            _ => ParamMap::new(),
        }
    }

    #[test]
    fn descriptor_is_memoized() {
        let factory = PlugletFactory::new();
        let first = factory.describe::<Password>().unwrap();
        let second = factory.describe::<Password>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            first.fields().map(|f| f.name).collect::<Vec<_>>(),
            vec!["min", "max"]
        );
    }

    #[test]
    fn create_binds_and_initializes() {
        let factory = PlugletFactory::new();
        let plugin = factory.create::<Password>(&params(json!({"min": "10"}))).unwrap();
        assert_eq!((plugin.min, plugin.max, plugin.span), (10, 16, 6));
    }

    #[test]
    fn empty_params_use_every_default() {
        let factory = PlugletFactory::new();
        let plugin = factory.create::<Password>(&ParamMap::new()).unwrap();
        assert_eq!((plugin.min, plugin.max), (8, 16));
    }

    #[test]
    fn failures_produce_no_instance() {
        let factory = PlugletFactory::new();

        let err = factory.create::<Password>(&params(json!({"min": 4}))).unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::ConstraintViolation { field, .. }) if field == "min"
        ));

        let inits = INITS.load(Ordering::SeqCst);
        let err = factory
            .create::<Password>(&params(json!({"min": 20, "max": 10})))
            .unwrap_err();
        assert!(matches!(err, PluginError::Initialization { .. }));
        assert!(INITS.load(Ordering::SeqCst) > inits);
    }

    #[test]
    fn destroy_is_idempotent() {
        let factory = PlugletFactory::new();
        let plugin = factory.create::<Password>(&ParamMap::new()).unwrap();
        let instance = PluginInstance::new("password", Box::new(plugin));
        let before = DESTROYS.load(Ordering::SeqCst);

        factory.destroy(&instance);
        factory.destroy(&instance);
        drop(instance);

        assert_eq!(DESTROYS.load(Ordering::SeqCst), before + 1);
    }
}
