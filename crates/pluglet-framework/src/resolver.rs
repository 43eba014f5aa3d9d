//! Type-code registry of one plugin domain.
//!
//! A [`Resolver`] maps the persisted `type` code of a configuration record to
//! a concrete implementation type and builds instances of it through the
//! shared [`PlugletFactory`]. Instances are erased to the domain's trait
//! object `O` (for example `dyn Filter`) at registration time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use pluglet_core::{
    ControlField, Lifecycle, ParamMap, PluginDescriptor, PluginDomain, PluginError, PluginInstance,
    PlugletFactory, Pluglet, SchemaError,
};

type Construct<O> =
    Box<dyn Fn(&PlugletFactory, &ParamMap) -> Result<Box<O>, PluginError> + Send + Sync>;
type Describe = fn(&PlugletFactory) -> Result<Arc<PluginDescriptor>, SchemaError>;

struct Registration<O: ?Sized> {
    name: &'static str,
    describe: Describe,
    construct: Construct<O>,
}

/// A registered plugin type as listed to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginType {
    pub code: &'static str,
    pub name: &'static str,
}

/// Static registry for one domain.
pub struct Resolver<O: ?Sized + Lifecycle> {
    domain: PluginDomain,
    factory: Arc<PlugletFactory>,
    types: BTreeMap<&'static str, Registration<O>>,
}

impl<O: ?Sized + Lifecycle + 'static> Resolver<O> {
    pub fn new(domain: PluginDomain, factory: Arc<PlugletFactory>) -> Self {
        Self {
            domain,
            factory,
            types: BTreeMap::new(),
        }
    }

    /// Registers implementation type `T` under `code`.
    ///
    /// `erase` performs the unsizing from `Box<T>` to the domain object,
    /// usually a generic helper like `fn erase<T: Filter>(b: Box<T>) -> Box<dyn Filter> { b }`.
    pub fn register<T: Pluglet>(
        mut self,
        code: &'static str,
        name: &'static str,
        erase: fn(Box<T>) -> Box<O>,
    ) -> Self {
        let construct: Construct<O> =
            Box::new(move |factory: &PlugletFactory, params: &ParamMap| {
                Ok(erase(Box::new(factory.create::<T>(params)?)))
            });
        self.types.insert(
            code,
            Registration {
                name,
                describe: describe::<T>,
                construct,
            },
        );
        self
    }

    pub fn domain(&self) -> PluginDomain {
        self.domain
    }

    pub fn factory(&self) -> &Arc<PlugletFactory> {
        &self.factory
    }

    pub fn contains(&self, code: &str) -> bool {
        self.types.contains_key(code)
    }

    /// Registered types, ordered by code.
    pub fn types(&self) -> Vec<PluginType> {
        self.types
            .iter()
            .map(|(code, r)| PluginType { code, name: r.name })
            .collect()
    }

    /// The control table for a type code, or `None` if the code is unknown.
    pub fn describe(&self, code: &str) -> Option<Result<Vec<ControlField>, SchemaError>> {
        let registration = self.types.get(code)?;
        Some((registration.describe)(&self.factory).map(|d| d.fields().cloned().collect()))
    }

    /// Builds an instance of the type registered under `code`.
    ///
    /// An unknown code yields `Ok(None)`; construction failures of a known
    /// code are returned as errors.
    pub fn resolve(
        &self,
        code: &str,
        params: &ParamMap,
    ) -> Result<Option<PluginInstance<O>>, PluginError> {
        let Some(registration) = self.types.get(code) else {
            debug!(domain = %self.domain, plugin = code, "Unknown plugin type");
            return Ok(None);
        };
        let inner = (registration.construct)(&self.factory, params)?;
        Ok(Some(PluginInstance::new(code, inner)))
    }

    /// Tears an instance down through the factory.
    pub fn destroy(&self, instance: &PluginInstance<O>) {
        self.factory.destroy(instance);
    }
}

fn describe<T: Pluglet>(factory: &PlugletFactory) -> Result<Arc<PluginDescriptor>, SchemaError> {
    factory.describe::<T>()
}

impl<O: ?Sized + Lifecycle> fmt::Debug for Resolver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("domain", &self.domain)
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pluglet_core::BoxError;
    use pluglet_macros::ControlSchema;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    trait Greeter: Lifecycle {
        fn greet(&self) -> String;
        fn destroyed(&self) -> Arc<AtomicUsize>;
    }

    fn erase<T: Greeter + 'static>(b: Box<T>) -> Box<dyn Greeter> {
        b
    }

    #[derive(Deserialize, ControlSchema)]
    struct Hello {
        #[control(kind = "text", label = "Name", default = "world", max = 10)]
        name: String,
        #[serde(skip)]
        destroyed: Arc<AtomicUsize>,
    }

    impl Lifecycle for Hello {
        fn init(&mut self) -> Result<(), BoxError> {
            if self.name == "nobody" {
                return Err("nobody cannot be greeted".into());
            }
            Ok(())
        }

        fn destroy(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Greeter for Hello {
        fn greet(&self) -> String {
            format!("hello, {}", self.name)
        }

        fn destroyed(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.destroyed)
        }
    }

    fn resolver() -> Resolver<dyn Greeter> {
        Resolver::new(PluginDomain::Filter, Arc::new(PlugletFactory::new()))
            .register::<Hello>("hello", "Hello", erase)
    }

    fn params(value: serde_json::Value) -> ParamMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn resolves_registered_codes() {
        let resolver = resolver();
        let instance = resolver
            .resolve("hello", &params(json!({"name": "rust"})))
            .unwrap()
            .unwrap();
        assert_eq!(instance.greet(), "hello, rust");
        assert_eq!(instance.type_code(), "hello");
    }

    #[test]
    fn unknown_code_is_absent_not_an_error() {
        assert!(resolver().resolve("bye", &ParamMap::new()).unwrap().is_none());
    }

    #[test]
    fn construction_errors_surface() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve("hello", &params(json!({"name": "far too long a name"}))),
            Err(PluginError::Configuration { .. })
        ));
        assert!(matches!(
            resolver.resolve("hello", &params(json!({"name": "nobody"}))),
            Err(PluginError::Initialization { .. })
        ));
    }

    #[test]
    fn lists_and_describes_types() {
        let resolver = resolver();
        assert_eq!(
            resolver.types(),
            vec![PluginType {
                code: "hello",
                name: "Hello"
            }]
        );
        let fields = resolver.describe("hello").unwrap().unwrap();
        assert_eq!(fields[0].label, "Name");
        assert_eq!(fields[0].default_value, Some("world"));
        assert!(resolver.describe("bye").is_none());
    }

    #[test]
    fn destroy_delegates_once() {
        let resolver = resolver();
        let instance = resolver.resolve("hello", &ParamMap::new()).unwrap().unwrap();
        let destroyed = instance.destroyed();
        resolver.destroy(&instance);
        resolver.destroy(&instance);
        drop(instance);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
