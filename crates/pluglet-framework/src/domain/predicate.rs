//! Log predicates: decide which records a tenant keeps.

use std::sync::Arc;

use pluglet_core::{Lifecycle, PlugletFactory, PluginDomain};

use crate::builtin::predicate::{LevelPredicate, LoggerPredicate, TenantPredicate};
use crate::domain::log::LogRecord;
use crate::pipeline::{Pipeline, UnresolvedPolicy};
use crate::resolver::Resolver;

pub trait Predicate: Lifecycle {
    /// `true` keeps the record.
    fn test(&self, record: &LogRecord) -> bool;
}

pub fn erase_predicate<T: Predicate + 'static>(predicate: Box<T>) -> Box<dyn Predicate> {
    predicate
}

/// Resolver with the built-in predicates.
pub fn predicate_resolver(factory: Arc<PlugletFactory>) -> Resolver<dyn Predicate> {
    Resolver::new(PluginDomain::Predicate, factory)
        .register::<LevelPredicate>("level", "Level", erase_predicate)
        .register::<TenantPredicate>("tenant", "Tenant", erase_predicate)
        .register::<LoggerPredicate>("logger", "Logger", erase_predicate)
}

pub type PredicatePipeline = Pipeline<dyn Predicate>;

pub fn predicate_pipeline(factory: Arc<PlugletFactory>) -> PredicatePipeline {
    Pipeline::new(Arc::new(predicate_resolver(factory)), UnresolvedPolicy::SkipAndLog)
}
