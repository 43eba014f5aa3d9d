//! Log storages: where accepted records are written.

use std::sync::Arc;

use async_trait::async_trait;

use pluglet_core::{BoxError, Lifecycle, PlugletFactory, PluginDomain};

use crate::builtin::storage::{FileStorage, MemoryStorage};
use crate::domain::log::LogRecord;
use crate::pipeline::{Pipeline, UnresolvedPolicy};
use crate::resolver::Resolver;

#[async_trait]
pub trait Storage: Lifecycle {
    async fn store(&self, records: &[LogRecord]) -> Result<(), BoxError>;
}

pub fn erase_storage<T: Storage + 'static>(storage: Box<T>) -> Box<dyn Storage> {
    storage
}

/// Resolver with the built-in storages.
pub fn storage_resolver(factory: Arc<PlugletFactory>) -> Resolver<dyn Storage> {
    Resolver::new(PluginDomain::Storage, factory)
        .register::<FileStorage>("file", "File", erase_storage)
        .register::<MemoryStorage>("memory", "Memory", erase_storage)
}

pub type StoragePipeline = Pipeline<dyn Storage>;

pub fn storage_pipeline(factory: Arc<PlugletFactory>) -> StoragePipeline {
    Pipeline::new(Arc::new(storage_resolver(factory)), UnresolvedPolicy::SkipAndLog)
}
