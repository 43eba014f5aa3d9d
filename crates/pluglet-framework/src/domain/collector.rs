//! Log collection: predicates decide, storages persist.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::log::LogRecord;
use crate::domain::predicate::PredicatePipeline;
use crate::domain::storage::StoragePipeline;

/// Outcome of one [`LogCollector::collect`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub accepted: usize,
    pub rejected: usize,
    /// Storages whose write failed.
    pub failed: usize,
}

/// Routes a tenant's log batches through its predicates into its storages.
#[derive(Debug, Clone)]
pub struct LogCollector {
    predicates: Arc<PredicatePipeline>,
    storages: Arc<StoragePipeline>,
}

impl LogCollector {
    pub fn new(predicates: Arc<PredicatePipeline>, storages: Arc<StoragePipeline>) -> Self {
        Self {
            predicates,
            storages,
        }
    }

    pub fn predicates(&self) -> &Arc<PredicatePipeline> {
        &self.predicates
    }

    pub fn storages(&self) -> &Arc<StoragePipeline> {
        &self.storages
    }

    /// Keeps the records every predicate accepts and writes them to every
    /// storage. A failing storage does not stop the others.
    pub async fn collect(&self, tenant_code: &str, records: Vec<LogRecord>) -> CollectReport {
        let predicates = self.predicates.snapshot(tenant_code);
        let storages = self.storages.snapshot(tenant_code);

        let total = records.len();
        let accepted: Vec<LogRecord> = records
            .into_iter()
            .filter(|record| predicates.adapters().iter().all(|p| p.delegate().test(record)))
            .collect();

        let mut report = CollectReport {
            accepted: accepted.len(),
            rejected: total - accepted.len(),
            failed: 0,
        };
        if accepted.is_empty() {
            return report;
        }

        let writes = storages.adapters().iter().map(|storage| {
            let accepted = &accepted;
            async move { (storage.id(), storage.delegate().store(accepted).await) }
        });
        for (id, result) in join_all(writes).await {
            if let Err(e) = result {
                warn!(tenant = tenant_code, storage = %id, error = %e, "Log storage failed");
                report.failed += 1;
            }
        }

        debug!(
            tenant = tenant_code,
            accepted = report.accepted,
            rejected = report.rejected,
            "Collected log batch"
        );
        report
    }
}
