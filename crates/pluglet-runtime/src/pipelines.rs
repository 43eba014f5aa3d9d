//! The five domain pipelines of one process and their shared factory.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info_span, Instrument};

use pluglet_core::{
    ControlField, Lifecycle, PluginConfig, PluginConfigRepository, PluginDomain, PlugletFactory,
    SchemaError,
};
use pluglet_framework::{
    BroadcasterPipeline, FilterPipeline, Pipeline, PipelineError, PluginType, PredicatePipeline,
    RefreshReport, StoragePipeline, StrategyPipeline, broadcaster_pipeline, filter_pipeline,
    predicate_pipeline, storage_pipeline, strategy_pipeline,
};

/// Domain-independent view of a [`Pipeline`].
#[async_trait]
pub trait DomainPipeline: Send + Sync {
    fn domain(&self) -> PluginDomain;

    fn types(&self) -> Vec<PluginType>;

    fn describe(&self, code: &str) -> Option<Result<Vec<ControlField>, SchemaError>>;

    /// Records behind the tenant's live snapshot, in execution order.
    fn loaded(&self, tenant_code: &str) -> Vec<PluginConfig>;

    async fn refresh(
        &self,
        repository: &dyn PluginConfigRepository,
    ) -> Result<RefreshReport, PipelineError>;

    fn clear(&self);
}

#[async_trait]
impl<O: ?Sized + Lifecycle + 'static> DomainPipeline for Pipeline<O> {
    fn domain(&self) -> PluginDomain {
        Pipeline::domain(self)
    }

    fn types(&self) -> Vec<PluginType> {
        self.resolver().types()
    }

    fn describe(&self, code: &str) -> Option<Result<Vec<ControlField>, SchemaError>> {
        self.resolver().describe(code)
    }

    fn loaded(&self, tenant_code: &str) -> Vec<PluginConfig> {
        self.snapshot(tenant_code)
            .adapters()
            .iter()
            .map(|a| a.config().clone())
            .collect()
    }

    async fn refresh(
        &self,
        repository: &dyn PluginConfigRepository,
    ) -> Result<RefreshReport, PipelineError> {
        Pipeline::refresh(self, repository).await
    }

    fn clear(&self) {
        Pipeline::clear(self)
    }
}

/// Outcome of refreshing every domain.
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub reports: BTreeMap<PluginDomain, RefreshReport>,
    /// Domains whose refresh failed; their previous snapshots stay live.
    pub failures: BTreeMap<PluginDomain, PipelineError>,
}

impl RefreshSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Pipelines {
    pub filters: Arc<FilterPipeline>,
    pub predicates: Arc<PredicatePipeline>,
    pub storages: Arc<StoragePipeline>,
    pub broadcasters: Arc<BroadcasterPipeline>,
    pub strategies: Arc<StrategyPipeline>,
}

impl Pipelines {
    /// One pipeline per domain, all sharing `factory`'s descriptor cache.
    pub fn new(factory: Arc<PlugletFactory>) -> Self {
        Self {
            filters: Arc::new(filter_pipeline(Arc::clone(&factory))),
            predicates: Arc::new(predicate_pipeline(Arc::clone(&factory))),
            storages: Arc::new(storage_pipeline(Arc::clone(&factory))),
            broadcasters: Arc::new(broadcaster_pipeline(Arc::clone(&factory))),
            strategies: Arc::new(strategy_pipeline(factory)),
        }
    }

    pub fn all(&self) -> [&dyn DomainPipeline; 5] {
        [
            self.filters.as_ref(),
            self.predicates.as_ref(),
            self.storages.as_ref(),
            self.broadcasters.as_ref(),
            self.strategies.as_ref(),
        ]
    }

    pub fn get(&self, domain: PluginDomain) -> &dyn DomainPipeline {
        match domain {
            PluginDomain::Filter => self.filters.as_ref(),
            PluginDomain::Predicate => self.predicates.as_ref(),
            PluginDomain::Storage => self.storages.as_ref(),
            PluginDomain::Broadcaster => self.broadcasters.as_ref(),
            PluginDomain::Strategy => self.strategies.as_ref(),
        }
    }

    /// Refreshes every domain. A failing domain does not stop the others.
    pub async fn refresh(&self, repository: &dyn PluginConfigRepository) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        for pipeline in self.all() {
            let domain = pipeline.domain();
            let span = info_span!("refresh", domain = %domain);
            match pipeline.refresh(repository).instrument(span).await {
                Ok(report) => {
                    summary.reports.insert(domain, report);
                }
                Err(e) => {
                    error!(
                        domain = %domain,
                        error = %e,
                        "Pipeline refresh failed, keeping previous snapshots"
                    );
                    summary.failures.insert(domain, e);
                }
            }
        }
        summary
    }

    /// Drops every snapshot; instances are destroyed once in-flight work ends.
    pub fn clear(&self) {
        for pipeline in self.all() {
            pipeline.clear();
        }
    }
}
