//! Per-tenant plugin snapshots with copy-on-write refresh.
//!
//! A [`Pipeline`] owns the live adapters of one domain for every tenant.
//! Readers take an `Arc<Snapshot>` without locking and keep using it for the
//! whole request; [`Pipeline::refresh`] builds replacement snapshots from the
//! repository and swaps them in atomically. Adapters that did not survive a
//! refresh are disposed when the last in-flight snapshot holding them drops.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pluglet_core::{Lifecycle, PluginConfig, PluginConfigRepository, PluginDomain};

use crate::adapter::DynamicAdapter;
use crate::chain::{Chain, ChainEntry, Link, Terminal};
use crate::error::PipelineError;
use crate::resolver::Resolver;

/// What a refresh does with a record that cannot be turned into an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Leave the record out and log it; the rest of the snapshot still loads.
    SkipAndLog,
    /// Abort the refresh and keep the previous snapshots.
    FailFast,
}

// ─── Snapshot ─────────────────────────────────────────────────────────────────

/// The ordered, immutable plugin set of one tenant.
pub struct Snapshot<O: ?Sized + Lifecycle + 'static> {
    tenant_code: String,
    adapters: Vec<Arc<DynamicAdapter<O>>>,
}

impl<O: ?Sized + Lifecycle + 'static> Snapshot<O> {
    fn new(tenant_code: impl Into<String>, mut adapters: Vec<Arc<DynamicAdapter<O>>>) -> Self {
        adapters.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.id().cmp(b.id())));
        Self {
            tenant_code: tenant_code.into(),
            adapters,
        }
    }

    pub fn empty(tenant_code: impl Into<String>) -> Self {
        Self::new(tenant_code, Vec::new())
    }

    pub fn tenant_code(&self) -> &str {
        &self.tenant_code
    }

    /// Adapters in execution order.
    pub fn adapters(&self) -> &[Arc<DynamicAdapter<O>>] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Arc<DynamicAdapter<O>>> {
        self.adapters.iter().find(|a| a.id() == id)
    }

    fn configs(&self) -> impl Iterator<Item = &PluginConfig> {
        self.adapters.iter().map(|a| a.config())
    }

    /// Builds a chain over this snapshot's adapters.
    pub fn chain<X>(&self, terminal: Terminal<X>) -> Chain<X>
    where
        X: Send + Sync + 'static,
        O: Link<X>,
    {
        let entries: Vec<ChainEntry<X>> = self
            .adapters
            .iter()
            .map(|adapter| {
                let link: Arc<dyn Link<X>> = adapter.clone();
                ChainEntry::new(adapter.id(), adapter.priority(), link)
            })
            .collect();
        Chain::new(entries, terminal)
    }
}

impl<O: ?Sized + Lifecycle + 'static> fmt::Debug for Snapshot<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("tenant", &self.tenant_code)
            .field("plugins", &self.adapters.iter().map(|a| a.id()).collect::<Vec<_>>())
            .finish()
    }
}

// ─── RefreshReport ────────────────────────────────────────────────────────────

/// Counters of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub tenants: usize,
    /// Adapters constructed in this pass.
    pub created: usize,
    /// Adapters carried over unchanged.
    pub reused: usize,
    /// Records left out under [`UnresolvedPolicy::SkipAndLog`].
    pub skipped: usize,
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

type SnapshotMap<O> = HashMap<String, Arc<Snapshot<O>>>;

/// Live plugin snapshots of one domain, keyed by tenant.
pub struct Pipeline<O: ?Sized + Lifecycle + 'static> {
    resolver: Arc<Resolver<O>>,
    policy: UnresolvedPolicy,
    snapshots: ArcSwap<SnapshotMap<O>>,
    refresh_lock: Mutex<()>,
}

impl<O: ?Sized + Lifecycle + 'static> Pipeline<O> {
    pub fn new(resolver: Arc<Resolver<O>>, policy: UnresolvedPolicy) -> Self {
        Self {
            resolver,
            policy,
            snapshots: ArcSwap::from_pointee(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn domain(&self) -> PluginDomain {
        self.resolver.domain()
    }

    pub fn resolver(&self) -> &Arc<Resolver<O>> {
        &self.resolver
    }

    pub fn policy(&self) -> UnresolvedPolicy {
        self.policy
    }

    /// The tenant's current snapshot; empty when the tenant has none.
    pub fn snapshot(&self, tenant_code: &str) -> Arc<Snapshot<O>> {
        self.snapshots
            .load()
            .get(tenant_code)
            .cloned()
            .unwrap_or_else(|| Arc::new(Snapshot::empty(tenant_code)))
    }

    /// Tenants that currently have a snapshot.
    pub fn tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self.snapshots.load().keys().cloned().collect();
        tenants.sort();
        tenants
    }

    /// Reloads every tenant from the repository and swaps the result in.
    ///
    /// Tenants the repository no longer lists are dropped. On error nothing is
    /// swapped.
    pub async fn refresh(
        &self,
        repository: &dyn PluginConfigRepository,
    ) -> Result<RefreshReport, PipelineError> {
        let _guard = self.refresh_lock.lock().await;
        let domain = self.domain();

        let mut loaded = Vec::new();
        for tenant in repository.tenants().await? {
            let configs = repository.list_enabled_by_tenant(&tenant, domain).await?;
            loaded.push((tenant, configs));
        }

        let current = self.snapshots.load_full();
        let mut report = RefreshReport::default();
        let mut next = SnapshotMap::new();
        for (tenant, configs) in loaded {
            let snapshot = self.rebuild(&tenant, configs, current.get(&tenant), &mut report)?;
            next.insert(tenant, snapshot);
        }
        report.tenants = next.len();

        self.snapshots.store(Arc::new(next));
        info!(
            domain = %domain,
            tenants = report.tenants,
            created = report.created,
            reused = report.reused,
            skipped = report.skipped,
            "Plugin pipeline refreshed"
        );
        Ok(report)
    }

    /// Replaces one tenant's snapshot from an explicit record list.
    pub async fn load_tenant(
        &self,
        tenant_code: &str,
        configs: Vec<PluginConfig>,
    ) -> Result<RefreshReport, PipelineError> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.snapshots.load_full();

        let mut report = RefreshReport::default();
        let snapshot = self.rebuild(tenant_code, configs, current.get(tenant_code), &mut report)?;

        let mut next: SnapshotMap<O> = (*current).clone();
        next.insert(tenant_code.to_owned(), snapshot);
        report.tenants = 1;
        self.snapshots.store(Arc::new(next));
        Ok(report)
    }

    /// Drops every snapshot. Adapters are disposed once in-flight users finish.
    pub fn clear(&self) {
        let previous = self.snapshots.swap(Arc::new(HashMap::new()));
        debug!(domain = %self.domain(), tenants = previous.len(), "Plugin pipeline cleared");
    }

    fn rebuild(
        &self,
        tenant: &str,
        mut configs: Vec<PluginConfig>,
        previous: Option<&Arc<Snapshot<O>>>,
        report: &mut RefreshReport,
    ) -> Result<Arc<Snapshot<O>>, PipelineError> {
        configs.retain(|c| c.enabled && c.domain == self.domain() && c.tenant_code == tenant);
        configs.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        if let Some(previous) = previous {
            let unchanged = previous.len() == configs.len()
                && previous.configs().zip(&configs).all(|(a, b)| a == b);
            if unchanged {
                report.reused += previous.len();
                return Ok(Arc::clone(previous));
            }
        }

        let mut adapters = Vec::with_capacity(configs.len());
        for config in configs {
            let reusable = previous
                .and_then(|p| p.find(&config.id))
                .filter(|a| *a.config() == config);
            if let Some(existing) = reusable {
                report.reused += 1;
                adapters.push(Arc::clone(existing));
                continue;
            }

            let id = config.id.clone();
            match DynamicAdapter::new(config, Arc::clone(&self.resolver)) {
                Ok(adapter) => {
                    report.created += 1;
                    adapters.push(Arc::new(adapter));
                }
                Err(source) => match self.policy {
                    UnresolvedPolicy::SkipAndLog => {
                        warn!(
                            domain = %self.domain(),
                            tenant,
                            id = %id,
                            error = %source,
                            "Skipping plugin"
                        );
                        report.skipped += 1;
                    }
                    UnresolvedPolicy::FailFast => {
                        return Err(PipelineError::Plugin {
                            domain: self.domain(),
                            tenant: tenant.to_owned(),
                            source,
                        });
                    }
                },
            }
        }

        Ok(Arc::new(Snapshot::new(tenant, adapters)))
    }
}

impl<O: ?Sized + Lifecycle + 'static> fmt::Debug for Pipeline<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("domain", &self.domain())
            .field("policy", &self.policy)
            .field("tenants", &self.tenants())
            .finish()
    }
}
