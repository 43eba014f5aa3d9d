//! Process wiring: repository → pipelines → HTTP server, plus the refresh
//! and sweep loops.
//!
//! ```rust,ignore
//! use pluglet_runtime::PlugletRuntime;
//!
//! let runtime = PlugletRuntime::builder()
//!     .config_file("config/pluglet.toml")
//!     .profile("production")
//!     .build()?;
//! runtime.run().await?;
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pluglet_core::{MemoryConfigRepository, PlugletFactory};
use pluglet_framework::{LogCollector, Multicast};
use pluglet_security::{Clock, SecurityService, StaticDirectory, SystemClock};

use crate::api::{self, ApiState};
use crate::config::{ConfigLoader, ConfigResult, PlugletConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::pipelines::{Pipelines, RefreshSummary};

/// A configured Pluglet server.
pub struct PlugletRuntime {
    config: PlugletConfig,
    repository: Arc<MemoryConfigRepository>,
    pipelines: Pipelines,
    collector: LogCollector,
    multicast: Multicast,
    directory: Arc<StaticDirectory>,
    security: Arc<SecurityService>,
    shutdown: CancellationToken,
}

impl PlugletRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds every component from `config` with the system clock.
    ///
    /// Nothing is loaded until [`refresh`](Self::refresh) or
    /// [`serve`](Self::serve) runs.
    pub fn from_config(config: PlugletConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: PlugletConfig, clock: Arc<dyn Clock>) -> Self {
        let repository = Arc::new(MemoryConfigRepository::new(config.plugin_configs()));
        let pipelines = Pipelines::new(Arc::new(PlugletFactory::new()));
        let collector = LogCollector::new(
            Arc::clone(&pipelines.predicates),
            Arc::clone(&pipelines.storages),
        );
        let multicast = Multicast::new(Arc::clone(&pipelines.broadcasters));

        let directory = Arc::new(StaticDirectory::new());
        let default_tenant = config.security.default_tenant.as_str();
        for app in &config.applications {
            let tenant = app.tenant.as_deref().unwrap_or(default_tenant);
            directory.insert_application(tenant, app.to_application());
        }
        for account in &config.accounts {
            let tenant = account.tenant.as_deref().unwrap_or(default_tenant);
            directory.insert_account(tenant, account.to_account(), &account.password);
        }

        let security = Arc::new(SecurityService::new(
            config.security_settings(),
            Arc::clone(&pipelines.strategies),
            directory.clone(),
            clock,
        ));

        debug!(
            plugins = config.plugins.len(),
            applications = config.applications.len(),
            accounts = config.accounts.len(),
            "Runtime assembled"
        );

        Self {
            config,
            repository,
            pipelines,
            collector,
            multicast,
            directory,
            security,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &PlugletConfig {
        &self.config
    }

    /// The record source of every pipeline; changes apply on the next refresh.
    pub fn repository(&self) -> &Arc<MemoryConfigRepository> {
        &self.repository
    }

    pub fn pipelines(&self) -> &Pipelines {
        &self.pipelines
    }

    pub fn collector(&self) -> &LogCollector {
        &self.collector
    }

    pub fn multicast(&self) -> &Multicast {
        &self.multicast
    }

    pub fn directory(&self) -> &Arc<StaticDirectory> {
        &self.directory
    }

    pub fn security(&self) -> &Arc<SecurityService> {
        &self.security
    }

    /// Cancelled when the server stops; cancel it to stop the server.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Reloads every pipeline from the repository.
    pub async fn refresh(&self) -> RefreshSummary {
        self.pipelines.refresh(self.repository.as_ref()).await
    }

    /// The identity endpoints merged with the domain endpoints.
    pub fn router(&self) -> Router {
        let state = Arc::new(ApiState {
            pipelines: self.pipelines.clone(),
            collector: self.collector.clone(),
            multicast: self.multicast.clone(),
            default_tenant: self.config.security.default_tenant.clone(),
        });
        pluglet_security::router(Arc::clone(&self.security)).merge(api::router(state))
    }

    /// Binds `[server].bind` and serves until Ctrl+C, SIGTERM or
    /// [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> RuntimeResult<()> {
        let addr = self.config.server.bind.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RuntimeError::Bind { addr, source })?;

        let signals = tokio::spawn(wait_for_signal(self.shutdown.clone()));
        info!("Pluglet is now running. Press Ctrl+C to stop.");
        let result = self.serve(listener).await;
        signals.abort();
        result
    }

    /// Serves on `listener` until the shutdown token is cancelled.
    ///
    /// The configuration is validated first, so a config built by hand
    /// fails here instead of inside a background loop. The first refresh
    /// must succeed for every domain. Afterwards refresh
    /// failures only keep the previous snapshots. On return every snapshot
    /// has been dropped.
    pub async fn serve(&self, listener: TcpListener) -> RuntimeResult<()> {
        validate_config(&self.config)?;

        let summary = self.refresh().await;
        if let Some((domain, e)) = summary.failures.into_iter().next() {
            error!(domain = %domain, "Initial plugin refresh failed");
            return Err(e.into());
        }

        if let Ok(addr) = listener.local_addr() {
            let external_url = self.security.settings().base_url();
            info!(%addr, %external_url, "Pluglet server listening");
        }

        let tasks = [self.spawn_refresh_loop(), self.spawn_sweeper()];
        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(self.shutdown.clone().cancelled_owned())
            .await;

        self.shutdown.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        self.pipelines.clear();
        info!("Pluglet server stopped");

        result.map_err(RuntimeError::Server)
    }

    fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        let pipelines = self.pipelines.clone();
        let repository = Arc::clone(&self.repository);
        let period = Duration::from_secs(self.config.refresh.interval_secs);
        every(period, self.shutdown.child_token(), move || {
            let pipelines = pipelines.clone();
            let repository = Arc::clone(&repository);
            async move {
                let summary = pipelines.refresh(repository.as_ref()).await;
                if !summary.is_complete() {
                    warn!(failed = summary.failures.len(), "Periodic refresh incomplete");
                }
            }
        })
    }

    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let security = Arc::clone(&self.security);
        let period = Duration::from_secs(self.config.security.sweep_interval_secs);
        every(period, self.shutdown.child_token(), move || {
            let purged = security.sweep();
            if purged > 0 {
                debug!(purged, "Expired security records purged");
            }
            std::future::ready(())
        })
    }
}

/// Runs `task` every `period`, skipping the immediate first tick, until
/// `token` is cancelled.
fn every<F, Fut>(period: Duration, token: CancellationToken, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => task().await,
            }
        }
    })
}

async fn wait_for_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                if signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, shutting down");
    }

    token.cancel();
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration, initializes logging and assembles the runtime.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir().with_user_config_dir(),
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: PlugletConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Overrides one dotted configuration key above every other source.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Leaves the global subscriber alone, e.g. when the host installed one.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> ConfigResult<PlugletRuntime> {
        let config = self.config_loader.load()?;
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            bind = %config.server.bind,
            "Runtime initialized from configuration"
        );
        Ok(PlugletRuntime::from_config(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
