//! Chain of responsibility over resolved plugin instances.
//!
//! A [`Chain`] is an ordered, immutable list of [`Link`]s plus a terminal
//! service. Executing it hands every link the shared exchange and a [`Next`]
//! continuation. A link either returns without calling `next` (the chain is
//! short-circuited and the terminal never runs) or calls
//! [`Next::run`] to continue. `Next` is consumed by value, so no link can
//! advance the chain twice.
//!
//! The terminal is any `tower::Service<Arc<X>, Response = ()>`, which lets
//! the chain wrap an HTTP handler ([`ChainLayer`]) or be mounted as one
//! ([`ChainService`]).

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt, service_fn};
use tower_layer::Layer;
use tracing::{Instrument, debug_span, trace};

use pluglet_core::BoxError;

/// Outcome of a link or of the whole chain.
pub type ChainResult = Result<(), BoxError>;

/// The handler that runs after the last link.
pub type Terminal<X> = BoxCloneSyncService<Arc<X>, (), BoxError>;

/// One step of a chain.
#[async_trait]
pub trait Link<X: Send + Sync + 'static>: Send + Sync {
    async fn execute(&self, exchange: Arc<X>, next: Next<X>) -> ChainResult;
}

/// A link with its ordering key.
pub struct ChainEntry<X: Send + Sync + 'static> {
    pub id: String,
    pub priority: i32,
    pub link: Arc<dyn Link<X>>,
}

impl<X: Send + Sync + 'static> ChainEntry<X> {
    pub fn new(id: impl Into<String>, priority: i32, link: Arc<dyn Link<X>>) -> Self {
        Self {
            id: id.into(),
            priority,
            link,
        }
    }
}

impl<X: Send + Sync + 'static> Clone for ChainEntry<X> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            priority: self.priority,
            link: Arc::clone(&self.link),
        }
    }
}

impl<X: Send + Sync + 'static> fmt::Debug for ChainEntry<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Sorts entries by ascending priority, ties broken by id.
pub fn order_entries<X: Send + Sync + 'static>(entries: &mut [ChainEntry<X>]) {
    entries.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
}

/// A terminal that does nothing; the chain's effect is in its links.
pub fn noop_terminal<X: Send + Sync + 'static>() -> Terminal<X> {
    BoxCloneSyncService::new(service_fn(|_: Arc<X>| async { Ok::<_, BoxError>(()) }))
}

// ─── Next ─────────────────────────────────────────────────────────────────────

/// The rest of the chain after the current link.
pub struct Next<X: Send + Sync + 'static> {
    links: Arc<[ChainEntry<X>]>,
    cursor: usize,
    terminal: Terminal<X>,
}

impl<X: Send + Sync + 'static> Next<X> {
    /// Continues with the following link, or the terminal after the last one.
    pub fn run(self, exchange: Arc<X>) -> BoxFuture<'static, ChainResult> {
        let Some(entry) = self.links.get(self.cursor) else {
            trace!("Chain reached its terminal");
            let terminal = self.terminal;
            return async move { terminal.oneshot(exchange).await }.boxed();
        };

        trace!(link = %entry.id, position = self.cursor, "Executing chain link");
        let link = Arc::clone(&entry.link);
        let next = Next {
            links: Arc::clone(&self.links),
            cursor: self.cursor + 1,
            terminal: self.terminal,
        };
        async move { link.execute(exchange, next).await }.boxed()
    }

    /// Number of links not yet executed.
    pub fn remaining(&self) -> usize {
        self.links.len().saturating_sub(self.cursor)
    }
}

// ─── Chain ────────────────────────────────────────────────────────────────────

/// An ordered chain snapshot with its terminal.
pub struct Chain<X: Send + Sync + 'static> {
    links: Arc<[ChainEntry<X>]>,
    terminal: Terminal<X>,
}

impl<X: Send + Sync + 'static> Chain<X> {
    pub fn new(mut entries: Vec<ChainEntry<X>>, terminal: Terminal<X>) -> Self {
        order_entries(&mut entries);
        Self {
            links: entries.into(),
            terminal,
        }
    }

    /// Builds a chain over an already ordered snapshot.
    pub fn from_ordered(links: Arc<[ChainEntry<X>]>, terminal: Terminal<X>) -> Self {
        Self { links, terminal }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Link ids in execution order.
    pub fn ids(&self) -> Vec<&str> {
        self.links.iter().map(|e| e.id.as_str()).collect()
    }

    pub async fn execute(&self, exchange: Arc<X>) -> ChainResult {
        let span = debug_span!("chain", links = self.links.len());
        Next {
            links: Arc::clone(&self.links),
            cursor: 0,
            terminal: self.terminal.clone(),
        }
        .run(exchange)
        .instrument(span)
        .await
    }
}

impl<X: Send + Sync + 'static> Clone for Chain<X> {
    fn clone(&self) -> Self {
        Self {
            links: Arc::clone(&self.links),
            terminal: self.terminal.clone(),
        }
    }
}

impl<X: Send + Sync + 'static> fmt::Debug for Chain<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("links", &self.ids()).finish()
    }
}

// ─── Tower integration ────────────────────────────────────────────────────────

/// A [`Chain`] as a tower service.
pub struct ChainService<X: Send + Sync + 'static> {
    chain: Chain<X>,
}

impl<X: Send + Sync + 'static> Clone for ChainService<X> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
        }
    }
}

impl<X: Send + Sync + 'static> ChainService<X> {
    pub fn new(chain: Chain<X>) -> Self {
        Self { chain }
    }
}

impl<X: Send + Sync + 'static> Service<Arc<X>> for ChainService<X> {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, ChainResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, exchange: Arc<X>) -> Self::Future {
        let chain = self.chain.clone();
        async move { chain.execute(exchange).await }.boxed()
    }
}

/// Layer that runs a fixed link list in front of the wrapped service.
pub struct ChainLayer<X: Send + Sync + 'static> {
    links: Arc<[ChainEntry<X>]>,
}

impl<X: Send + Sync + 'static> ChainLayer<X> {
    pub fn new(mut entries: Vec<ChainEntry<X>>) -> Self {
        order_entries(&mut entries);
        Self {
            links: entries.into(),
        }
    }
}

impl<X: Send + Sync + 'static> Clone for ChainLayer<X> {
    fn clone(&self) -> Self {
        Self {
            links: Arc::clone(&self.links),
        }
    }
}

impl<X, S> Layer<S> for ChainLayer<X>
where
    X: Send + Sync + 'static,
    S: Service<Arc<X>, Response = (), Error = BoxError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = ChainService<X>;

    fn layer(&self, inner: S) -> Self::Service {
        ChainService::new(Chain::from_ordered(
            Arc::clone(&self.links),
            BoxCloneSyncService::new(inner),
        ))
    }
}

/// Adapts a plain async function into a link.
pub struct FnLink<F>(pub F);

#[async_trait]
impl<X, F> Link<X> for FnLink<F>
where
    X: Send + Sync + 'static,
    F: Fn(Arc<X>, Next<X>) -> BoxFuture<'static, ChainResult> + Send + Sync,
{
    async fn execute(&self, exchange: Arc<X>, next: Next<X>) -> ChainResult {
        (self.0)(exchange, next).await
    }
}
