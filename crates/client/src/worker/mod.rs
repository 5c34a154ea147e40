//! The cache policy engine.
//!
//! A [`ServiceWorker`] is bound to one [`CachePolicy`] (one deploy version).
//! It moves through the install/activate lifecycle and answers intercepted
//! requests with one of three caching strategies. A [`Registration`] owns
//! the active and waiting workers and swaps them on version bumps.
//!
//! Every request path is infallible from the caller's point of view: network
//! and storage failures degrade to a cache lookup or a synthesized response.

pub mod fallback;
pub mod message;
pub mod registration;
mod strategy;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use swcache_core::{CachePolicy, CacheStorage, Error, Request, Response, Strategy};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

use crate::fetch::Fetcher;

pub use message::{ControlMessage, VersionReply};
pub use registration::{Registered, Registration};

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Shared handles the strategies and background tasks work with.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) policy: Arc<CachePolicy>,
    pub(crate) storage: Arc<dyn CacheStorage>,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// True once the worker is retired. Cache writes hold the read side for
    /// the duration of the write, so retiring waits out writes in flight.
    pub(crate) retired: Arc<RwLock<bool>>,
}

/// One version of the worker.
pub struct ServiceWorker {
    ctx: WorkerContext,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
    background: Mutex<JoinSet<()>>,
}

impl ServiceWorker {
    pub fn new(policy: Arc<CachePolicy>, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            ctx: WorkerContext { policy, storage, fetcher, retired: Arc::new(RwLock::new(false)) },
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.ctx.policy
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether this worker asked to activate without waiting.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    /// Whether this worker has taken control of open clients.
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    pub fn version_reply(&self) -> VersionReply {
        let generations = self.ctx.policy.generations();
        VersionReply {
            version: generations.release(),
            static_cache: generations.static_name(),
            dynamic_cache: generations.dynamic_name(),
        }
    }

    /// Move to `to` only if the worker is currently in `from`.
    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState(format!("expected {from:?}, worker is {:?}", *state)));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }

    /// Stop writing to the cache. Returns once no write is in flight, so
    /// deletions made afterwards cannot be undone by this worker.
    pub(crate) async fn retire(&self) {
        *self.ctx.retired.write().await = true;
    }

    /// Undo [`retire`](Self::retire) after a failed hand-over.
    pub(crate) async fn reinstate(&self) {
        *self.ctx.retired.write().await = false;
    }

    pub(crate) async fn mark_redundant(&self) {
        self.set_state(WorkerState::Redundant).await;
        self.clients_claimed.store(false, Ordering::SeqCst);
    }

    /// Fetch every critical resource and store them in the static generation.
    ///
    /// All or nothing: if any resource fails to fetch or answers with a
    /// non-success status, nothing is written and the worker becomes
    /// redundant.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;

        let generation = self.ctx.policy.generations().static_name();
        tracing::info!(generation = %generation, resources = self.ctx.policy.manifest().len(), "installing worker");

        let entries = match self.fetch_manifest().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "install failed");
                self.set_state(WorkerState::Redundant).await;
                return Err(e);
            }
        };

        let stored = async {
            self.ctx.storage.open(&generation).await?;
            self.ctx.storage.put_all(&generation, &entries).await
        }
        .await;
        if let Err(e) = stored {
            tracing::error!(error = %e, "install failed to store critical resources");
            self.set_state(WorkerState::Redundant).await;
            return Err(e);
        }

        self.set_state(WorkerState::Installed).await;
        if self.ctx.policy.skip_waiting() {
            self.request_skip_waiting();
        }
        tracing::info!(generation = %generation, cached = entries.len(), "install complete");
        Ok(())
    }

    async fn fetch_manifest(&self) -> Result<Vec<(Request, Response)>, Error> {
        let urls = self.ctx.policy.manifest().urls();
        let mut join_set = JoinSet::new();

        for (index, url) in urls.iter().enumerate() {
            let fetcher = Arc::clone(&self.ctx.fetcher);
            let request = Request::get(url.clone());
            join_set.spawn(async move {
                let result = fetcher.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut fetched: Vec<Option<(Request, Response)>> = vec![None; urls.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, request, result) = joined.map_err(|e| Error::InstallFailed {
                url: "<task>".into(),
                reason: e.to_string(),
            })?;

            let response = result.map_err(|e| Error::InstallFailed { url: request.url.to_string(), reason: e.to_string() })?;
            if !response.is_ok() {
                return Err(Error::InstallFailed {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            fetched[index] = Some((request, response));
        }

        Ok(fetched.into_iter().flatten().collect())
    }

    /// Delete every generation that isn't current, then claim clients.
    ///
    /// Returns the names of the deleted generations.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating).await?;
        tracing::info!(version = %self.ctx.policy.generations().release(), "activating worker");

        let deleted = match self.delete_stale_generations().await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                return Err(e);
            }
        };

        self.clients_claimed.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Activated).await;
        tracing::info!(deleted = deleted.len(), "activation complete, clients claimed");
        Ok(deleted)
    }

    async fn delete_stale_generations(&self) -> Result<Vec<String>, Error> {
        let generations = self.ctx.policy.generations();
        let mut deleted = Vec::new();
        for name in self.ctx.storage.keys().await? {
            if generations.is_current(&name) {
                continue;
            }
            tracing::info!(generation = %name, "deleting stale cache generation");
            if self.ctx.storage.delete(&name).await? {
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    pub fn classify(&self, request: &Request) -> Strategy {
        self.ctx.policy.classify(request)
    }

    /// Answer an intercepted request.
    ///
    /// Non-GET requests are never cached and go straight to the network.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        self.respond(request).await.1
    }

    /// Like [`handle_fetch`](Self::handle_fetch), also reporting the strategy
    /// applied. `None` means the request bypassed the cache.
    pub async fn respond(&self, request: &Request) -> (Option<Strategy>, Response) {
        if !request.is_get() {
            return (None, network_only(self.ctx.fetcher.as_ref(), request).await);
        }
        let strategy = self.classify(request);
        tracing::debug!(url = %request.url, strategy = %strategy, "intercepted request");
        (Some(strategy), self.execute(strategy, request).await)
    }

    /// Satisfy a request with the given strategy.
    pub async fn execute(&self, strategy: Strategy, request: &Request) -> Response {
        match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    /// Wait for background revalidations started so far.
    pub async fn settle(&self) {
        let mut background = std::mem::take(&mut *self.background.lock().await);
        while let Some(joined) = background.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "background revalidation task failed");
            }
        }
    }
}

/// Network only, 503 on failure. Used for uncached methods and when no
/// worker is active.
pub(crate) async fn network_only(fetcher: &dyn Fetcher, request: &Request) -> Response {
    match fetcher.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "network unavailable");
            fallback::unavailable(fallback::UNAVAILABLE)
        }
    }
}
