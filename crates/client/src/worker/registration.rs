//! Worker registration: which version is active, which one is waiting.

use std::sync::Arc;

use serde_json::Value;
use swcache_core::{CachePolicy, CacheStorage, Error, Request, Response, Strategy};
use tokio::sync::RwLock;

use super::message::{BACKGROUND_SYNC_TAG, ControlMessage, VersionReply};
use super::{ServiceWorker, network_only};
use crate::fetch::Fetcher;

/// Outcome of [`Registration::register`].
pub struct Registered {
    pub worker: Arc<ServiceWorker>,
    /// Generations deleted because the new worker activated right away.
    pub deleted: Vec<String>,
}

/// Owns the active and waiting workers for one origin.
pub struct Registration {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    active: RwLock<Option<Arc<ServiceWorker>>>,
    waiting: RwLock<Option<Arc<ServiceWorker>>>,
}

impl Registration {
    pub fn new(storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { storage, fetcher, active: RwLock::new(None), waiting: RwLock::new(None) }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        self.waiting.read().await.clone()
    }

    /// Install a worker for `policy`.
    ///
    /// A failed install leaves the current active worker in control. A
    /// successful one waits, unless nothing is active yet or the worker
    /// asked to skip waiting, in which case it is activated right away.
    pub async fn register(&self, policy: CachePolicy) -> Result<Registered, Error> {
        let worker = Arc::new(ServiceWorker::new(
            Arc::new(policy),
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
        ));
        worker.install().await?;

        let replaced = self.waiting.write().await.replace(Arc::clone(&worker));
        if let Some(previous) = replaced {
            previous.mark_redundant().await;
        }

        let nothing_active = self.active.read().await.is_none();
        let mut deleted = Vec::new();
        if nothing_active || worker.skip_waiting_requested() {
            deleted = self.skip_waiting().await?.unwrap_or_default();
        } else {
            tracing::info!(version = %worker.policy().generations().release(), "worker installed and waiting");
        }

        Ok(Registered { worker, deleted })
    }

    /// Promote the waiting worker.
    ///
    /// Returns the generations deleted by its activation, or `None` if no
    /// worker was waiting. If activation fails, the previous workers are
    /// restored.
    ///
    /// The previous worker keeps answering requests, read-only, until its
    /// background work is done. The new worker then takes the active slot
    /// and answers requests while it deletes stale generations.
    pub async fn skip_waiting(&self) -> Result<Option<Vec<String>>, Error> {
        let Some(next) = self.waiting.write().await.take() else {
            return Ok(None);
        };

        let previous = self.active().await;
        if let Some(previous) = &previous {
            previous.retire().await;
            previous.settle().await;
        }

        *self.active.write().await = Some(Arc::clone(&next));
        match next.activate().await {
            Ok(deleted) => {
                if let Some(previous) = previous {
                    previous.mark_redundant().await;
                }
                Ok(Some(deleted))
            }
            Err(e) => {
                tracing::error!(error = %e, "activation failed");
                if let Some(previous) = &previous {
                    previous.reinstate().await;
                }
                *self.active.write().await = previous;
                *self.waiting.write().await = Some(next);
                Err(e)
            }
        }
    }

    /// Route an intercepted request to the active worker. Without one,
    /// requests go straight to the network.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        self.dispatch(request).await.1
    }

    /// Like [`handle_fetch`](Self::handle_fetch), also reporting the strategy
    /// the answering worker applied. `None` means the request bypassed the
    /// cache.
    pub async fn dispatch(&self, request: &Request) -> (Option<Strategy>, Response) {
        match self.active().await {
            Some(worker) => worker.respond(request).await,
            None => (None, network_only(self.fetcher.as_ref(), request).await),
        }
    }

    /// Handle a message posted by a page.
    ///
    /// Only `GET_VERSION` produces a reply. Unrecognized messages are ignored.
    pub async fn post_message(&self, message: &Value) -> Option<VersionReply> {
        let Some(message) = ControlMessage::parse(message) else {
            tracing::debug!(%message, "ignoring unrecognized control message");
            return None;
        };

        match message {
            ControlMessage::SkipWaiting => {
                match self.skip_waiting().await {
                    Ok(Some(_)) => tracing::info!("waiting worker activated on request"),
                    Ok(None) => tracing::debug!("skip waiting requested with no waiting worker"),
                    Err(e) => tracing::warn!(error = %e, "skip waiting failed"),
                }
                None
            }
            ControlMessage::GetVersion => {
                let worker = match self.active().await {
                    Some(worker) => Some(worker),
                    None => self.waiting().await,
                };
                worker.map(|worker| worker.version_reply())
            }
        }
    }

    /// Handle a background sync event. Returns whether the tag was handled.
    pub async fn sync(&self, tag: &str) -> bool {
        if tag != BACKGROUND_SYNC_TAG {
            tracing::debug!(tag, "ignoring sync event");
            return false;
        }
        tracing::info!("background sync");
        true
    }

    /// Wait for the active worker's background work.
    pub async fn settle(&self) {
        if let Some(worker) = self.active().await {
            worker.settle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use swcache_core::{AppConfig, Destination, MemoryStorage};
    use url::Url;

    use super::super::WorkerState;
    use super::super::testing::ScriptedFetcher;
    use super::*;

    fn config(version: &str, skip_waiting: bool) -> AppConfig {
        AppConfig {
            origin: "https://fitlog.example/".into(),
            version: version.into(),
            manifest: vec!["./".into()],
            skip_waiting,
            ..Default::default()
        }
    }

    fn policy(version: &str, skip_waiting: bool) -> CachePolicy {
        CachePolicy::from_config(&config(version, skip_waiting)).unwrap()
    }

    fn setup() -> (Registration, Arc<MemoryStorage>, Arc<ScriptedFetcher>) {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.route("https://fitlog.example/", Response::new(200, "home"));
        let registration = Registration::new(storage.clone(), fetcher.clone());
        (registration, storage, fetcher)
    }

    #[tokio::test]
    async fn test_first_registration_activates() {
        let (registration, _, _) = setup();
        let worker = registration.register(policy("1.0.0", false)).await.unwrap().worker;

        assert_eq!(worker.state().await, WorkerState::Activated);
        assert!(registration.waiting().await.is_none());
        assert!(registration.active().await.is_some());
    }

    #[tokio::test]
    async fn test_version_bump_with_skip_waiting_purges_old_generations() {
        let (registration, storage, _) = setup();
        registration.register(policy("1.0.0", true)).await.unwrap();
        storage
            .put("fitlog-dynamic-v1.0.0", &Request::get(Url::parse("https://fitlog.example/x.js").unwrap()), &Response::new(200, "x"))
            .await
            .unwrap();

        let old = registration.active().await.unwrap();
        let Registered { worker: new, mut deleted } = registration.register(policy("1.1.0", true)).await.unwrap();

        deleted.sort();
        assert_eq!(deleted, ["fitlog-dynamic-v1.0.0", "fitlog-static-v1.0.0"]);
        assert_eq!(new.state().await, WorkerState::Activated);
        assert_eq!(old.state().await, WorkerState::Redundant);
        let keys = storage.keys().await.unwrap();
        assert!(keys.iter().all(|name| !name.contains("v1.0.0")), "{keys:?}");
        assert!(keys.contains(&"fitlog-static-v1.1.0".to_string()));
    }

    #[tokio::test]
    async fn test_new_version_waits_without_skip_waiting() {
        let (registration, _, _) = setup();
        registration.register(policy("1.0.0", false)).await.unwrap();
        let next = registration.register(policy("1.1.0", false)).await.unwrap().worker;

        assert_eq!(next.state().await, WorkerState::Installed);
        assert!(registration.register(policy("1.1.1", false)).await.unwrap().deleted.is_empty());
        let next = registration.waiting().await.unwrap();
        let reply = registration.post_message(&json!({"type": "GET_VERSION"})).await.unwrap();
        assert_eq!(reply.version, "fitlog-v1.0.0");

        assert!(registration.post_message(&json!({"type": "SKIP_WAITING"})).await.is_none());

        assert_eq!(next.state().await, WorkerState::Activated);
        let reply = registration.post_message(&json!({"type": "GET_VERSION"})).await.unwrap();
        assert_eq!(reply.version, "fitlog-v1.1.1");
    }

    #[tokio::test]
    async fn test_failed_install_keeps_active_worker() {
        let (registration, storage, fetcher) = setup();
        registration.register(policy("1.0.0", true)).await.unwrap();

        fetcher.set_offline(true);
        let result = registration.register(policy("1.1.0", true)).await;

        assert!(matches!(result, Err(Error::InstallFailed { .. })));
        let active = registration.active().await.unwrap();
        assert_eq!(active.version_reply().version, "fitlog-v1.0.0");
        assert!(storage.keys().await.unwrap().contains(&"fitlog-static-v1.0.0".to_string()));
    }

    #[tokio::test]
    async fn test_no_active_worker_passes_through() {
        let (registration, storage, fetcher) = setup();
        let request = Request::get(Url::parse("https://fitlog.example/").unwrap());

        assert_eq!(registration.handle_fetch(&request).await.text(), Some("home"));
        assert!(storage.keys().await.unwrap().is_empty());

        fetcher.set_offline(true);
        assert_eq!(registration.handle_fetch(&request).await.status, 503);
    }

    #[tokio::test]
    async fn test_unknown_messages_are_ignored() {
        let (registration, _, _) = setup();
        registration.register(policy("1.0.0", true)).await.unwrap();

        assert!(registration.post_message(&json!({"type": "CLEAR_ALL"})).await.is_none());
        assert!(registration.post_message(&json!(42)).await.is_none());
        assert!(registration.active().await.is_some());
    }

    #[tokio::test]
    async fn test_skip_waiting_without_waiting_worker() {
        let (registration, _, _) = setup();
        assert!(registration.skip_waiting().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sync_tags() {
        let (registration, _, _) = setup();
        assert!(registration.sync("background-sync").await);
        assert!(!registration.sync("periodic-news").await);
    }

    #[tokio::test]
    async fn test_dispatch_reports_strategy() {
        let (registration, _, _) = setup();
        let root = Request::get(Url::parse("https://fitlog.example/").unwrap());
        assert_eq!(registration.dispatch(&root).await.0, None);

        registration.register(policy("1.0.0", false)).await.unwrap();
        let (strategy, response) = registration.dispatch(&root).await;
        assert_eq!(strategy, Some(Strategy::CacheFirst));
        assert_eq!(response.text(), Some("home"));

        let post = Request::new("POST", Url::parse("https://fitlog.example/").unwrap(), Destination::default(), Default::default());
        assert_eq!(registration.dispatch(&post).await.0, None);
    }

    #[tokio::test]
    async fn test_cache_keeps_answering_while_old_worker_settles() {
        let (registration, _, fetcher) = setup();
        let strings = Request::get(Url::parse("https://fitlog.example/assets/js/i18n.js").unwrap());
        fetcher.route(strings.url.as_str(), Response::new(200, "strings"));
        registration.register(policy("1.0.0", false)).await.unwrap();
        registration.register(policy("1.1.0", false)).await.unwrap();
        registration.handle_fetch(&strings).await;

        fetcher.set_delay(Duration::from_millis(300));
        fetcher.set_offline(true);
        assert_eq!(registration.handle_fetch(&strings).await.text(), Some("strings"));

        let root = Request::get(Url::parse("https://fitlog.example/").unwrap());
        let (activated, (had_active, response)) = tokio::join!(registration.skip_waiting(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            (registration.active().await.is_some(), registration.handle_fetch(&root).await)
        });

        assert!(activated.unwrap().is_some());
        assert!(had_active);
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), Some("home"));
    }

    #[tokio::test]
    async fn test_slow_response_does_not_recreate_deleted_generation() {
        let (registration, storage, fetcher) = setup();
        registration.register(policy("1.0.0", false)).await.unwrap();
        registration.register(policy("1.1.0", false)).await.unwrap();

        let photo = Request::get(Url::parse("https://fitlog.example/assets/images/hero.jpg").unwrap())
            .with_destination(Destination::Image);
        fetcher.route(photo.url.as_str(), Response::new(200, "jpeg"));
        fetcher.set_delay(Duration::from_millis(200));

        let (response, deleted) = tokio::join!(registration.handle_fetch(&photo), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            registration.skip_waiting().await
        });

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), Some("jpeg"));
        assert_eq!(deleted.unwrap(), Some(vec!["fitlog-static-v1.0.0".to_string()]));
        assert_eq!(storage.keys().await.unwrap(), ["fitlog-static-v1.1.0"]);
    }
}
