//! The three caching strategies.
//!
//! Storage failures here are logged and treated as a miss or a skipped
//! write. Network failures fall through to the cache or a fallback response.
//! Nothing is retried.

use swcache_core::{Destination, GenerationKind, Request, Response};

use super::{ServiceWorker, WorkerContext, fallback};

impl WorkerContext {
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.storage.match_any(request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn lookup_in(&self, kind: GenerationKind, request: &Request) -> Option<Response> {
        let generation = self.policy.generations().name(kind);
        match self.storage.match_in(&generation, request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, generation = %generation, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Write a successful response into the generation of the given kind.
    async fn store(&self, kind: GenerationKind, request: &Request, response: &Response) {
        if !response.is_ok() {
            return;
        }
        let retired = self.retired.read().await;
        let generation = self.policy.generations().name(kind);
        if *retired {
            tracing::debug!(url = %request.url, generation = %generation, "worker retired, skipping cache write");
            return;
        }
        if let Err(e) = self.storage.put(&generation, request, response).await {
            tracing::warn!(url = %request.url, generation = %generation, error = %e, "cache write failed");
        }
    }

    /// Background half of stale-while-revalidate.
    async fn revalidate(self, request: Request) {
        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                self.store(GenerationKind::Dynamic, &request, &response).await;
                tracing::debug!(url = %request.url, status = response.status, "revalidated");
            }
            Err(e) => tracing::debug!(url = %request.url, error = %e, "revalidation skipped, network unavailable"),
        }
    }
}

impl ServiceWorker {
    /// Cache hit short-circuits the network. A miss is fetched and, if
    /// successful, stored in the static generation.
    pub(super) async fn cache_first(&self, request: &Request) -> Response {
        if let Some(cached) = self.ctx.lookup(request).await {
            tracing::debug!(url = %request.url, "cache hit");
            return cached;
        }

        match self.ctx.fetcher.fetch(request).await {
            Ok(response) => {
                self.ctx.store(GenerationKind::Static, request, &response).await;
                response
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "cache miss and network unavailable");
                if request.destination == Destination::Image {
                    fallback::image_placeholder()
                } else {
                    fallback::unavailable(fallback::OFFLINE_UNAVAILABLE)
                }
            }
        }
    }

    /// Network response wins; successful ones refresh the dynamic generation.
    /// Offline, serve the cached copy, then the cached root page for
    /// navigations, then a 503.
    pub(super) async fn network_first(&self, request: &Request) -> Response {
        match self.ctx.fetcher.fetch(request).await {
            Ok(response) => {
                self.ctx.store(GenerationKind::Dynamic, request, &response).await;
                return response;
            }
            Err(e) => tracing::debug!(url = %request.url, error = %e, "network failed, trying cache"),
        }

        if let Some(cached) = self.ctx.lookup(request).await {
            return cached;
        }

        if request.is_navigation() {
            let root = Request::get(self.ctx.policy.navigation_fallback().clone());
            if let Some(page) = self.ctx.lookup(&root).await {
                tracing::debug!(url = %request.url, fallback = %root.url, "serving cached root page");
                return page;
            }
        }

        fallback::unavailable(fallback::UNAVAILABLE)
    }

    /// Serve the cached entry now and refresh it in the background. Without
    /// an entry, wait for the network.
    pub(super) async fn stale_while_revalidate(&self, request: &Request) -> Response {
        let cached = match self.ctx.lookup_in(GenerationKind::Dynamic, request).await {
            Some(hit) => Some(hit),
            None => self.ctx.lookup(request).await,
        };

        if let Some(cached) = cached {
            let ctx = self.ctx.clone();
            let request = request.clone();
            let mut background = self.background.lock().await;
            while let Some(finished) = background.try_join_next() {
                if let Err(e) = finished {
                    tracing::warn!(error = %e, "background revalidation task failed");
                }
            }
            background.spawn(ctx.revalidate(request));
            return cached;
        }

        match self.ctx.fetcher.fetch(request).await {
            Ok(response) => {
                self.ctx.store(GenerationKind::Dynamic, request, &response).await;
                response
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "no cached entry and network unavailable");
                fallback::unavailable(fallback::UNAVAILABLE)
            }
        }
    }
}
