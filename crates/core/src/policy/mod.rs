//! Cache policy: generation naming, the critical resource manifest and
//! request classification.
//!
//! A [`CachePolicy`] is built once from [`AppConfig`] and shared read-only by
//! the worker for its whole lifetime.

mod classify;
mod generation;
mod manifest;

pub use classify::Strategy;
pub use generation::{GenerationKind, Generations};
pub use manifest::Manifest;

use url::Url;

use crate::{AppConfig, Error};

/// Immutable caching policy for one deploy version.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    origin: Url,
    generations: Generations,
    manifest: Manifest,
    network_first_hosts: Vec<String>,
    navigation_fallback: Url,
    skip_waiting: bool,
}

impl CachePolicy {
    /// Build the policy from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let manifest = Manifest::resolve(&origin, &config.manifest)?;
        let navigation_fallback = origin
            .join(config.navigation_fallback.trim())
            .map_err(|e| Error::InvalidUrl(format!("navigation_fallback: {e}")))?;
        let network_first_hosts = config
            .network_first_hosts
            .iter()
            .map(|host| host.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();

        Ok(Self {
            generations: Generations::new(&config.app_name, &config.version),
            origin,
            manifest,
            network_first_hosts,
            navigation_fallback,
            skip_waiting: config.skip_waiting,
        })
    }

    /// The same policy for another deploy version.
    pub fn with_version(&self, version: &str) -> Result<Self, Error> {
        let version = version.trim();
        if version.is_empty() || version.contains('-') || version.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!("invalid version: {version:?}")));
        }
        let mut policy = self.clone();
        policy.generations = Generations::new(self.generations.app(), version);
        Ok(policy)
    }

    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn generations(&self) -> &Generations {
        &self.generations
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn network_first_hosts(&self) -> &[String] {
        &self.network_first_hosts
    }

    /// Cached page served to navigations when the network is unreachable.
    pub fn navigation_fallback(&self) -> &Url {
        &self.navigation_fallback
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }
}
