//! Request classification into caching strategies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CachePolicy;
use crate::http::{Destination, Request};
use crate::Error;

/// How a request is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Serve from cache; go to the network only on a miss.
    CacheFirst,
    /// Go to the network; fall back to the cache when it fails.
    NetworkFirst,
    /// Serve from cache and refresh the entry in the background.
    StaleWhileRevalidate,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::CacheFirst, Strategy::NetworkFirst, Strategy::StaleWhileRevalidate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown strategy: {s}")))
    }
}

impl CachePolicy {
    /// Pick the caching strategy for a request.
    ///
    /// First match wins:
    /// 1. critical resource (manifest URL) -> cache-first
    /// 2. network-first host (map/geolocation providers) -> network-first
    /// 3. image destination -> cache-first
    /// 4. navigation -> network-first
    /// 5. anything else -> stale-while-revalidate
    pub fn classify(&self, request: &Request) -> Strategy {
        if self.manifest.contains(&request.url) {
            return Strategy::CacheFirst;
        }
        if self.is_network_first_host(&request.url) {
            return Strategy::NetworkFirst;
        }
        if request.destination == Destination::Image {
            return Strategy::CacheFirst;
        }
        if request.is_navigation() {
            return Strategy::NetworkFirst;
        }
        Strategy::StaleWhileRevalidate
    }

    fn is_network_first_host(&self, url: &url::Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.network_first_hosts.iter().any(|candidate| {
            host == candidate
                || host
                    .strip_suffix(candidate.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}
