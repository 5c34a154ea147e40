//! Versioned cache generation names.
//!
//! A generation is named `<app>-<kind>-v<version>`. Changing the version is
//! the only way to invalidate what a previous deploy cached.

use serde::{Deserialize, Serialize};

/// Which partition of the cache a generation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    /// Critical resources cached at install time and cache-first hits.
    Static,
    /// Runtime responses written by network-first and stale-while-revalidate.
    Dynamic,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Static => "static",
            GenerationKind::Dynamic => "dynamic",
        }
    }
}

/// Generation names for one app version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generations {
    app: String,
    version: String,
}

impl Generations {
    pub fn new(app: impl Into<String>, version: impl Into<String>) -> Self {
        Self { app: app.into(), version: version.into() }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `<app>-<kind>-v<version>`.
    pub fn name(&self, kind: GenerationKind) -> String {
        format!("{}-{}-v{}", self.app, kind.as_str(), self.version)
    }

    pub fn static_name(&self) -> String {
        self.name(GenerationKind::Static)
    }

    pub fn dynamic_name(&self) -> String {
        self.name(GenerationKind::Dynamic)
    }

    /// Release tag reported to clients, `<app>-v<version>`.
    pub fn release(&self) -> String {
        format!("{}-v{}", self.app, self.version)
    }

    /// True only for the current static and dynamic generation names.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name() || name == self.dynamic_name()
    }

    /// Split a generation name into its kind and version, if it belongs to this app.
    pub fn parse<'a>(&self, name: &'a str) -> Option<(GenerationKind, &'a str)> {
        let rest = name.strip_prefix(self.app.as_str())?.strip_prefix('-')?;
        let (kind, version) = rest.split_once('-')?;
        let version = version.strip_prefix('v')?;
        let kind = match kind {
            "static" => GenerationKind::Static,
            "dynamic" => GenerationKind::Dynamic,
            _ => return None,
        };
        Some((kind, version))
    }
}
