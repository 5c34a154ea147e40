//! Critical resource manifest.

use url::Url;

use crate::Error;

/// Ordered list of critical resource URLs, resolved against the site origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    urls: Vec<Url>,
}

impl Manifest {
    /// Resolve manifest entries (relative or absolute) against `origin`.
    ///
    /// Order is preserved and duplicates are dropped.
    pub fn resolve<S: AsRef<str>>(origin: &Url, entries: &[S]) -> Result<Self, Error> {
        let mut urls: Vec<Url> = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref().trim();
            let mut url = origin
                .join(entry)
                .map_err(|e| Error::InvalidUrl(format!("manifest entry {entry:?}: {e}")))?;
            url.set_fragment(None);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(Self { urls })
    }

    /// Exact match against a manifest URL, ignoring the fragment.
    pub fn contains(&self, url: &Url) -> bool {
        if url.fragment().is_some() {
            let mut url = url.clone();
            url.set_fragment(None);
            self.urls.contains(&url)
        } else {
            self.urls.contains(url)
        }
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
