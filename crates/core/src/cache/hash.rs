//! Cache entry key generation.

use sha2::{Digest, Sha256};

/// Compute the key of a cached entry from the request method and URL.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
