//! Cache storage for versioned generations of request/response pairs.
//!
//! [`CacheStorage`] is the seam the worker talks to. Two backends implement it:
//!
//! - [`CacheDb`]: persistent SQLite store with async access via tokio-rusqlite,
//!   automatic schema migrations and WAL mode
//! - [`MemoryStorage`]: process-local store for tests and ephemeral runs
//!
//! Every operation is atomic on its own; nothing spans calls.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use async_trait::async_trait;

pub use crate::Error;
use crate::http::{Request, Response};

pub use connection::CacheDb;
pub use memory::MemoryStorage;

/// Named cache generations holding request/response pairs.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if it doesn't exist.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// Generation names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation and everything in it.
    ///
    /// Returns false if no such generation existed.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;

    /// Look up a request in one generation.
    async fn match_in(&self, generation: &str, request: &Request) -> Result<Option<Response>, Error>;

    /// Look up a request across all generations, oldest generation first.
    async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Store a response, replacing any previous entry for the same request.
    ///
    /// Creates the generation if needed.
    async fn put(&self, generation: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// Store all entries or none of them.
    async fn put_all(&self, generation: &str, entries: &[(Request, Response)]) -> Result<(), Error>;

    /// Number of entries in a generation (0 if it doesn't exist).
    async fn entry_count(&self, generation: &str) -> Result<u64, Error>;
}
