//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - HTTP request/response values exchanged with the cache and the network
//! - Cache policy (generations, critical resource manifest, classification)
//! - Cache storage with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod policy;

pub use cache::{CacheDb, CacheStorage, MemoryStorage};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Destination, Request, RequestMode, Response};
pub use policy::{CachePolicy, GenerationKind, Generations, Manifest, Strategy};
