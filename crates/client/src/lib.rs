//! Client code for swcache.
//!
//! This crate provides the network fetch pipeline and the cache policy
//! engine (the worker) shared by the server.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use worker::{ControlMessage, Registered, Registration, ServiceWorker, VersionReply, WorkerState};
