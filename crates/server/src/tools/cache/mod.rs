//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and trimming cache generations.

pub mod generations;
pub mod purge;

pub use generations::{CacheGenerationsParams, generations_impl};
pub use purge::{CachePurgeParams, purge_impl};
