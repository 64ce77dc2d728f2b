//! # bff-store
//!
//! TTL-based key-value store abstraction holding sessions and short-lived
//! pending-authorization records.
//!
//! Two interchangeable backends satisfy the same contract: an in-process map
//! for local development and a Redis-backed store for real deployments.
//! Backends with deferred physical deletion re-check the stored expiry on
//! every read, so expired entries behave as absent everywhere.

#![warn(clippy::all)]

pub mod backend;
pub mod errors;
pub mod memory;
pub mod redis_impl;
pub mod traits;

pub use backend::{build_store, StoreBackend};
pub use errors::{Result, StoreError};
pub use memory::MemoryStore;
pub use redis_impl::RedisStore;
pub use traits::{current_timestamp, KvStore, StoredEntry};
