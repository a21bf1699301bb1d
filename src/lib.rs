//! Muninn: cache-aside refresh coordination for multi-tenant upstream data.
//!
//! The integrations backend talks to rate-limited third-party APIs (messaging
//! gateways, banking aggregators) whose responses are expensive to rebuild.
//! This crate coordinates when and how those cached responses are refreshed:
//! - Lock-free reads that always serve what the store has, never an error
//! - Stale-while-revalidate: stale entries keep being served while a
//!   detached task rebuilds them
//! - A short-TTL store lock collapsing concurrent refreshes into one
//!   upstream call per key, across processes
//! - Versioned sync metadata with payload integrity checksums
//! - Prometheus metrics for hits, misses, refresh outcomes, and contention
//!
//! Storage itself (eviction, replication, persistence) belongs to the
//! external key-value store behind the [`store::KvStore`] seam.

pub mod cache;
pub mod chats;
pub mod config;
pub mod error;
pub mod metrics;
pub mod store;

pub use cache::{CacheMetadata, CachedEntry, RefreshCoordinator, RefreshStatus, Scope};
pub use config::CacheConfig;
pub use error::CacheError;
pub use metrics::{create_metrics, Metrics, SharedMetrics};
pub use store::{KvStore, MemoryStore};
