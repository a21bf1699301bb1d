//! Cache-aside refresh coordination.
//!
//! This module is the core of the crate:
//! - Deterministic key derivation per (namespace, resource, tenant, client)
//! - Sync metadata with version continuity and staleness evaluation
//! - MessagePack payload encoding with integrity checksums
//! - The refresh coordinator: lock-free reads, locked refreshes, background
//!   stale-while-revalidate, forced synchronous refresh, invalidation

pub mod codec;
pub mod coordinator;
pub mod keys;
pub mod metadata;

pub use coordinator::{CachedEntry, RefreshCoordinator};
pub use keys::{key_set, KeySet, Scope};
pub use metadata::{CacheMetadata, RefreshStatus};
