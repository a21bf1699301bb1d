//! Key-value store seam.
//!
//! The coordinator never talks to a concrete store; it goes through the
//! [`KvStore`] trait. The store is the only collaborator expected to provide
//! cross-process atomicity (`set_if_absent`) and TTL eviction. Everything
//! layered on top of it here is orchestration, not storage.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// An external key-value store with TTL eviction and atomic conditional set.
///
/// Values are opaque byte strings. `get` returns `Ok(None)` for missing keys;
/// `del` succeeds even when the key is absent. `set_if_absent` must be atomic
/// with respect to concurrent callers across processes; it is the primitive
/// the refresh lock is built on.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Store `value` under `key` only if the key is currently absent.
    /// Returns `true` when the value was written.
    async fn set_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool, CacheError>;
}
