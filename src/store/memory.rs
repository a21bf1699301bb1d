//! In-process [`KvStore`] implementation.
//!
//! Backs tests and single-process deployments that don't want an external
//! store. TTL expiry is lazy: an expired entry is dropped by the first
//! operation that touches it, which is the same observable behavior as
//! store-side eviction.

use crate::error::CacheError;
use crate::store::KvStore;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn new(bytes: Vec<u8>, ttl: Duration) -> Self {
        Self {
            bytes,
            expires_at: Instant::now() + ttl,
        }
    }

    fn expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// Concurrent in-memory store with per-key TTLs.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.value().expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired() {
                return Ok(Some(entry.bytes.clone()));
            }
        }
        // Drop the expired entry so it doesn't linger.
        self.entries.remove_if(key, |_, v| v.expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_owned(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        // The entry API holds the shard lock, making the check-and-insert
        // atomic with respect to concurrent callers.
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut slot) => {
                if slot.get().expired() {
                    slot.insert(StoredValue::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
        }
    }
}
