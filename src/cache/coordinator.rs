//! Cache-aside refresh coordination.
//!
//! [`RefreshCoordinator`] sits between request handlers and expensive,
//! rate-limited upstream fetches. Reads are always lock-free and served from
//! the store; rebuilding an entry goes through a short-TTL lock so that
//! concurrent requests (and concurrent server instances) collapse into a
//! single upstream call. Stale entries keep being served while a background
//! refresh replaces them.
//!
//! The producer is a caller-supplied async closure performing the actual
//! upstream fetch, including any enrichment it wants to compose in (for
//! example joining contact names onto a chat list). The coordinator treats
//! its output as an opaque record list.

use crate::cache::codec;
use crate::cache::keys::{key_set, KeySet, Scope};
use crate::cache::metadata::{CacheMetadata, RefreshStatus};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics::SharedMetrics;
use crate::store::KvStore;
use chrono::Utc;
use futures::future;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A successfully read cache entry: the domain records plus the sync
/// metadata they were stored with.
#[derive(Debug, Clone)]
pub struct CachedEntry<T> {
    pub records: Vec<T>,
    pub meta: CacheMetadata,
}

enum RefreshMode {
    Background,
    Forced,
}

enum RefreshOutcome<T> {
    Completed {
        records: Vec<T>,
        meta: CacheMetadata,
    },
    Skipped,
}

/// Coordinates cache reads, staleness evaluation, and locked refreshes for
/// one resource type within one namespace.
///
/// Holds an explicit store handle created at startup; cloning is cheap and
/// clones share the same store and metrics.
pub struct RefreshCoordinator<T> {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
    resource: String,
    metrics: SharedMetrics,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for RefreshCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            resource: self.resource.clone(),
            metrics: self.metrics.clone(),
            _records: PhantomData,
        }
    }
}

impl<T> RefreshCoordinator<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(
        store: Arc<dyn KvStore>,
        config: CacheConfig,
        resource: impl Into<String>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            store,
            config,
            resource: resource.into(),
            metrics,
            _records: PhantomData,
        }
    }

    fn keys(&self, scope: &Scope) -> KeySet {
        key_set(&self.config.namespace, &self.resource, scope)
    }

    /// Read the cached entry, if any.
    ///
    /// Payload and metadata are fetched concurrently. Any store error,
    /// missing half, decode failure, or checksum mismatch degrades to `None`;
    /// this never fails.
    pub async fn read_cached(&self, scope: &Scope) -> Option<CachedEntry<T>> {
        let keys = self.keys(scope);
        let (payload_res, meta_res) = future::join(
            self.store.get(&keys.payload),
            self.store.get(&keys.meta),
        )
        .await;

        let payload = match payload_res {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    resource = %self.resource,
                    "Cache MISS (no payload)"
                );
                self.metrics.record_read("miss");
                return None;
            }
            Err(e) => {
                warn!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    error = %e,
                    "Payload read failed, treating as miss"
                );
                self.metrics.record_read_failure("store_error");
                self.metrics.record_read("miss");
                return None;
            }
        };

        let meta_bytes = match meta_res {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    resource = %self.resource,
                    "Cache MISS (no metadata)"
                );
                self.metrics.record_read("miss");
                return None;
            }
            Err(e) => {
                warn!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    error = %e,
                    "Metadata read failed, treating as miss"
                );
                self.metrics.record_read_failure("store_error");
                self.metrics.record_read("miss");
                return None;
            }
        };

        let meta: CacheMetadata = match serde_json::from_slice(&meta_bytes) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    error = %e,
                    "Corrupt cache metadata, treating as miss"
                );
                self.metrics.record_read_failure("decode_error");
                self.metrics.record_read("miss");
                return None;
            }
        };

        if codec::payload_checksum(&payload) != meta.checksum {
            warn!(
                tenant = %scope.tenant,
                client = %scope.client,
                version = meta.version,
                "Payload/metadata checksum mismatch, treating as miss"
            );
            self.metrics.record_read_failure("checksum_mismatch");
            self.metrics.record_read("miss");
            return None;
        }

        let records = match codec::decode_records(&payload) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    error = %e,
                    "Corrupt cache payload, treating as miss"
                );
                self.metrics.record_read_failure("decode_error");
                self.metrics.record_read("miss");
                return None;
            }
        };

        debug!(
            tenant = %scope.tenant,
            client = %scope.client,
            resource = %self.resource,
            version = meta.version,
            items = meta.item_count,
            "Cache HIT"
        );
        self.metrics.record_read("hit");
        Some(CachedEntry { records, meta })
    }

    /// Staleness at the configured threshold ratio.
    ///
    /// A missing or unreadable entry is stale by convention.
    pub async fn is_stale(&self, scope: &Scope) -> bool {
        self.is_stale_with_ratio(scope, self.config.stale_ratio).await
    }

    pub async fn is_stale_with_ratio(&self, scope: &Scope, ratio: f64) -> bool {
        let keys = self.keys(scope);
        match self.read_meta(&keys.meta).await {
            Some(meta) => meta.is_stale(Utc::now(), ratio),
            None => true,
        }
    }

    /// The caller policy in one call: serve a hit immediately (kicking off a
    /// background refresh when it is stale), fall back to a synchronous
    /// refresh on a miss.
    pub async fn fetch<P, Fut>(
        &self,
        scope: &Scope,
        producer: P,
    ) -> Result<CachedEntry<T>, CacheError>
    where
        P: FnOnce(Scope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, CacheError>> + Send + 'static,
    {
        if let Some(entry) = self.read_cached(scope).await {
            if entry.meta.is_stale(Utc::now(), self.config.stale_ratio) {
                debug!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    resource = %self.resource,
                    "Cache hit (stale), refreshing in background"
                );
                self.refresh_in_background(scope, producer);
            }
            return Ok(entry);
        }

        debug!(
            tenant = %scope.tenant,
            client = %scope.client,
            resource = %self.resource,
            "Cache miss, refreshing synchronously"
        );
        self.refresh_sync(scope, producer).await
    }

    /// Rebuild the entry in a detached task.
    ///
    /// All errors are logged, never surfaced; a concurrent refresh makes this
    /// a no-op. The handle is returned for callers that want to await
    /// completion (tests, shutdown paths); dropping it is fine.
    pub fn refresh_in_background<P, Fut>(&self, scope: &Scope, producer: P) -> JoinHandle<()>
    where
        P: FnOnce(Scope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, CacheError>> + Send + 'static,
    {
        let coordinator = self.clone();
        let scope = scope.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            match coordinator
                .refresh_locked(&scope, producer, RefreshMode::Background)
                .await
            {
                Ok(RefreshOutcome::Completed { meta, .. }) => {
                    coordinator.metrics.record_refresh(
                        "background",
                        "success",
                        started.elapsed().as_secs_f64(),
                    );
                    info!(
                        tenant = %scope.tenant,
                        client = %scope.client,
                        resource = %coordinator.resource,
                        version = meta.version,
                        items = meta.item_count,
                        "Background refresh complete"
                    );
                }
                Ok(RefreshOutcome::Skipped) => {
                    coordinator.metrics.record_refresh(
                        "background",
                        "skipped",
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    coordinator.metrics.record_refresh(
                        "background",
                        "error",
                        started.elapsed().as_secs_f64(),
                    );
                    warn!(
                        tenant = %scope.tenant,
                        client = %scope.client,
                        resource = %coordinator.resource,
                        error = %e,
                        "Background refresh failed, stale entry stays until the next cycle"
                    );
                }
            }
        })
    }

    /// Rebuild the entry and block until it is done.
    ///
    /// Runs the critical section even when the lock is already held: a forced
    /// refresh is an explicit user action where latency beats perfect
    /// de-duplication. If the store cannot serve the re-read afterwards, the
    /// freshly produced records are returned directly, so the operation keeps
    /// working without the cache layer.
    pub async fn refresh_sync<P, Fut>(
        &self,
        scope: &Scope,
        producer: P,
    ) -> Result<CachedEntry<T>, CacheError>
    where
        P: FnOnce(Scope) -> Fut + Send,
        Fut: Future<Output = Result<Vec<T>, CacheError>> + Send,
    {
        let started = Instant::now();
        match self
            .refresh_locked(scope, producer, RefreshMode::Forced)
            .await
        {
            Ok(RefreshOutcome::Completed { records, meta }) => {
                self.metrics
                    .record_refresh("sync", "success", started.elapsed().as_secs_f64());
                info!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    resource = %self.resource,
                    version = meta.version,
                    items = meta.item_count,
                    "Synchronous refresh complete"
                );
                match self.read_cached(scope).await {
                    Some(entry) => Ok(entry),
                    None => Ok(CachedEntry { records, meta }),
                }
            }
            // Forced mode never skips; kept for exhaustiveness.
            Ok(RefreshOutcome::Skipped) => match self.read_cached(scope).await {
                Some(entry) => Ok(entry),
                None => Err(CacheError::RefreshFailed(
                    "no cache entry after refresh attempt".to_string(),
                )),
            },
            Err(e) => {
                self.metrics
                    .record_refresh("sync", "error", started.elapsed().as_secs_f64());
                Err(CacheError::RefreshFailed(e.to_string()))
            }
        }
    }

    /// Delete payload and metadata. Idempotent; missing keys are fine.
    pub async fn invalidate(&self, scope: &Scope) -> Result<(), CacheError> {
        let keys = self.keys(scope);
        let (payload_res, meta_res) = future::join(
            self.store.del(&keys.payload),
            self.store.del(&keys.meta),
        )
        .await;
        payload_res?;
        meta_res?;

        self.metrics.record_invalidation();
        info!(
            tenant = %scope.tenant,
            client = %scope.client,
            resource = %self.resource,
            "Cache entry invalidated"
        );
        Ok(())
    }

    /// The critical section: lock gate, producer call, dual-key write.
    async fn refresh_locked<P, Fut>(
        &self,
        scope: &Scope,
        producer: P,
        mode: RefreshMode,
    ) -> Result<RefreshOutcome<T>, CacheError>
    where
        P: FnOnce(Scope) -> Fut + Send,
        Fut: Future<Output = Result<Vec<T>, CacheError>> + Send,
    {
        let keys = self.keys(scope);
        let token = lock_token();
        let lock_ttl = Duration::from_secs(self.config.lock_ttl_seconds);

        let acquired = match self
            .store
            .set_if_absent(&keys.lock, token.clone().into_bytes(), lock_ttl)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    error = %e,
                    "Lock acquisition failed"
                );
                false
            }
        };

        if !acquired {
            self.metrics.record_lock_contention();
            match mode {
                RefreshMode::Background => {
                    debug!(
                        tenant = %scope.tenant,
                        client = %scope.client,
                        resource = %self.resource,
                        "Refresh lock held elsewhere, skipping"
                    );
                    return Ok(RefreshOutcome::Skipped);
                }
                RefreshMode::Forced => {
                    debug!(
                        tenant = %scope.tenant,
                        client = %scope.client,
                        resource = %self.resource,
                        "Refresh lock held elsewhere, forced refresh proceeding"
                    );
                }
            }
        }

        let result = self.rebuild_entry(&keys, scope, producer).await;

        // Release on every exit path; the lock TTL covers a crash before
        // this point.
        if acquired {
            if let Err(e) = self.store.del(&keys.lock).await {
                warn!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    token = %token,
                    error = %e,
                    "Failed to release refresh lock, TTL will reclaim it"
                );
            }
        }

        result.map(|(records, meta)| RefreshOutcome::Completed { records, meta })
    }

    async fn rebuild_entry<P, Fut>(
        &self,
        keys: &KeySet,
        scope: &Scope,
        producer: P,
    ) -> Result<(Vec<T>, CacheMetadata), CacheError>
    where
        P: FnOnce(Scope) -> Fut + Send,
        Fut: Future<Output = Result<Vec<T>, CacheError>> + Send,
    {
        let ttl = Duration::from_secs(self.config.ttl_seconds);
        let prev_meta = self.read_meta(&keys.meta).await;

        // Advertise the in-flight refresh; the checksum stays the old one so
        // concurrent reads keep hitting the previous pair.
        if let Some(prev) = &prev_meta {
            let mut marked = prev.clone();
            marked.refresh_status = RefreshStatus::Refreshing;
            if let Ok(bytes) = serde_json::to_vec(&marked) {
                let _ = self.store.set(&keys.meta, bytes, ttl).await;
            }
        }

        let records = producer(scope.clone()).await?;
        let payload = codec::encode_records(&records)?;
        let meta = CacheMetadata {
            last_sync: Utc::now(),
            version: prev_meta.map(|m| m.version).unwrap_or(0) + 1,
            refresh_status: RefreshStatus::Idle,
            item_count: records.len(),
            ttl_seconds: self.config.ttl_seconds,
            checksum: codec::payload_checksum(&payload),
        };
        let meta_bytes = serde_json::to_vec(&meta)?;

        // Payload first; the metadata write commits the pair. Store write
        // failures degrade to a pass-through: the producer result is still
        // returned to the caller.
        match self.store.set(&keys.payload, payload, ttl).await {
            Ok(()) => {
                if let Err(e) = self.store.set(&keys.meta, meta_bytes, ttl).await {
                    warn!(
                        tenant = %scope.tenant,
                        client = %scope.client,
                        error = %e,
                        "Metadata write failed, entry reads as miss until the next refresh"
                    );
                }
            }
            Err(e) => {
                warn!(
                    tenant = %scope.tenant,
                    client = %scope.client,
                    error = %e,
                    "Payload write failed, serving producer result without caching"
                );
            }
        }

        Ok((records, meta))
    }

    async fn read_meta(&self, key: &str) -> Option<CacheMetadata> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    debug!(key = %key, error = %e, "Unreadable cache metadata");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(key = %key, error = %e, "Metadata read failed");
                None
            }
        }
    }
}

fn lock_token() -> String {
    let mut rng = rand::thread_rng();
    format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>())
}
