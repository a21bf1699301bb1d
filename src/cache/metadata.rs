//! Sync metadata stored next to each cache payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a refresh is currently rebuilding the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Idle,
    Refreshing,
}

/// Metadata for one cache entry, stored as JSON under the meta key.
///
/// `version` increases by one on every persisted refresh from a single
/// writer's perspective. `checksum` is the SHA-256 of the payload bytes the
/// metadata was written against; a mismatch on read means the payload and
/// metadata come from different refreshes (or the payload is corrupt) and the
/// pair is treated as a miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub last_sync: DateTime<Utc>,
    pub version: u64,
    pub refresh_status: RefreshStatus,
    pub item_count: usize,
    pub ttl_seconds: u64,
    pub checksum: String,
}

impl CacheMetadata {
    /// Stale when the entry's age exceeds `ttl_seconds * ratio`.
    pub fn is_stale(&self, now: DateTime<Utc>, ratio: f64) -> bool {
        let age_ms = now.signed_duration_since(self.last_sync).num_milliseconds();
        let threshold_ms = (self.ttl_seconds as f64 * ratio * 1000.0) as i64;
        age_ms > threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn meta_aged(age_secs: i64, ttl_seconds: u64) -> (CacheMetadata, DateTime<Utc>) {
        let now = Utc::now();
        let meta = CacheMetadata {
            last_sync: now - Duration::seconds(age_secs),
            version: 1,
            refresh_status: RefreshStatus::Idle,
            item_count: 0,
            ttl_seconds,
            checksum: String::new(),
        };
        (meta, now)
    }

    #[test]
    fn stale_just_past_the_threshold() {
        // ttl=300, ratio=0.8 -> threshold at 240s; 243s old is stale.
        let (meta, now) = meta_aged(243, 300);
        assert!(meta.is_stale(now, 0.8));
    }

    #[test]
    fn fresh_just_before_the_threshold() {
        let (meta, now) = meta_aged(237, 300);
        assert!(!meta.is_stale(now, 0.8));
    }

    #[test]
    fn exactly_at_the_threshold_is_not_stale() {
        let (meta, now) = meta_aged(240, 300);
        assert!(!meta.is_stale(now, 0.8));
    }

    #[test]
    fn metadata_round_trips_as_json() {
        let (meta, _) = meta_aged(0, 300);
        let bytes = serde_json::to_vec(&meta).unwrap();
        let parsed: CacheMetadata = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn refresh_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RefreshStatus::Refreshing).unwrap(),
            "\"refreshing\""
        );
        assert_eq!(
            serde_json::to_string(&RefreshStatus::Idle).unwrap(),
            "\"idle\""
        );
    }
}
