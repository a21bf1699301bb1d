//! Conversation-list records for the messaging integration.
//!
//! The chat list is the canonical expensive entry behind the cache: the
//! messaging gateway is rate-limited, and a rebuild typically also joins
//! contact names onto the raw conversations. That enrichment is composed
//! inside the producer by the caller; the coordinator only sees the final
//! record list.

use crate::cache::RefreshCoordinator;
use crate::config::CacheConfig;
use crate::metrics::SharedMetrics;
use crate::store::KvStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CHAT_RESOURCE: &str = "chats";

/// One conversation in a tenant's chat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: String,
    pub title: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    /// Filled in by contact enrichment when available.
    pub contact_name: Option<String>,
}

/// Coordinator for the per-(tenant, client) chat list.
pub fn chat_list_coordinator(
    store: Arc<dyn KvStore>,
    config: CacheConfig,
    metrics: SharedMetrics,
) -> RefreshCoordinator<ChatSummary> {
    RefreshCoordinator::new(store, config, CHAT_RESOURCE, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Scope;
    use crate::error::CacheError;
    use crate::metrics::create_metrics;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    fn chat(id: &str, title: &str) -> ChatSummary {
        ChatSummary {
            chat_id: id.to_string(),
            title: Some(title.to_string()),
            last_message: Some("hello".to_string()),
            last_message_at: Some(Utc::now()),
            unread_count: 0,
            contact_name: None,
        }
    }

    fn chats(n: usize) -> Vec<ChatSummary> {
        (0..n)
            .map(|i| chat(&format!("chat-{}", i), &format!("Chat {}", i)))
            .collect()
    }

    #[tokio::test]
    async fn cold_start_then_stale_while_revalidate() {
        let store = Arc::new(MemoryStore::new());
        let coord = chat_list_coordinator(
            store.clone() as Arc<dyn KvStore>,
            CacheConfig::default(),
            create_metrics(),
        );
        let scope = Scope::new("t1", "c1");

        // (a) Cold start.
        assert!(coord.read_cached(&scope).await.is_none());
        assert!(coord.is_stale(&scope).await);

        let entry = coord
            .refresh_sync(&scope, |_s| async { Ok(chats(3)) })
            .await
            .unwrap();
        assert_eq!(entry.meta.version, 1);
        assert_eq!(entry.meta.item_count, 3);

        // (b) Shortly after: fresh hit.
        let entry = coord.read_cached(&scope).await.unwrap();
        assert_eq!(entry.records.len(), 3);
        assert!(!coord.is_stale(&scope).await);

        // (c) Past 0.8 x TTL: stale, but reads still serve the old list.
        let meta_key = crate::cache::key_set("muninn", CHAT_RESOURCE, &scope).meta;
        let bytes = store.get(&meta_key).await.unwrap().unwrap();
        let mut meta: crate::cache::CacheMetadata = serde_json::from_slice(&bytes).unwrap();
        meta.last_sync = meta.last_sync - chrono::Duration::seconds(260);
        store
            .set(
                &meta_key,
                serde_json::to_vec(&meta).unwrap(),
                std::time::Duration::from_secs(300),
            )
            .await
            .unwrap();

        assert!(coord.is_stale(&scope).await);
        assert_eq!(coord.read_cached(&scope).await.unwrap().meta.version, 1);

        // (d)+(e) Background refresh lands a bigger list; reads before it
        // lands still observe version 1.
        let handle = coord.refresh_in_background(&scope, |_s| async { Ok(chats(5)) });
        assert_eq!(coord.read_cached(&scope).await.unwrap().meta.version, 1);

        handle.await.unwrap();
        let entry = coord.read_cached(&scope).await.unwrap();
        assert_eq!(entry.meta.version, 2);
        assert_eq!(entry.meta.item_count, 5);
    }

    #[tokio::test]
    async fn producer_composes_contact_enrichment() {
        let store = Arc::new(MemoryStore::new());
        let coord = chat_list_coordinator(store, CacheConfig::default(), create_metrics());
        let scope = Scope::new("t1", "c1");

        // A producer that fetches the raw list and then joins contact names,
        // the way a route handler composes the gateway and contact services.
        let producer = |_s: Scope| async {
            let raw = vec![chat("chat-0", "+15550100"), chat("chat-1", "+15550101")];

            let contacts: HashMap<&str, &str> =
                [("chat-0", "Ada"), ("chat-1", "Grace")].into_iter().collect();
            let enriched = raw
                .into_iter()
                .map(|mut c| {
                    c.contact_name = contacts.get(c.chat_id.as_str()).map(|n| n.to_string());
                    c
                })
                .collect::<Vec<_>>();
            Ok::<_, CacheError>(enriched)
        };

        let entry = coord.refresh_sync(&scope, producer).await.unwrap();
        assert_eq!(entry.records[0].contact_name.as_deref(), Some("Ada"));
        assert_eq!(entry.records[1].contact_name.as_deref(), Some("Grace"));
    }

    #[test]
    fn chat_summary_survives_the_payload_codec() {
        let records = vec![chat("chat-0", "Ada"), chat("chat-1", "Grace")];
        let bytes = crate::cache::codec::encode_records(&records).unwrap();
        let decoded: Vec<ChatSummary> = crate::cache::codec::decode_records(&bytes).unwrap();
        assert_eq!(decoded, records);
    }
}
