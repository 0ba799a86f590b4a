//! Memory-only store fallback.
//!
//! Used when opening the SQLite database fails (no writable path, corrupt
//! file that cannot be recreated). Nothing survives a restart; the engine
//! flags the session as degraded when it falls back to this store.

use super::assets::AssetRecord;
use super::content::{ContentKind, ContentRecord};
use super::logs::ErrorLogRecord;
use super::userdata::UserDataRecord;
use super::OfflineStore;
use crate::error::Error;
use crate::operation::QueueRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    content: HashMap<(ContentKind, String), ContentRecord>,
    assets: HashMap<String, AssetRecord>,
    queue: HashMap<String, QueueRecord>,
    user_data: HashMap<String, UserDataRecord>,
    logs: Vec<ErrorLogRecord>,
    next_seq: i64,
}

/// Volatile [`OfflineStore`] backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfflineStore for MemoryStore {
    async fn put_content(&self, record: &ContentRecord) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.content.insert((record.kind, record.id.clone()), record.clone());
        Ok(())
    }

    async fn get_content(&self, kind: ContentKind, id: &str) -> Result<Option<ContentRecord>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.content.get(&(kind, id.to_string())).cloned())
    }

    async fn touch_content(&self, kind: ContentKind, id: &str, now: &str) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        if let Some(rec) = inner.content.get_mut(&(kind, id.to_string())) {
            rec.last_accessed = now.to_string();
            rec.access_count += 1;
        }
        Ok(())
    }

    async fn content_by_kind(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, Error> {
        let inner = self.inner.read().await;
        let mut records: Vec<ContentRecord> =
            inner.content.values().filter(|r| r.kind == kind).cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.content.remove(&(kind, id.to_string()));
        Ok(())
    }

    async fn purge_expired_content(&self, now: &str) -> Result<u64, Error> {
        let mut inner = self.inner.write().await;
        let before = inner.content.len();
        inner.content.retain(|_, rec| !rec.is_expired(now));
        Ok((before - inner.content.len()) as u64)
    }

    async fn clear_content(&self) -> Result<(), Error> {
        self.inner.write().await.content.clear();
        Ok(())
    }

    async fn count_content(&self) -> Result<u64, Error> {
        Ok(self.inner.read().await.content.len() as u64)
    }

    async fn put_asset(&self, record: &AssetRecord) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.assets.insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn get_asset(&self, url: &str) -> Result<Option<AssetRecord>, Error> {
        Ok(self.inner.read().await.assets.get(url).cloned())
    }

    async fn has_asset(&self, url: &str) -> Result<bool, Error> {
        Ok(self.inner.read().await.assets.contains_key(url))
    }

    async fn touch_asset(&self, url: &str, now: &str) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        if let Some(rec) = inner.assets.get_mut(url) {
            rec.last_accessed = now.to_string();
        }
        Ok(())
    }

    async fn delete_asset(&self, url: &str) -> Result<(), Error> {
        self.inner.write().await.assets.remove(url);
        Ok(())
    }

    async fn total_asset_bytes(&self) -> Result<u64, Error> {
        let inner = self.inner.read().await;
        Ok(inner.assets.values().map(|r| r.size.max(0) as u64).sum())
    }

    async fn evict_assets_over(&self, max_bytes: u64) -> Result<u64, Error> {
        let mut inner = self.inner.write().await;
        let mut total: u64 = inner.assets.values().map(|r| r.size.max(0) as u64).sum();
        let mut evicted = 0u64;
        while total > max_bytes {
            // RFC 3339 strings order lexicographically, so min() is the LRU entry.
            let victim = inner
                .assets
                .values()
                .min_by(|a, b| a.last_accessed.cmp(&b.last_accessed))
                .map(|r| (r.url.clone(), r.size.max(0) as u64));
            let Some((url, size)) = victim else { break };
            inner.assets.remove(&url);
            total -= size.min(total);
            evicted += 1;
        }
        Ok(evicted)
    }

    async fn clear_assets(&self) -> Result<(), Error> {
        self.inner.write().await.assets.clear();
        Ok(())
    }

    async fn count_assets(&self) -> Result<u64, Error> {
        Ok(self.inner.read().await.assets.len() as u64)
    }

    async fn enqueue(&self, record: &QueueRecord) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.queue.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn pending_operations(&self) -> Result<Vec<QueueRecord>, Error> {
        let inner = self.inner.read().await;
        let mut records: Vec<QueueRecord> = inner.queue.values().cloned().collect();
        records.sort_by(|a, b| {
            a.priority.rank().cmp(&b.priority.rank()).then(a.queued_at.cmp(&b.queued_at))
        });
        Ok(records)
    }

    async fn remove_operation(&self, id: &str) -> Result<(), Error> {
        self.inner.write().await.queue.remove(id);
        Ok(())
    }

    async fn bump_retry(&self, id: &str) -> Result<u32, Error> {
        let mut inner = self.inner.write().await;
        match inner.queue.get_mut(id) {
            Some(rec) => {
                rec.retry_count += 1;
                Ok(rec.retry_count)
            }
            None => Err(Error::Corrupted(format!("no queued operation with id {id}"))),
        }
    }

    async fn queue_len(&self) -> Result<u64, Error> {
        Ok(self.inner.read().await.queue.len() as u64)
    }

    async fn clear_queue(&self) -> Result<(), Error> {
        self.inner.write().await.queue.clear();
        Ok(())
    }

    async fn put_user_data(&self, key: &str, value: &serde_json::Value, needs_sync: bool) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.user_data.insert(
            key.to_string(),
            UserDataRecord {
                key: key.to_string(),
                value: value.clone(),
                updated_at: chrono::Utc::now().to_rfc3339(),
                needs_sync,
            },
        );
        Ok(())
    }

    async fn get_user_data(&self, key: &str) -> Result<Option<UserDataRecord>, Error> {
        Ok(self.inner.read().await.user_data.get(key).cloned())
    }

    async fn user_data_needing_sync(&self) -> Result<Vec<UserDataRecord>, Error> {
        let inner = self.inner.read().await;
        let mut records: Vec<UserDataRecord> =
            inner.user_data.values().filter(|r| r.needs_sync).cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn clear_user_data_except(&self, keep: &[String]) -> Result<u64, Error> {
        let mut inner = self.inner.write().await;
        let before = inner.user_data.len();
        inner.user_data.retain(|key, _| keep.contains(key));
        Ok((before - inner.user_data.len()) as u64)
    }

    async fn append_log(&self, record: &ErrorLogRecord) -> Result<ErrorLogRecord, Error> {
        let mut inner = self.inner.write().await;
        inner.next_seq += 1;
        let mut record = record.clone();
        record.seq = Some(inner.next_seq);
        inner.logs.push(record.clone());
        Ok(record)
    }

    async fn recent_logs(&self, limit: u32) -> Result<Vec<ErrorLogRecord>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.logs.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn trim_logs(&self, max_entries: u64) -> Result<u64, Error> {
        let mut inner = self.inner.write().await;
        let len = inner.logs.len() as u64;
        if len <= max_entries {
            return Ok(0);
        }
        let excess = (len - max_entries) as usize;
        inner.logs.drain(..excess);
        Ok(excess as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{BookmarkAction, BookmarkChange, ConflictStrategy, Priority, SyncOperation};
    use chrono::{Duration, Utc};

    fn content(kind: ContentKind, id: &str) -> ContentRecord {
        let now = Utc::now().to_rfc3339();
        ContentRecord {
            kind,
            id: id.to_string(),
            payload: serde_json::json!({"title": id}),
            cached_at: now.clone(),
            expires_at: None,
            last_accessed: now,
            access_count: 0,
            size: 64,
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_content_roundtrip() {
        let store = MemoryStore::new();
        store.put_content(&content(ContentKind::Encyclopedia, "heart")).await.unwrap();

        let got = store.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(got.id, "heart");
        assert!(store.get_content(ContentKind::Quiz, "heart").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queue_order_matches_durable_store() {
        let store = MemoryStore::new();
        let mut low = QueueRecord::new(
            SyncOperation::Bookmark(BookmarkChange { action: BookmarkAction::Add, content_id: "a".into() }),
            Priority::Low,
            ConflictStrategy::ClientWins,
            3,
        );
        low.queued_at = Utc::now() - Duration::seconds(30);
        let high = QueueRecord::new(
            SyncOperation::Bookmark(BookmarkChange { action: BookmarkAction::Add, content_id: "b".into() }),
            Priority::High,
            ConflictStrategy::ClientWins,
            3,
        );
        store.enqueue(&low).await.unwrap();
        store.enqueue(&high).await.unwrap();

        let pending = store.pending_operations().await.unwrap();
        assert_eq!(pending[0].id, high.id);
        assert_eq!(pending[1].id, low.id);
    }

    #[tokio::test]
    async fn test_evict_lru() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (url, offset) in [("old", -300i64), ("new", 0)] {
            store
                .put_asset(&AssetRecord {
                    url: url.to_string(),
                    kind: crate::store::AssetKind::Image,
                    bytes: vec![0; 100],
                    content_type: None,
                    size: 100,
                    cached_at: now.to_rfc3339(),
                    last_accessed: (now + Duration::seconds(offset)).to_rfc3339(),
                    etag: None,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.evict_assets_over(100).await.unwrap(), 1);
        assert!(!store.has_asset("old").await.unwrap());
        assert!(store.has_asset("new").await.unwrap());
    }

    #[tokio::test]
    async fn test_log_trim() {
        let store = MemoryStore::new();
        for i in 0..4 {
            store
                .append_log(&ErrorLogRecord {
                    seq: None,
                    code: "timeout".into(),
                    category: "network".into(),
                    severity: "error".into(),
                    technical_message: format!("msg-{i}"),
                    user_message: String::new(),
                    context: String::new(),
                    session_id: "s".into(),
                    logged_at: Utc::now().to_rfc3339(),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.trim_logs(2).await.unwrap(), 2);
        let logs = store.recent_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].technical_message, "msg-3");
    }
}
