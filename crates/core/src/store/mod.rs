//! Versioned, schema-defined local store with named collections.
//!
//! SQLite-backed via tokio-rusqlite with async access, WAL mode, and
//! automatic schema migrations. Collections: content (keyed by kind+id),
//! assets (keyed by url), sync_queue (keyed by generated id), user_data
//! (keyed by arbitrary key), and error_log (append-only).
//!
//! [`OfflineStore`] is the seam the rest of the engine depends on:
//! [`StoreDb`] is the durable implementation, [`MemoryStore`] the
//! memory-only fallback used when the host offers no usable persistence.

pub mod assets;
pub mod connection;
pub mod content;
pub mod logs;
pub mod memory;
pub mod migrations;
pub mod queue;
pub mod userdata;

use crate::error::Error;
use crate::operation::QueueRecord;
use async_trait::async_trait;

pub use assets::{AssetKind, AssetRecord};
pub use connection::StoreDb;
pub use content::{ContentKind, ContentRecord};
pub use logs::ErrorLogRecord;
pub use memory::MemoryStore;
pub use userdata::UserDataRecord;

/// Storage operations the engine's components are written against.
///
/// All timestamps are RFC 3339 strings; comparisons are lexicographic,
/// which is order-preserving for a fixed offset format.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    // content
    async fn put_content(&self, record: &ContentRecord) -> Result<(), Error>;
    async fn get_content(&self, kind: ContentKind, id: &str) -> Result<Option<ContentRecord>, Error>;
    async fn touch_content(&self, kind: ContentKind, id: &str, now: &str) -> Result<(), Error>;
    async fn content_by_kind(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, Error>;
    async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), Error>;
    async fn purge_expired_content(&self, now: &str) -> Result<u64, Error>;
    async fn clear_content(&self) -> Result<(), Error>;
    async fn count_content(&self) -> Result<u64, Error>;

    // assets
    async fn put_asset(&self, record: &AssetRecord) -> Result<(), Error>;
    async fn get_asset(&self, url: &str) -> Result<Option<AssetRecord>, Error>;
    async fn has_asset(&self, url: &str) -> Result<bool, Error>;
    async fn touch_asset(&self, url: &str, now: &str) -> Result<(), Error>;
    async fn delete_asset(&self, url: &str) -> Result<(), Error>;
    async fn total_asset_bytes(&self) -> Result<u64, Error>;
    async fn evict_assets_over(&self, max_bytes: u64) -> Result<u64, Error>;
    async fn clear_assets(&self) -> Result<(), Error>;
    async fn count_assets(&self) -> Result<u64, Error>;

    // sync queue
    async fn enqueue(&self, record: &QueueRecord) -> Result<(), Error>;
    async fn pending_operations(&self) -> Result<Vec<QueueRecord>, Error>;
    async fn remove_operation(&self, id: &str) -> Result<(), Error>;
    async fn bump_retry(&self, id: &str) -> Result<u32, Error>;
    async fn queue_len(&self) -> Result<u64, Error>;
    async fn clear_queue(&self) -> Result<(), Error>;

    // user data
    async fn put_user_data(&self, key: &str, value: &serde_json::Value, needs_sync: bool) -> Result<(), Error>;
    async fn get_user_data(&self, key: &str) -> Result<Option<UserDataRecord>, Error>;
    async fn user_data_needing_sync(&self) -> Result<Vec<UserDataRecord>, Error>;
    async fn clear_user_data_except(&self, keep: &[String]) -> Result<u64, Error>;

    // error log
    async fn append_log(&self, record: &ErrorLogRecord) -> Result<ErrorLogRecord, Error>;
    async fn recent_logs(&self, limit: u32) -> Result<Vec<ErrorLogRecord>, Error>;
    async fn trim_logs(&self, max_entries: u64) -> Result<u64, Error>;
}

#[async_trait]
impl OfflineStore for StoreDb {
    async fn put_content(&self, record: &ContentRecord) -> Result<(), Error> {
        StoreDb::put_content(self, record).await
    }
    async fn get_content(&self, kind: ContentKind, id: &str) -> Result<Option<ContentRecord>, Error> {
        StoreDb::get_content(self, kind, id).await
    }
    async fn touch_content(&self, kind: ContentKind, id: &str, now: &str) -> Result<(), Error> {
        StoreDb::touch_content(self, kind, id, now).await
    }
    async fn content_by_kind(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, Error> {
        StoreDb::content_by_kind(self, kind).await
    }
    async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), Error> {
        StoreDb::delete_content(self, kind, id).await
    }
    async fn purge_expired_content(&self, now: &str) -> Result<u64, Error> {
        StoreDb::purge_expired_content(self, now).await
    }
    async fn clear_content(&self) -> Result<(), Error> {
        StoreDb::clear_content(self).await
    }
    async fn count_content(&self) -> Result<u64, Error> {
        StoreDb::count_content(self).await
    }

    async fn put_asset(&self, record: &AssetRecord) -> Result<(), Error> {
        StoreDb::put_asset(self, record).await
    }
    async fn get_asset(&self, url: &str) -> Result<Option<AssetRecord>, Error> {
        StoreDb::get_asset(self, url).await
    }
    async fn has_asset(&self, url: &str) -> Result<bool, Error> {
        StoreDb::has_asset(self, url).await
    }
    async fn touch_asset(&self, url: &str, now: &str) -> Result<(), Error> {
        StoreDb::touch_asset(self, url, now).await
    }
    async fn delete_asset(&self, url: &str) -> Result<(), Error> {
        StoreDb::delete_asset(self, url).await
    }
    async fn total_asset_bytes(&self) -> Result<u64, Error> {
        StoreDb::total_asset_bytes(self).await
    }
    async fn evict_assets_over(&self, max_bytes: u64) -> Result<u64, Error> {
        StoreDb::evict_assets_over(self, max_bytes).await
    }
    async fn clear_assets(&self) -> Result<(), Error> {
        StoreDb::clear_assets(self).await
    }
    async fn count_assets(&self) -> Result<u64, Error> {
        StoreDb::count_assets(self).await
    }

    async fn enqueue(&self, record: &QueueRecord) -> Result<(), Error> {
        StoreDb::enqueue(self, record).await
    }
    async fn pending_operations(&self) -> Result<Vec<QueueRecord>, Error> {
        StoreDb::pending_operations(self).await
    }
    async fn remove_operation(&self, id: &str) -> Result<(), Error> {
        StoreDb::remove_operation(self, id).await
    }
    async fn bump_retry(&self, id: &str) -> Result<u32, Error> {
        StoreDb::bump_retry(self, id).await
    }
    async fn queue_len(&self) -> Result<u64, Error> {
        StoreDb::queue_len(self).await
    }
    async fn clear_queue(&self) -> Result<(), Error> {
        StoreDb::clear_queue(self).await
    }

    async fn put_user_data(&self, key: &str, value: &serde_json::Value, needs_sync: bool) -> Result<(), Error> {
        StoreDb::put_user_data(self, key, value, needs_sync).await
    }
    async fn get_user_data(&self, key: &str) -> Result<Option<UserDataRecord>, Error> {
        StoreDb::get_user_data(self, key).await
    }
    async fn user_data_needing_sync(&self) -> Result<Vec<UserDataRecord>, Error> {
        StoreDb::user_data_needing_sync(self).await
    }
    async fn clear_user_data_except(&self, keep: &[String]) -> Result<u64, Error> {
        StoreDb::clear_user_data_except(self, keep).await
    }

    async fn append_log(&self, record: &ErrorLogRecord) -> Result<ErrorLogRecord, Error> {
        StoreDb::append_log(self, record).await
    }
    async fn recent_logs(&self, limit: u32) -> Result<Vec<ErrorLogRecord>, Error> {
        StoreDb::recent_logs(self, limit).await
    }
    async fn trim_logs(&self, max_entries: u64) -> Result<u64, Error> {
        StoreDb::trim_logs(self, max_entries).await
    }
}
