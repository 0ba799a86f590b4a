//! Binary asset collection.
//!
//! One row per cached binary resource (3D model, image, audio), keyed by
//! url. Total size is bounded by a configured byte ceiling; once exceeded,
//! least-recently-accessed entries are evicted first.

use super::connection::StoreDb;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Closed set of binary asset kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    AnatomyModel,
    Image,
    Audio,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::AnatomyModel => "anatomy-model",
            AssetKind::Image => "image",
            AssetKind::Audio => "audio",
            AssetKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "anatomy-model" => Some(AssetKind::AnatomyModel),
            "image" => Some(AssetKind::Image),
            "audio" => Some(AssetKind::Audio),
            "video" => Some(AssetKind::Video),
            _ => None,
        }
    }
}

/// A cached binary asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub url: String,
    pub kind: AssetKind,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub size: i64,
    pub cached_at: String,
    pub last_accessed: String,
    pub etag: Option<String>,
}

/// Column values as stored, before kind decoding.
struct RawAssetRow {
    url: String,
    kind: String,
    bytes: Vec<u8>,
    content_type: Option<String>,
    size: i64,
    cached_at: String,
    last_accessed: String,
    etag: Option<String>,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAssetRow> {
    Ok(RawAssetRow {
        url: row.get(0)?,
        kind: row.get(1)?,
        bytes: row.get(2)?,
        content_type: row.get(3)?,
        size: row.get(4)?,
        cached_at: row.get(5)?,
        last_accessed: row.get(6)?,
        etag: row.get(7)?,
    })
}

fn finish_asset(raw: RawAssetRow) -> Result<AssetRecord, Error> {
    let kind = AssetKind::parse(&raw.kind)
        .ok_or_else(|| Error::Corrupted(format!("unknown asset kind in store: {}", raw.kind)))?;
    Ok(AssetRecord {
        url: raw.url,
        kind,
        bytes: raw.bytes,
        content_type: raw.content_type,
        size: raw.size,
        cached_at: raw.cached_at,
        last_accessed: raw.last_accessed,
        etag: raw.etag,
    })
}

impl StoreDb {
    /// Insert or overwrite an asset (upsert by url).
    pub async fn put_asset(&self, record: &AssetRecord) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO assets (url, kind, bytes, content_type, size, cached_at, last_accessed, etag)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(url) DO UPDATE SET
                        kind = excluded.kind,
                        bytes = excluded.bytes,
                        content_type = excluded.content_type,
                        size = excluded.size,
                        cached_at = excluded.cached_at,
                        last_accessed = excluded.last_accessed,
                        etag = excluded.etag",
                    params![
                        &record.url,
                        record.kind.as_str(),
                        &record.bytes,
                        &record.content_type,
                        record.size,
                        &record.cached_at,
                        &record.last_accessed,
                        &record.etag,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an asset by url. Returns None on miss.
    pub async fn get_asset(&self, url: &str) -> Result<Option<AssetRecord>, Error> {
        let url = url.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawAssetRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, kind, bytes, content_type, size, cached_at, last_accessed, etag
                     FROM assets WHERE url = ?1",
                )?;
                match stmt.query_row(params![url], row_to_raw) {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;
        raw.map(finish_asset).transpose()
    }

    /// Whether an asset is cached, without loading its bytes.
    pub async fn has_asset(&self, url: &str) -> Result<bool, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row("SELECT EXISTS(SELECT 1 FROM assets WHERE url = ?1)", params![url], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Bump asset recency on a read.
    pub async fn touch_asset(&self, url: &str, now: &str) -> Result<(), Error> {
        let url = url.to_string();
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("UPDATE assets SET last_accessed = ?2 WHERE url = ?1", params![url, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn delete_asset(&self, url: &str) -> Result<(), Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM assets WHERE url = ?1", params![url])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn total_asset_bytes(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let total: i64 = conn.query_row("SELECT COALESCE(SUM(size), 0) FROM assets", [], |row| row.get(0))?;
                Ok(total as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Evict least-recently-accessed assets until the total size is within
    /// `max_bytes`. Returns the number of evicted entries.
    pub async fn evict_assets_over(&self, max_bytes: u64) -> Result<u64, Error> {
        let max = max_bytes as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let mut total: i64 = conn.query_row("SELECT COALESCE(SUM(size), 0) FROM assets", [], |row| row.get(0))?;
                let mut evicted = 0u64;
                while total > max {
                    let victim: Option<(String, i64)> = match conn.query_row(
                        "SELECT url, size FROM assets ORDER BY last_accessed ASC LIMIT 1",
                        [],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    ) {
                        Ok(v) => Some(v),
                        Err(rusqlite::Error::QueryReturnedNoRows) => None,
                        Err(e) => return Err(e.into()),
                    };
                    let Some((url, size)) = victim else { break };
                    conn.execute("DELETE FROM assets WHERE url = ?1", params![url])?;
                    total -= size;
                    evicted += 1;
                }
                Ok(evicted)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn clear_assets(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM assets", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_assets(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn make_asset(url: &str, size: usize, accessed_offset_secs: i64) -> AssetRecord {
        let now = Utc::now();
        AssetRecord {
            url: url.to_string(),
            kind: AssetKind::AnatomyModel,
            bytes: vec![0u8; size],
            content_type: Some("model/gltf-binary".to_string()),
            size: size as i64,
            cached_at: now.to_rfc3339(),
            last_accessed: (now + Duration::seconds(accessed_offset_secs)).to_rfc3339(),
            etag: None,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let asset = make_asset("https://cdn.example.com/heart.glb", 128, 0);
        db.put_asset(&asset).await.unwrap();

        let got = db.get_asset(&asset.url).await.unwrap().unwrap();
        assert_eq!(got.bytes.len(), 128);
        assert_eq!(got.kind, AssetKind::AnatomyModel);
    }

    #[tokio::test]
    async fn test_has_asset() {
        let db = StoreDb::open_in_memory().await.unwrap();
        assert!(!db.has_asset("https://cdn.example.com/x.glb").await.unwrap());
        db.put_asset(&make_asset("https://cdn.example.com/x.glb", 8, 0)).await.unwrap();
        assert!(db.has_asset("https://cdn.example.com/x.glb").await.unwrap());
    }

    #[tokio::test]
    async fn test_total_bytes() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.put_asset(&make_asset("a", 100, 0)).await.unwrap();
        db.put_asset(&make_asset("b", 50, 0)).await.unwrap();
        assert_eq!(db.total_asset_bytes().await.unwrap(), 150);
    }

    #[tokio::test]
    async fn test_evict_lru_under_ceiling_is_noop() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.put_asset(&make_asset("a", 100, 0)).await.unwrap();
        assert_eq!(db.evict_assets_over(1000).await.unwrap(), 0);
        assert!(db.has_asset("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_evict_lru_removes_oldest_first() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.put_asset(&make_asset("old", 100, -300)).await.unwrap();
        db.put_asset(&make_asset("mid", 100, -60)).await.unwrap();
        db.put_asset(&make_asset("new", 100, 0)).await.unwrap();

        let evicted = db.evict_assets_over(250).await.unwrap();
        assert_eq!(evicted, 1);
        assert!(!db.has_asset("old").await.unwrap());
        assert!(db.has_asset("mid").await.unwrap());
        assert!(db.has_asset("new").await.unwrap());
    }

    #[tokio::test]
    async fn test_touch_changes_eviction_order() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.put_asset(&make_asset("a", 100, -300)).await.unwrap();
        db.put_asset(&make_asset("b", 100, -60)).await.unwrap();

        let bumped = (Utc::now() + Duration::seconds(10)).to_rfc3339();
        db.touch_asset("a", &bumped).await.unwrap();

        db.evict_assets_over(100).await.unwrap();
        assert!(db.has_asset("a").await.unwrap());
        assert!(!db.has_asset("b").await.unwrap());
    }
}
