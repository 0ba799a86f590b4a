//! Structured content collection.
//!
//! One row per fetched or derivable piece of structured content, keyed by
//! (kind, id). Freshness is decided by comparing `expires_at` against the
//! wall clock; reads bump `last_accessed` and `access_count` through
//! [`StoreDb::touch_content`].

use super::connection::StoreDb;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Closed set of structured content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Encyclopedia,
    Symptom,
    Medication,
    Region,
    Quiz,
    Glossary,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Encyclopedia => "encyclopedia",
            ContentKind::Symptom => "symptom",
            ContentKind::Medication => "medication",
            ContentKind::Region => "region",
            ContentKind::Quiz => "quiz",
            ContentKind::Glossary => "glossary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "encyclopedia" => Some(ContentKind::Encyclopedia),
            "symptom" => Some(ContentKind::Symptom),
            "medication" => Some(ContentKind::Medication),
            "region" => Some(ContentKind::Region),
            "quiz" => Some(ContentKind::Quiz),
            "glossary" => Some(ContentKind::Glossary),
            _ => None,
        }
    }

    pub const ALL: [ContentKind; 6] = [
        ContentKind::Encyclopedia,
        ContentKind::Symptom,
        ContentKind::Medication,
        ContentKind::Region,
        ContentKind::Quiz,
        ContentKind::Glossary,
    ];
}

/// A cached content entry.
///
/// Timestamps are RFC 3339 strings so freshness comparisons can happen
/// directly in SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub kind: ContentKind,
    pub id: String,
    pub payload: serde_json::Value,
    pub cached_at: String,
    pub expires_at: Option<String>,
    pub last_accessed: String,
    pub access_count: i64,
    pub size: i64,
    pub version: i64,
}

impl ContentRecord {
    /// Whether this entry has expired as of `now` (RFC 3339).
    /// A null `expires_at` never expires.
    pub fn is_expired(&self, now: &str) -> bool {
        match &self.expires_at {
            Some(expires) => expires.as_str() <= now,
            None => false,
        }
    }
}

/// Column values as stored, before kind/payload decoding.
struct RawContentRow {
    kind: String,
    id: String,
    payload: String,
    cached_at: String,
    expires_at: Option<String>,
    last_accessed: String,
    access_count: i64,
    size: i64,
    version: i64,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawContentRow> {
    Ok(RawContentRow {
        kind: row.get(0)?,
        id: row.get(1)?,
        payload: row.get(2)?,
        cached_at: row.get(3)?,
        expires_at: row.get(4)?,
        last_accessed: row.get(5)?,
        access_count: row.get(6)?,
        size: row.get(7)?,
        version: row.get(8)?,
    })
}

fn finish_record(raw: RawContentRow) -> Result<ContentRecord, Error> {
    let kind = ContentKind::parse(&raw.kind)
        .ok_or_else(|| Error::Corrupted(format!("unknown content kind in store: {}", raw.kind)))?;
    Ok(ContentRecord {
        kind,
        id: raw.id,
        payload: serde_json::from_str(&raw.payload)?,
        cached_at: raw.cached_at,
        expires_at: raw.expires_at,
        last_accessed: raw.last_accessed,
        access_count: raw.access_count,
        size: raw.size,
        version: raw.version,
    })
}

const SELECT_COLUMNS: &str = "kind, id, payload, cached_at, expires_at, last_accessed, access_count, size, version";

impl StoreDb {
    /// Insert or overwrite a content entry (upsert by (kind, id)).
    pub async fn put_content(&self, record: &ContentRecord) -> Result<(), Error> {
        let record = record.clone();
        let payload = serde_json::to_string(&record.payload)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO content (
                        kind, id, payload, cached_at, expires_at,
                        last_accessed, access_count, size, version
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(kind, id) DO UPDATE SET
                        payload = excluded.payload,
                        cached_at = excluded.cached_at,
                        expires_at = excluded.expires_at,
                        last_accessed = excluded.last_accessed,
                        access_count = excluded.access_count,
                        size = excluded.size,
                        version = excluded.version",
                    params![
                        record.kind.as_str(),
                        &record.id,
                        payload,
                        &record.cached_at,
                        &record.expires_at,
                        &record.last_accessed,
                        record.access_count,
                        record.size,
                        record.version,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a content entry by (kind, id). Returns None on miss.
    pub async fn get_content(&self, kind: ContentKind, id: &str) -> Result<Option<ContentRecord>, Error> {
        let id = id.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawContentRow>, Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM content WHERE kind = ?1 AND id = ?2"))?;
                match stmt.query_row(params![kind.as_str(), id], row_to_raw) {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;
        raw.map(finish_record).transpose()
    }

    /// Bump access bookkeeping on a read.
    pub async fn touch_content(&self, kind: ContentKind, id: &str, now: &str) -> Result<(), Error> {
        let id = id.to_string();
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE content SET last_accessed = ?3, access_count = access_count + 1
                     WHERE kind = ?1 AND id = ?2",
                    params![kind.as_str(), id, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All entries of one kind.
    pub async fn content_by_kind(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, Error> {
        let raws = self
            .conn
            .call(move |conn| -> Result<Vec<RawContentRow>, Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM content WHERE kind = ?1 ORDER BY id"))?;
                let rows = stmt.query_map(params![kind.as_str()], row_to_raw)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
            .map_err(Error::from)?;
        raws.into_iter().map(finish_record).collect()
    }

    pub async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM content WHERE kind = ?1 AND id = ?2", params![kind.as_str(), id])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all entries whose expiry has passed. Returns the count deleted.
    pub async fn purge_expired_content(&self, now: &str) -> Result<u64, Error> {
        let now = now.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM content WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn clear_content(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM content", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_content(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
