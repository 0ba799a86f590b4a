//! Durable sync queue collection.
//!
//! Pending mutations waiting for remote application. Replay order is
//! priority first, then enqueue time, which the (priority, queued_at)
//! index serves directly. An item leaves the queue exactly when it either
//! succeeds or exhausts its retries.

use super::connection::StoreDb;
use crate::error::Error;
use crate::operation::{ConflictStrategy, Priority, QueueRecord, SyncOperation};
use chrono::DateTime;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

struct RawQueueRow {
    id: String,
    op: String,
    priority: i64,
    conflict: String,
    queued_at: String,
    retry_count: i64,
    max_retries: i64,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawQueueRow> {
    Ok(RawQueueRow {
        id: row.get(0)?,
        op: row.get(1)?,
        priority: row.get(2)?,
        conflict: row.get(3)?,
        queued_at: row.get(4)?,
        retry_count: row.get(5)?,
        max_retries: row.get(6)?,
    })
}

fn finish_queued(raw: RawQueueRow) -> Result<QueueRecord, Error> {
    let operation: SyncOperation = serde_json::from_str(&raw.op)?;
    let conflict = ConflictStrategy::parse(&raw.conflict)
        .ok_or_else(|| Error::Corrupted(format!("unknown conflict strategy in store: {}", raw.conflict)))?;
    let queued_at = DateTime::parse_from_rfc3339(&raw.queued_at)
        .map_err(|e| Error::Corrupted(format!("bad queued_at timestamp: {e}")))?
        .to_utc();
    Ok(QueueRecord {
        id: raw.id,
        operation,
        priority: Priority::from_rank(raw.priority),
        conflict,
        queued_at,
        retry_count: raw.retry_count as u32,
        max_retries: raw.max_retries as u32,
    })
}

impl StoreDb {
    /// Append a pending mutation.
    pub async fn enqueue(&self, record: &QueueRecord) -> Result<(), Error> {
        let op = serde_json::to_string(&record.operation)?;
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO sync_queue (id, op, kind, priority, conflict, queued_at, retry_count, max_retries)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(id) DO UPDATE SET
                        op = excluded.op,
                        kind = excluded.kind,
                        priority = excluded.priority,
                        conflict = excluded.conflict,
                        queued_at = excluded.queued_at,
                        retry_count = excluded.retry_count,
                        max_retries = excluded.max_retries",
                    params![
                        &record.id,
                        op,
                        record.operation.kind().as_str(),
                        record.priority.rank(),
                        record.conflict.as_str(),
                        record.queued_at.to_rfc3339(),
                        record.retry_count,
                        record.max_retries,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All pending mutations in replay order: priority, then enqueue time.
    pub async fn pending_operations(&self) -> Result<Vec<QueueRecord>, Error> {
        let raws = self
            .conn
            .call(|conn| -> Result<Vec<RawQueueRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, op, priority, conflict, queued_at, retry_count, max_retries
                     FROM sync_queue ORDER BY priority ASC, queued_at ASC",
                )?;
                let rows = stmt.query_map([], row_to_raw)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
            .map_err(Error::from)?;
        raws.into_iter().map(finish_queued).collect()
    }

    pub async fn remove_operation(&self, id: &str) -> Result<(), Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Increment an item's retry count, returning the new value.
    pub async fn bump_retry(&self, id: &str) -> Result<u32, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<u32, Error> {
                conn.execute(
                    "UPDATE sync_queue SET retry_count = retry_count + 1 WHERE id = ?1",
                    params![&id],
                )?;
                let count: i64 =
                    conn.query_row("SELECT retry_count FROM sync_queue WHERE id = ?1", params![id], |row| {
                        row.get(0)
                    })?;
                Ok(count as u32)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn queue_len(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn clear_queue(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM sync_queue", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
