//! Error log collection.
//!
//! Append-only history of classified errors for diagnostics, bounded by a
//! configured maximum; the oldest entries are trimmed first.

use super::connection::StoreDb;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// One stored error-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogRecord {
    /// Assigned by the store on append; None before insertion.
    pub seq: Option<i64>,
    pub code: String,
    pub category: String,
    pub severity: String,
    pub technical_message: String,
    pub user_message: String,
    pub context: String,
    pub session_id: String,
    pub logged_at: String,
}

fn row_to_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<ErrorLogRecord> {
    Ok(ErrorLogRecord {
        seq: row.get(0)?,
        code: row.get(1)?,
        category: row.get(2)?,
        severity: row.get(3)?,
        technical_message: row.get(4)?,
        user_message: row.get(5)?,
        context: row.get(6)?,
        session_id: row.get(7)?,
        logged_at: row.get(8)?,
    })
}

impl StoreDb {
    /// Append a log entry, returning it with its assigned sequence number.
    pub async fn append_log(&self, record: &ErrorLogRecord) -> Result<ErrorLogRecord, Error> {
        let mut record = record.clone();
        let insert = record.clone();
        let seq = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO error_log (
                        code, category, severity, technical_message,
                        user_message, context, session_id, logged_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        &insert.code,
                        &insert.category,
                        &insert.severity,
                        &insert.technical_message,
                        &insert.user_message,
                        &insert.context,
                        &insert.session_id,
                        &insert.logged_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)?;
        record.seq = Some(seq);
        Ok(record)
    }

    /// Most recent entries, newest first.
    pub async fn recent_logs(&self, limit: u32) -> Result<Vec<ErrorLogRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<ErrorLogRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT seq, code, category, severity, technical_message,
                            user_message, context, session_id, logged_at
                     FROM error_log ORDER BY seq DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], row_to_log)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop the oldest entries beyond `max_entries`. Returns the count trimmed.
    pub async fn trim_logs(&self, max_entries: u64) -> Result<u64, Error> {
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM error_log", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }
                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM error_log WHERE seq IN (
                        SELECT seq FROM error_log ORDER BY seq ASC LIMIT ?1
                    )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(msg: &str) -> ErrorLogRecord {
        ErrorLogRecord {
            seq: None,
            code: "timeout".to_string(),
            category: "network".to_string(),
            severity: "error".to_string(),
            technical_message: msg.to_string(),
            user_message: "The request took too long.".to_string(),
            context: "get_content".to_string(),
            session_id: "test-session".to_string(),
            logged_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_append_assigns_seq() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let stored = db.append_log(&make_entry("first")).await.unwrap();
        assert!(stored.seq.is_some());
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.append_log(&make_entry("one")).await.unwrap();
        db.append_log(&make_entry("two")).await.unwrap();
        db.append_log(&make_entry("three")).await.unwrap();

        let recent = db.recent_logs(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].technical_message, "three");
        assert_eq!(recent[1].technical_message, "two");
    }

    #[tokio::test]
    async fn test_trim_drops_oldest() {
        let db = StoreDb::open_in_memory().await.unwrap();
        for i in 0..5 {
            db.append_log(&make_entry(&format!("msg-{i}"))).await.unwrap();
        }

        let trimmed = db.trim_logs(3).await.unwrap();
        assert_eq!(trimmed, 2);

        let remaining = db.recent_logs(10).await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining.last().unwrap().technical_message, "msg-2");
    }
}
