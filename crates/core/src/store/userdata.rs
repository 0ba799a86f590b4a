//! User data collection.
//!
//! A key/value collection for locally owned records (settings, progress,
//! bookmarks materialized for the UI). The needs_sync flag marks entries
//! that have pending queued mutations.

use super::connection::StoreDb;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDataRecord {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: String,
    pub needs_sync: bool,
}

impl StoreDb {
    pub async fn put_user_data(&self, key: &str, value: &serde_json::Value, needs_sync: bool) -> Result<(), Error> {
        let key = key.to_string();
        let value = serde_json::to_string(value)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO user_data (key, value, updated_at, needs_sync)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at,
                        needs_sync = excluded.needs_sync",
                    params![key, value, now, needs_sync as i32],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn get_user_data(&self, key: &str) -> Result<Option<UserDataRecord>, Error> {
        let key = key.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<(String, String, String, i32)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT key, value, updated_at, needs_sync FROM user_data WHERE key = ?1")?;
                match stmt.query_row(params![key], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                }) {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;
        raw.map(|(key, value, updated_at, needs_sync)| {
            Ok(UserDataRecord { key, value: serde_json::from_str(&value)?, updated_at, needs_sync: needs_sync == 1 })
        })
        .transpose()
    }

    /// All entries flagged as needing sync.
    pub async fn user_data_needing_sync(&self) -> Result<Vec<UserDataRecord>, Error> {
        let raws = self
            .conn
            .call(|conn| -> Result<Vec<(String, String, String, i32)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, value, updated_at, needs_sync FROM user_data WHERE needs_sync = 1 ORDER BY key",
                )?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
            .map_err(Error::from)?;
        raws.into_iter()
            .map(|(key, value, updated_at, needs_sync)| {
                Ok(UserDataRecord {
                    key,
                    value: serde_json::from_str(&value)?,
                    updated_at,
                    needs_sync: needs_sync == 1,
                })
            })
            .collect()
    }

    /// Delete all user data except the given keys. Returns the count deleted.
    pub async fn clear_user_data_except(&self, keep: &[String]) -> Result<u64, Error> {
        let keep = keep.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let placeholders: Vec<String> = (1..=keep.len()).map(|i| format!("?{i}")).collect();
                let sql = if keep.is_empty() {
                    "DELETE FROM user_data".to_string()
                } else {
                    format!("DELETE FROM user_data WHERE key NOT IN ({})", placeholders.join(", "))
                };
                let count = conn.execute(&sql, rusqlite::params_from_iter(keep.iter()))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
