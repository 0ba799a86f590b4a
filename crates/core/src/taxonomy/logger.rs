//! Persistent error logging.
//!
//! Appends every classified error to the store's bounded error_log
//! collection and mirrors it to tracing at a level matching its severity.
//! Logging itself never fails: a store write error is reported via tracing
//! and the entry is returned unsequenced.

use super::{ClassifiedError, Severity};
use crate::store::OfflineStore;
use std::sync::Arc;

pub use crate::store::logs::ErrorLogRecord;

/// Appends classified errors to the store's error log.
pub struct ErrorLogger {
    store: Arc<dyn OfflineStore>,
    session_id: String,
    max_entries: u64,
}

impl ErrorLogger {
    /// A fresh session id is generated per logger instance.
    pub fn new(store: Arc<dyn OfflineStore>, max_entries: u64) -> Self {
        Self { store, session_id: uuid::Uuid::new_v4().to_string(), max_entries }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record an error with the component context it surfaced from.
    pub async fn log(&self, error: &ClassifiedError, context: &str) -> ErrorLogRecord {
        match error.severity {
            Severity::Critical => {
                tracing::error!(code = error.code.as_str(), context, "critical: {}", error.technical_message);
            }
            Severity::Error => {
                tracing::error!(code = error.code.as_str(), context, "{}", error.technical_message);
            }
            Severity::Warning => {
                tracing::warn!(code = error.code.as_str(), context, "{}", error.technical_message);
            }
            Severity::Info => {
                tracing::info!(code = error.code.as_str(), context, "{}", error.technical_message);
            }
        }

        let record = ErrorLogRecord {
            seq: None,
            code: error.code.as_str().to_string(),
            category: error.category.as_str().to_string(),
            severity: error.severity.as_str().to_string(),
            technical_message: error.technical_message.clone(),
            user_message: error.user_message.clone(),
            context: context.to_string(),
            session_id: self.session_id.clone(),
            logged_at: error.timestamp.to_rfc3339(),
        };

        match self.store.append_log(&record).await {
            Ok(stored) => {
                if let Err(e) = self.store.trim_logs(self.max_entries).await {
                    tracing::warn!("failed to trim error log: {e}");
                }
                stored
            }
            Err(e) => {
                tracing::warn!("failed to persist error log entry: {e}");
                record
            }
        }
    }

    /// Most recent entries across all sessions, newest first.
    pub async fn recent(&self, limit: u32) -> Vec<ErrorLogRecord> {
        match self.store.recent_logs(limit).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("failed to read error log: {e}");
                Vec::new()
            }
        }
    }
}
