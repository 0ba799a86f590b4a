//! Queued mutation model.
//!
//! Offline-tolerant mutations are a closed, serde-tagged enum so each
//! operation kind carries a concretely shaped payload and dispatch is
//! exhaustive; no runtime shape-guessing on opaque blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminant for a queued mutation, used for routing and indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    SymptomLog,
    QuizResult,
    Bookmark,
    Settings,
    UserProgress,
    AnalyticsEvent,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SymptomLog => "symptom-log",
            OperationKind::QuizResult => "quiz-result",
            OperationKind::Bookmark => "bookmark",
            OperationKind::Settings => "settings",
            OperationKind::UserProgress => "user-progress",
            OperationKind::AnalyticsEvent => "analytics-event",
        }
    }
}

/// One pending mutation with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "data", rename_all = "kebab-case")]
pub enum SyncOperation {
    SymptomLog(SymptomLogEntry),
    QuizResult(QuizResultEntry),
    Bookmark(BookmarkChange),
    Settings(SettingsUpdate),
    UserProgress(ProgressUpdate),
    AnalyticsEvent(AnalyticsEventEntry),
}

impl SyncOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            SyncOperation::SymptomLog(_) => OperationKind::SymptomLog,
            SyncOperation::QuizResult(_) => OperationKind::QuizResult,
            SyncOperation::Bookmark(_) => OperationKind::Bookmark,
            SyncOperation::Settings(_) => OperationKind::Settings,
            SyncOperation::UserProgress(_) => OperationKind::UserProgress,
            SyncOperation::AnalyticsEvent(_) => OperationKind::AnalyticsEvent,
        }
    }

    /// Payload as opaque JSON, for conflict resolution.
    pub fn payload_value(&self) -> serde_json::Value {
        // The tagged representation is {"operation": ..., "data": ...};
        // serializing self cannot fail for these payload types.
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("data").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }

    /// Rebuild a typed operation from a kind plus a resolved opaque payload.
    pub fn from_kind_payload(kind: OperationKind, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        let tagged = serde_json::json!({
            "operation": kind,
            "data": payload,
        });
        serde_json::from_value(tagged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomLogEntry {
    pub symptom_id: String,
    pub severity: u8,
    pub noted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResultEntry {
    pub quiz_id: String,
    pub score: u32,
    pub total: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookmarkAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkChange {
    pub action: BookmarkAction,
    pub content_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub module_id: String,
    pub completed_sections: Vec<String>,
    pub percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEventEntry {
    pub name: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Replay priority. High replays before normal, normal before low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Store encoding; smaller ranks replay first.
    pub fn rank(&self) -> i64 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    pub fn from_rank(rank: i64) -> Self {
        match rank {
            0 => Priority::High,
            1 => Priority::Normal,
            _ => Priority::Low,
        }
    }
}

/// Policy applied when a queued local change disagrees with remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    ClientWins,
    ServerWins,
    Merge,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::ClientWins => "client-wins",
            ConflictStrategy::ServerWins => "server-wins",
            ConflictStrategy::Merge => "merge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client-wins" => Some(ConflictStrategy::ClientWins),
            "server-wins" => Some(ConflictStrategy::ServerWins),
            "merge" => Some(ConflictStrategy::Merge),
            _ => None,
        }
    }
}

/// One durable sync-queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: String,
    pub operation: SyncOperation,
    pub priority: Priority,
    pub conflict: ConflictStrategy,
    pub queued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl QueueRecord {
    pub fn new(operation: SyncOperation, priority: Priority, conflict: ConflictStrategy, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation,
            priority,
            conflict,
            queued_at: Utc::now(),
            retry_count: 0,
            max_retries,
        }
    }
}
