//! Error taxonomy: the uniform failure representation for the engine.
//!
//! Every failure that crosses a public boundary, regardless of which
//! component produced it, is represented as exactly one [`ClassifiedError`]
//! carrying a closed category/severity/recovery vocabulary, a user-facing
//! message separate from the technical one, and a recoverability flag.
//! The mapping from any given input is deterministic.

pub mod classify;
pub mod logger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use classify::classify;
pub use logger::{ErrorLogRecord, ErrorLogger};

/// Failure origin category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Network,
    Data,
    RemoteService,
    Storage,
    Rendering,
    Validation,
    Authentication,
    Permission,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Data => "data",
            ErrorCategory::RemoteService => "remote-service",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Rendering => "rendering",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// Failure severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// Recommended recovery actions, ordered by preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryAction {
    Retry,
    Refresh,
    Reload,
    Navigate,
    ClearCache,
    Fallback,
    None,
}

/// Closed set of well-known failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    Offline,
    Timeout,
    RateLimited,
    InvalidResponse,
    QuotaExceeded,
    CorruptedStore,
    StoreUnavailable,
    StorageFailure,
    CapabilityUnsupported,
    NotFound,
    InvalidInput,
    MalformedRecord,
    AuthExpired,
    PermissionDenied,
    RenderFailed,
    SyncConflict,
    RetriesExhausted,
    AlreadySyncing,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Offline => "offline",
            ErrorCode::Timeout => "timeout",
            ErrorCode::RateLimited => "rate-limited",
            ErrorCode::InvalidResponse => "invalid-response",
            ErrorCode::QuotaExceeded => "quota-exceeded",
            ErrorCode::CorruptedStore => "corrupted-store",
            ErrorCode::StoreUnavailable => "store-unavailable",
            ErrorCode::StorageFailure => "storage-failure",
            ErrorCode::CapabilityUnsupported => "capability-unsupported",
            ErrorCode::NotFound => "not-found",
            ErrorCode::InvalidInput => "invalid-input",
            ErrorCode::MalformedRecord => "malformed-record",
            ErrorCode::AuthExpired => "auth-expired",
            ErrorCode::PermissionDenied => "permission-denied",
            ErrorCode::RenderFailed => "render-failed",
            ErrorCode::SyncConflict => "sync-conflict",
            ErrorCode::RetriesExhausted => "retries-exhausted",
            ErrorCode::AlreadySyncing => "already-syncing",
            ErrorCode::Unknown => "unknown",
        }
    }
}

/// The uniform error representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub user_message: String,
    pub technical_message: String,
    pub recovery_actions: Vec<RecoveryAction>,
    pub recoverable: bool,
    pub details: Option<serde_json::Value>,
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.technical_message)
    }
}

impl std::error::Error for ClassifiedError {}

impl ClassifiedError {
    /// Base constructor used by the per-condition helpers below.
    pub fn new(
        code: ErrorCode, category: ErrorCategory, severity: Severity, user_message: impl Into<String>,
        technical_message: impl Into<String>, recovery_actions: Vec<RecoveryAction>, recoverable: bool,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            timestamp: Utc::now(),
            user_message: user_message.into(),
            technical_message: technical_message.into(),
            recovery_actions,
            recoverable,
            details: None,
        }
    }

    /// Attach structured, category-specific details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether retrying the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        self.recoverable && self.recovery_actions.contains(&RecoveryAction::Retry)
    }

    pub fn offline() -> Self {
        Self::new(
            ErrorCode::Offline,
            ErrorCategory::Network,
            Severity::Warning,
            "You appear to be offline. Changes will sync when you reconnect.",
            "no connectivity reported by the host",
            vec![RecoveryAction::Retry],
            true,
        )
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Timeout,
            ErrorCategory::Network,
            Severity::Error,
            "The request took too long. Please try again.",
            detail,
            vec![RecoveryAction::Retry],
            true,
        )
    }

    pub fn rate_limited(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RateLimited,
            ErrorCategory::RemoteService,
            Severity::Warning,
            "The service is busy right now. Please wait a moment.",
            detail,
            vec![RecoveryAction::Retry],
            true,
        )
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidResponse,
            ErrorCategory::RemoteService,
            Severity::Error,
            "The service returned an unexpected answer.",
            detail,
            vec![RecoveryAction::Retry, RecoveryAction::Fallback],
            true,
        )
    }

    pub fn quota_exceeded(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::QuotaExceeded,
            ErrorCategory::Storage,
            Severity::Error,
            "Device storage is full. Clearing cached content may help.",
            detail,
            vec![RecoveryAction::ClearCache],
            true,
        )
    }

    pub fn corrupted_store(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CorruptedStore,
            ErrorCategory::Storage,
            Severity::Critical,
            "Stored data is damaged and needs to be reset.",
            detail,
            vec![RecoveryAction::ClearCache, RecoveryAction::Reload],
            true,
        )
    }

    pub fn store_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::StoreUnavailable,
            ErrorCategory::Storage,
            Severity::Critical,
            "Offline storage could not be opened. Content will not be saved.",
            detail,
            vec![RecoveryAction::Fallback],
            false,
        )
    }

    pub fn storage_failure(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::StorageFailure,
            ErrorCategory::Storage,
            Severity::Error,
            "Saving data failed. Please try again.",
            detail,
            vec![RecoveryAction::Retry],
            true,
        )
    }

    pub fn capability_unsupported(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CapabilityUnsupported,
            ErrorCategory::Storage,
            Severity::Critical,
            "This device does not support offline storage.",
            detail,
            vec![RecoveryAction::Fallback],
            false,
        )
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        let what = what.into();
        Self::new(
            ErrorCode::NotFound,
            ErrorCategory::Data,
            Severity::Warning,
            "The requested content is not available offline.",
            format!("not found: {what}"),
            vec![RecoveryAction::Refresh],
            true,
        )
    }

    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            ErrorCategory::Validation,
            Severity::Error,
            "Something about this request was invalid.",
            detail,
            vec![RecoveryAction::None],
            false,
        )
    }

    pub fn malformed_record(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MalformedRecord,
            ErrorCategory::Data,
            Severity::Error,
            "Stored data could not be read.",
            detail,
            vec![RecoveryAction::ClearCache],
            true,
        )
    }

    pub fn auth_expired() -> Self {
        Self::new(
            ErrorCode::AuthExpired,
            ErrorCategory::Authentication,
            Severity::Error,
            "Your session has expired. Please sign in again.",
            "authentication token expired or missing",
            vec![RecoveryAction::Navigate],
            true,
        )
    }

    pub fn permission_denied(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            ErrorCategory::Permission,
            Severity::Error,
            "You don't have permission to do that.",
            detail,
            vec![RecoveryAction::None],
            false,
        )
    }

    pub fn render_failed(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RenderFailed,
            ErrorCategory::Rendering,
            Severity::Error,
            "The 3D view could not be displayed.",
            detail,
            vec![RecoveryAction::Reload, RecoveryAction::Fallback],
            true,
        )
    }

    pub fn sync_conflict(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SyncConflict,
            ErrorCategory::Data,
            Severity::Warning,
            "A change made on another device conflicted with yours.",
            detail,
            vec![RecoveryAction::Refresh],
            true,
        )
    }

    pub fn retries_exhausted(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RetriesExhausted,
            ErrorCategory::Network,
            Severity::Error,
            "A pending change could not be synced and was discarded.",
            detail,
            vec![RecoveryAction::None],
            false,
        )
    }

    pub fn already_syncing() -> Self {
        Self::new(
            ErrorCode::AlreadySyncing,
            ErrorCategory::Data,
            Severity::Info,
            "Sync is already in progress.",
            "attempt_sync called while a sync pass was running",
            vec![RecoveryAction::None],
            true,
        )
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Unknown,
            ErrorCategory::Unknown,
            Severity::Error,
            "Something went wrong. Please try again.",
            detail,
            vec![RecoveryAction::Retry],
            true,
        )
    }
}

/// Deterministic mapping from storage-level failures.
impl From<crate::error::Error> for ClassifiedError {
    fn from(err: crate::error::Error) -> Self {
        use crate::error::Error;
        match err {
            Error::QuotaExceeded(d) => ClassifiedError::quota_exceeded(d),
            Error::Corrupted(d) => ClassifiedError::corrupted_store(d),
            Error::MigrationFailed(d) => ClassifiedError::store_unavailable(format!("migration failed: {d}")),
            Error::MalformedRecord(e) => ClassifiedError::malformed_record(e.to_string()),
            Error::Database(e) => ClassifiedError::storage_failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_message() {
        let err = ClassifiedError::timeout("fetch exceeded 20s");
        assert!(err.to_string().contains("timeout"));
        assert!(err.to_string().contains("fetch exceeded 20s"));
    }

    #[test]
    fn test_user_message_distinct_from_technical() {
        let err = ClassifiedError::quota_exceeded("SQLITE_FULL");
        assert_ne!(err.user_message, err.technical_message);
        assert!(!err.user_message.contains("SQLITE_FULL"));
    }

    #[test]
    fn test_quota_recommends_clear_cache() {
        let err = ClassifiedError::quota_exceeded("disk full");
        assert_eq!(err.recovery_actions, vec![RecoveryAction::ClearCache]);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_capability_unsupported_not_recoverable() {
        let err = ClassifiedError::capability_unsupported("no sqlite on host");
        assert!(!err.recoverable);
        assert_eq!(err.recovery_actions, vec![RecoveryAction::Fallback]);
        assert_eq!(err.severity, Severity::Critical);
    }

    #[test]
    fn test_store_error_mapping_is_deterministic() {
        let a: ClassifiedError = crate::error::Error::QuotaExceeded("full".into()).into();
        let b: ClassifiedError = crate::error::Error::QuotaExceeded("full".into()).into();
        assert_eq!(a.code, b.code);
        assert_eq!(a.category, b.category);
        assert_eq!(a.code, ErrorCode::QuotaExceeded);
        assert_eq!(a.category, ErrorCategory::Storage);
    }

    #[test]
    fn test_retryable_requires_retry_action() {
        assert!(ClassifiedError::timeout("t").is_retryable());
        assert!(!ClassifiedError::invalid_input("bad").is_retryable());
    }

    #[test]
    fn test_classified_errors_compare_by_value() {
        let err = ClassifiedError::offline();
        assert_eq!(err.clone(), err);
        assert_ne!(ClassifiedError::timeout("t"), ClassifiedError::invalid_input("t"));
    }
}
