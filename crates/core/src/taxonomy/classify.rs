//! Best-effort classification of arbitrary failure messages.
//!
//! Used when an error reaches the engine without taxonomy metadata (for
//! example a failure bubbling out of an injected fetcher). Classification is
//! an ordered rule table: the first rule whose keyword matches wins, so the
//! table is independently testable and extensible without touching call
//! sites. Errors that already carry taxonomy metadata must be passed through
//! unchanged, not re-classified.

use super::{ClassifiedError, ErrorCategory, ErrorCode, RecoveryAction, Severity};

struct Rule {
    keywords: &'static [&'static str],
    category: ErrorCategory,
    code: ErrorCode,
    severity: Severity,
    actions: &'static [RecoveryAction],
    recoverable: bool,
}

/// Precedence: network, storage, rendering, remote-service, data.
const RULES: &[Rule] = &[
    Rule {
        keywords: &["offline", "no connection", "disconnected"],
        category: ErrorCategory::Network,
        code: ErrorCode::Offline,
        severity: Severity::Warning,
        actions: &[RecoveryAction::Retry],
        recoverable: true,
    },
    Rule {
        keywords: &["timeout", "timed out", "deadline"],
        category: ErrorCategory::Network,
        code: ErrorCode::Timeout,
        severity: Severity::Error,
        actions: &[RecoveryAction::Retry],
        recoverable: true,
    },
    Rule {
        keywords: &["network", "fetch", "connection", "dns", "socket", "unreachable"],
        category: ErrorCategory::Network,
        code: ErrorCode::Unknown,
        severity: Severity::Error,
        actions: &[RecoveryAction::Retry],
        recoverable: true,
    },
    Rule {
        keywords: &["quota", "disk is full", "disk full"],
        category: ErrorCategory::Storage,
        code: ErrorCode::QuotaExceeded,
        severity: Severity::Error,
        actions: &[RecoveryAction::ClearCache],
        recoverable: true,
    },
    Rule {
        keywords: &["corrupt", "malformed database", "not a database"],
        category: ErrorCategory::Storage,
        code: ErrorCode::CorruptedStore,
        severity: Severity::Critical,
        actions: &[RecoveryAction::ClearCache, RecoveryAction::Reload],
        recoverable: true,
    },
    Rule {
        keywords: &["database", "sqlite", "storage", "persist"],
        category: ErrorCategory::Storage,
        code: ErrorCode::StorageFailure,
        severity: Severity::Error,
        actions: &[RecoveryAction::Retry],
        recoverable: true,
    },
    Rule {
        keywords: &["render", "webgl", "canvas", "shader", "texture", "gpu"],
        category: ErrorCategory::Rendering,
        code: ErrorCode::RenderFailed,
        severity: Severity::Error,
        actions: &[RecoveryAction::Reload, RecoveryAction::Fallback],
        recoverable: true,
    },
    Rule {
        keywords: &["rate limit", "too many requests", "429"],
        category: ErrorCategory::RemoteService,
        code: ErrorCode::RateLimited,
        severity: Severity::Warning,
        actions: &[RecoveryAction::Retry],
        recoverable: true,
    },
    Rule {
        keywords: &["model", "inference", "completion", "api error", "service unavailable"],
        category: ErrorCategory::RemoteService,
        code: ErrorCode::InvalidResponse,
        severity: Severity::Error,
        actions: &[RecoveryAction::Retry, RecoveryAction::Fallback],
        recoverable: true,
    },
    Rule {
        keywords: &["parse", "json", "serialize", "deserialize", "missing field", "invalid type"],
        category: ErrorCategory::Data,
        code: ErrorCode::MalformedRecord,
        severity: Severity::Error,
        actions: &[RecoveryAction::Refresh],
        recoverable: true,
    },
    Rule {
        keywords: &["unauthorized", "401", "session expired", "token"],
        category: ErrorCategory::Authentication,
        code: ErrorCode::AuthExpired,
        severity: Severity::Error,
        actions: &[RecoveryAction::Navigate],
        recoverable: true,
    },
    Rule {
        keywords: &["forbidden", "403", "permission"],
        category: ErrorCategory::Permission,
        code: ErrorCode::PermissionDenied,
        severity: Severity::Error,
        actions: &[RecoveryAction::None],
        recoverable: false,
    },
];

/// Classify a raw failure message into the taxonomy.
///
/// Unknown inputs default to `error` severity with a `[retry]` recovery set,
/// never an empty one.
pub fn classify(message: &str) -> ClassifiedError {
    let haystack = message.to_lowercase();
    for rule in RULES {
        if rule.keywords.iter().any(|k| haystack.contains(k)) {
            return ClassifiedError::new(
                rule.code,
                rule.category,
                rule.severity,
                default_user_message(rule.category),
                message,
                rule.actions.to_vec(),
                rule.recoverable,
            );
        }
    }
    ClassifiedError::unknown(message)
}

fn default_user_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => "A network problem interrupted this request.",
        ErrorCategory::Storage => "A storage problem interrupted this request.",
        ErrorCategory::Rendering => "The 3D view ran into a problem.",
        ErrorCategory::RemoteService => "The service could not complete this request.",
        ErrorCategory::Data => "Some data could not be read.",
        ErrorCategory::Validation => "Something about this request was invalid.",
        ErrorCategory::Authentication => "Please sign in again.",
        ErrorCategory::Permission => "You don't have permission to do that.",
        ErrorCategory::Unknown => "Something went wrong. Please try again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_beats_storage() {
        // "fetch" (network) appears before any storage keyword in the table.
        let err = classify("fetch failed while writing to database");
        assert_eq!(err.category, ErrorCategory::Network);
    }

    #[test]
    fn test_timeout_keyword() {
        let err = classify("request timed out after 20s");
        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(err.category, ErrorCategory::Network);
    }

    #[test]
    fn test_quota_maps_to_clear_cache() {
        let err = classify("write failed: quota exceeded");
        assert_eq!(err.code, ErrorCode::QuotaExceeded);
        assert_eq!(err.recovery_actions, vec![RecoveryAction::ClearCache]);
    }

    #[test]
    fn test_rendering_keyword() {
        let err = classify("WebGL context lost");
        assert_eq!(err.category, ErrorCategory::Rendering);
    }

    #[test]
    fn test_unknown_defaults_never_empty() {
        let err = classify("zorp");
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.recovery_actions, vec![RecoveryAction::Retry]);
        assert!(err.recoverable);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let a = classify("connection reset by peer");
        let b = classify("connection reset by peer");
        assert_eq!(a.code, b.code);
        assert_eq!(a.category, b.category);
        assert_eq!(a.recovery_actions, b.recovery_actions);
    }

    #[test]
    fn test_case_insensitive() {
        let err = classify("DNS lookup failed");
        assert_eq!(err.category, ErrorCategory::Network);
    }
}
