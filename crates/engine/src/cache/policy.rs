//! Record construction and freshness arithmetic.

use chrono::{DateTime, Utc};
use corpus_core::store::{ContentKind, ContentRecord};
use std::time::Duration;

/// Absolute expiry for an entry written at `now`, or None for no expiry.
/// A TTL too large to represent also yields None.
pub fn expiry_for(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<String> {
    ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok())
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(|expiry| expiry.to_rfc3339())
}

/// Build a content record for a freshly fetched payload.
///
/// The version is bumped past the previous record's so observers can tell
/// a refresh from a re-read.
pub fn build_record(
    kind: ContentKind,
    id: &str,
    payload: serde_json::Value,
    ttl: Option<Duration>,
    prev_version: Option<i64>,
) -> ContentRecord {
    let now = Utc::now();
    let size = payload.to_string().len() as i64;
    ContentRecord {
        kind,
        id: id.to_string(),
        payload,
        cached_at: now.to_rfc3339(),
        expires_at: expiry_for(now, ttl),
        last_accessed: now.to_rfc3339(),
        access_count: 0,
        size,
        version: prev_version.map_or(1, |v| v + 1),
    }
}
