//! Conflict resolution.
//!
//! When the remote rejects a queued operation because it holds a newer
//! record, the queue item's strategy decides the outcome: keep the local
//! version, accept the remote one, or merge the two field-wise.

use corpus_core::operation::{ConflictStrategy, SyncOperation};
use serde_json::Value;

/// What to do with a conflicted queue item.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Deliver this operation to the remote again.
    Reapply(SyncOperation),
    /// The remote record stands; drop the local operation.
    AcceptRemote,
}

/// Resolve a conflict between a queued local operation and the remote
/// record that displaced it.
///
/// Merge builds a field-wise union of the two payloads with local values
/// winning on overlapping keys. When either side is not a JSON object
/// there is nothing to merge field-wise and the local payload wins whole.
pub fn resolve(
    local: &SyncOperation,
    remote: &Value,
    strategy: ConflictStrategy,
) -> Result<Resolution, serde_json::Error> {
    match strategy {
        ConflictStrategy::ClientWins => Ok(Resolution::Reapply(local.clone())),
        ConflictStrategy::ServerWins => Ok(Resolution::AcceptRemote),
        ConflictStrategy::Merge => {
            let local_payload = local.payload_value();
            let merged = match (local_payload, remote) {
                (Value::Object(local_map), Value::Object(remote_map)) => {
                    let mut out = remote_map.clone();
                    for (key, value) in local_map {
                        out.insert(key, value);
                    }
                    Value::Object(out)
                }
                (local_payload, _) => local_payload,
            };
            let op = SyncOperation::from_kind_payload(local.kind(), merged)?;
            Ok(Resolution::Reapply(op))
        }
    }
}
