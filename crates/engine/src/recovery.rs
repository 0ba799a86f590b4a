//! Recovery actions.
//!
//! Executes the storage-side recovery actions an error can carry. Actions
//! that are UI concerns (retry, navigate, reload) are handed back to the
//! host as advisories. Running a recovery never returns an error; a failed
//! attempt is reported as an outcome.

use std::sync::Arc;

use corpus_core::store::OfflineStore;
use corpus_core::taxonomy::{ClassifiedError, ErrorLogger, RecoveryAction};

/// What happened when a recovery action ran.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// The action was executed here.
    Done,
    /// The action is the host UI's to perform.
    Advisory(RecoveryAction),
    /// Execution was attempted and failed.
    Failed(ClassifiedError),
}

/// Executes storage-side recovery actions.
pub struct RecoveryRunner {
    store: Arc<dyn OfflineStore>,
    logger: Arc<ErrorLogger>,
    preserve_keys: Vec<String>,
}

impl RecoveryRunner {
    pub fn new(store: Arc<dyn OfflineStore>, logger: Arc<ErrorLogger>, preserve_keys: Vec<String>) -> Self {
        Self { store, logger, preserve_keys }
    }

    pub async fn run(&self, action: RecoveryAction) -> RecoveryOutcome {
        match action {
            RecoveryAction::ClearCache => self.clear_cache().await,
            RecoveryAction::None => RecoveryOutcome::Done,
            other => RecoveryOutcome::Advisory(other),
        }
    }

    /// Drop cached content and assets, and all user data outside the
    /// preserve list. The sync queue is untouched; queued mutations still
    /// belong to the user.
    async fn clear_cache(&self) -> RecoveryOutcome {
        tracing::info!("running clear-cache recovery");
        let result = async {
            self.store.clear_content().await?;
            self.store.clear_assets().await?;
            self.store.clear_user_data_except(&self.preserve_keys).await?;
            Ok::<(), corpus_core::Error>(())
        }
        .await;

        match result {
            Ok(()) => RecoveryOutcome::Done,
            Err(e) => {
                let classified = ClassifiedError::from(e);
                self.logger.log(&classified, "recovery.clear_cache").await;
                RecoveryOutcome::Failed(classified)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use corpus_core::store::{AssetKind, AssetRecord, ContentKind, ContentRecord, MemoryStore};
    use serde_json::json;

    fn runner(store: Arc<MemoryStore>) -> RecoveryRunner {
        let logger = Arc::new(ErrorLogger::new(store.clone(), 50));
        RecoveryRunner::new(store, logger, vec!["settings".to_string()])
    }

    #[tokio::test]
    async fn test_clear_cache_preserves_allow_listed_keys_and_queue() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now().to_rfc3339();
        store
            .put_content(&ContentRecord {
                kind: ContentKind::Encyclopedia,
                id: "heart".into(),
                payload: json!({}),
                cached_at: now.clone(),
                expires_at: None,
                last_accessed: now.clone(),
                access_count: 0,
                size: 2,
                version: 1,
            })
            .await
            .unwrap();
        store
            .put_asset(&AssetRecord {
                url: "a".into(),
                kind: AssetKind::Image,
                bytes: vec![0; 8],
                content_type: None,
                size: 8,
                cached_at: now.clone(),
                last_accessed: now,
                etag: None,
            })
            .await
            .unwrap();
        store.put_user_data("settings", &json!({"theme": "dark"}), false).await.unwrap();
        store.put_user_data("scratch", &json!({}), false).await.unwrap();
        let queued = corpus_core::operation::QueueRecord::new(
            corpus_core::operation::SyncOperation::Bookmark(corpus_core::operation::BookmarkChange {
                action: corpus_core::operation::BookmarkAction::Add,
                content_id: "heart".into(),
            }),
            corpus_core::operation::Priority::Normal,
            corpus_core::operation::ConflictStrategy::ClientWins,
            3,
        );
        store.enqueue(&queued).await.unwrap();

        let outcome = runner(store.clone()).run(RecoveryAction::ClearCache).await;
        assert_eq!(outcome, RecoveryOutcome::Done);

        assert_eq!(store.count_content().await.unwrap(), 0);
        assert_eq!(store.count_assets().await.unwrap(), 0);
        assert!(store.get_user_data("settings").await.unwrap().is_some());
        assert!(store.get_user_data("scratch").await.unwrap().is_none());
        assert_eq!(store.queue_len().await.unwrap(), 1, "queued mutations survive");
    }

    #[tokio::test]
    async fn test_ui_actions_are_advisory() {
        let store = Arc::new(MemoryStore::new());
        let runner = runner(store);
        assert_eq!(runner.run(RecoveryAction::Retry).await, RecoveryOutcome::Advisory(RecoveryAction::Retry));
        assert_eq!(runner.run(RecoveryAction::Reload).await, RecoveryOutcome::Advisory(RecoveryAction::Reload));
        assert_eq!(runner.run(RecoveryAction::None).await, RecoveryOutcome::Done);
    }
}
