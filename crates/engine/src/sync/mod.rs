//! Sync manager.
//!
//! Drains the durable sync queue against a remote endpoint in priority
//! order. At most one pass runs at a time; a pass can be cancelled when
//! connectivity drops. Every queued item is delivered at most its
//! `max_retries` times across passes, then dropped with a logged error.

pub mod conflict;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use corpus_core::operation::{ConflictStrategy, Priority, QueueRecord, SyncOperation};
use corpus_core::store::OfflineStore;
use corpus_core::taxonomy::{ClassifiedError, ErrorCategory, ErrorLogger};
use tokio::sync::{broadcast, watch};

use crate::net::NetworkState;
use conflict::Resolution;

/// Result of delivering one operation to the remote.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    /// The remote holds a newer record; its current version is returned
    /// for conflict resolution.
    Conflict { remote: serde_json::Value },
}

/// Remote endpoint that queued operations are delivered to.
#[async_trait]
pub trait RemoteApply: Send + Sync {
    async fn apply(&self, op: &SyncOperation) -> Result<ApplyOutcome, ClassifiedError>;
}

/// How a sync pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The pass ran to the end of the queue.
    Completed,
    /// Another pass was already in flight; nothing was done.
    AlreadyRunning,
    /// The device was offline at the start of the pass, or the pass was
    /// interrupted by going offline or being cancelled.
    Offline,
    /// The queue could not be read at all.
    Failed,
}

/// Summary of one sync pass.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub synced: u64,
    pub failed: u64,
    pub conflicts_resolved: u64,
    pub errors: Vec<ClassifiedError>,
}

impl SyncReport {
    fn empty(status: SyncStatus) -> Self {
        Self { status, synced: 0, failed: 0, conflicts_resolved: 0, errors: Vec::new() }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Completed && self.failed == 0
    }
}

/// Owns the durable queue and replays it when asked.
pub struct SyncManager {
    store: Arc<dyn OfflineStore>,
    remote: Arc<dyn RemoteApply>,
    logger: Arc<ErrorLogger>,
    state_rx: watch::Receiver<NetworkState>,
    max_retries: u32,
    running: AtomicBool,
    cancelled: AtomicBool,
    pending_tx: watch::Sender<u64>,
    report_tx: broadcast::Sender<SyncReport>,
}

fn is_retryable(error: &ClassifiedError) -> bool {
    error.is_retryable()
        && matches!(error.category, ErrorCategory::Network | ErrorCategory::RemoteService)
}

impl SyncManager {
    pub fn new(
        store: Arc<dyn OfflineStore>,
        remote: Arc<dyn RemoteApply>,
        logger: Arc<ErrorLogger>,
        state_rx: watch::Receiver<NetworkState>,
        max_retries: u32,
    ) -> Arc<Self> {
        let (pending_tx, _) = watch::channel(0);
        let (report_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            store,
            remote,
            logger,
            state_rx,
            max_retries,
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            pending_tx,
            report_tx,
        })
    }

    /// Queue a mutation for later delivery. The queue is durable; the
    /// record survives restarts until it syncs or exhausts its retries.
    pub async fn enqueue(
        &self,
        op: SyncOperation,
        priority: Priority,
        conflict: ConflictStrategy,
    ) -> Result<QueueRecord, ClassifiedError> {
        let record = QueueRecord::new(op, priority, conflict, self.max_retries);
        self.store.enqueue(&record).await.map_err(ClassifiedError::from)?;
        self.refresh_pending().await;
        tracing::debug!(id = %record.id, kind = record.operation.kind().as_str(), "queued operation");
        Ok(record)
    }

    pub async fn pending_count(&self) -> Result<u64, ClassifiedError> {
        self.store.queue_len().await.map_err(ClassifiedError::from)
    }

    /// Watch channel mirroring the queue length.
    pub fn pending_watch(&self) -> watch::Receiver<u64> {
        self.pending_tx.subscribe()
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<SyncReport> {
        self.report_tx.subscribe()
    }

    /// Request that an in-flight pass stop after its current item.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn offline(&self) -> bool {
        self.state_rx.borrow().is_offline()
    }

    async fn refresh_pending(&self) {
        if let Ok(n) = self.store.queue_len().await {
            let _ = self.pending_tx.send(n);
        }
    }

    /// Run one sync pass over the whole queue.
    ///
    /// Returns immediately with a distinct status when offline or when a
    /// pass is already running. The report is also broadcast to observers.
    pub async fn sync_now(&self) -> SyncReport {
        if self.offline() {
            let report = SyncReport::empty(SyncStatus::Offline);
            let _ = self.report_tx.send(report.clone());
            return report;
        }
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            tracing::debug!("sync already in flight, skipping");
            return SyncReport::empty(SyncStatus::AlreadyRunning);
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let report = self.run_pass().await;
        self.running.store(false, Ordering::SeqCst);
        self.refresh_pending().await;
        let _ = self.report_tx.send(report.clone());
        report
    }

    async fn run_pass(&self) -> SyncReport {
        let items = match self.store.pending_operations().await {
            Ok(items) => items,
            Err(e) => {
                let classified = ClassifiedError::from(e);
                self.logger.log(&classified, "sync.load_queue").await;
                let mut report = SyncReport::empty(SyncStatus::Failed);
                report.errors.push(classified);
                return report;
            }
        };

        let mut report = SyncReport::empty(SyncStatus::Completed);
        tracing::info!(pending = items.len(), "starting sync pass");

        for item in items {
            if self.cancelled.load(Ordering::SeqCst) || self.offline() {
                tracing::info!("sync pass interrupted");
                report.status = SyncStatus::Offline;
                break;
            }
            self.deliver(&item, &mut report).await;
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            conflicts = report.conflicts_resolved,
            "sync pass finished"
        );
        report
    }

    async fn deliver(&self, item: &QueueRecord, report: &mut SyncReport) {
        match self.remote.apply(&item.operation).await {
            Ok(ApplyOutcome::Applied) => {
                self.remove_item(&item.id, report).await;
                report.synced += 1;
            }
            Ok(ApplyOutcome::Conflict { remote }) => {
                self.resolve_and_reapply(item, &remote, report).await;
            }
            Err(e) => self.record_failure(item, e, report).await,
        }
    }

    async fn resolve_and_reapply(&self, item: &QueueRecord, remote: &serde_json::Value, report: &mut SyncReport) {
        let resolution = match conflict::resolve(&item.operation, remote, item.conflict) {
            Ok(r) => r,
            Err(e) => {
                let classified = ClassifiedError::sync_conflict(format!("resolution produced invalid payload: {e}"));
                self.logger.log(&classified, "sync.resolve").await;
                self.remove_item(&item.id, report).await;
                report.failed += 1;
                report.errors.push(classified);
                return;
            }
        };

        match resolution {
            Resolution::AcceptRemote => {
                tracing::debug!(id = %item.id, "conflict resolved in favor of remote");
                self.remove_item(&item.id, report).await;
                report.conflicts_resolved += 1;
            }
            Resolution::Reapply(op) => match self.remote.apply(&op).await {
                Ok(ApplyOutcome::Applied) => {
                    self.remove_item(&item.id, report).await;
                    report.synced += 1;
                    report.conflicts_resolved += 1;
                }
                // A second conflict on the resolved payload is not retried
                // further within the pass.
                Ok(ApplyOutcome::Conflict { .. }) => {
                    let classified =
                        ClassifiedError::sync_conflict(format!("operation {} conflicted after resolution", item.id));
                    self.logger.log(&classified, "sync.resolve").await;
                    self.record_failure(item, classified, report).await;
                }
                Err(e) => self.record_failure(item, e, report).await,
            },
        }
    }

    async fn record_failure(&self, item: &QueueRecord, error: ClassifiedError, report: &mut SyncReport) {
        report.failed += 1;

        if is_retryable(&error) {
            match self.store.bump_retry(&item.id).await {
                Ok(count) if count >= item.max_retries => {
                    let classified = ClassifiedError::retries_exhausted(format!(
                        "operation {} dropped after {count} attempts: {}",
                        item.id, error.technical_message
                    ));
                    self.logger.log(&classified, "sync.deliver").await;
                    self.remove_item(&item.id, report).await;
                    report.errors.push(classified);
                }
                Ok(count) => {
                    tracing::debug!(id = %item.id, attempt = count, "delivery failed, will retry");
                    report.errors.push(error);
                }
                Err(e) => {
                    let classified = ClassifiedError::from(e);
                    self.logger.log(&classified, "sync.deliver").await;
                    report.errors.push(classified);
                }
            }
        } else {
            self.logger.log(&error, "sync.deliver").await;
            self.remove_item(&item.id, report).await;
            report.errors.push(error);
        }
    }

    async fn remove_item(&self, id: &str, report: &mut SyncReport) {
        if let Err(e) = self.store.remove_operation(id).await {
            let classified = ClassifiedError::from(e);
            self.logger.log(&classified, "sync.dequeue").await;
            report.errors.push(classified);
        }
    }
}
