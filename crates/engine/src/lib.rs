//! Offline-first content engine.
//!
//! Composition root over the persistent store, cache manager, sync
//! manager, and network monitor. The host platform supplies the outward
//! seams: a content fetcher, an asset fetcher, a remote sync endpoint,
//! and a stream of connectivity hints. Everything else is wired here,
//! with no global state; each [`OfflineEngine`] owns its components.

pub mod cache;
pub mod net;
pub mod recovery;
pub mod sync;

use std::sync::Arc;

use corpus_core::config::EngineConfig;
use corpus_core::operation::{ConflictStrategy, Priority, QueueRecord, SyncOperation};
use corpus_core::store::{
    AssetKind, AssetRecord, ContentKind, ContentRecord, MemoryStore, OfflineStore, StoreDb, UserDataRecord,
};
use corpus_core::taxonomy::{ClassifiedError, ErrorLogger, RecoveryAction};

use cache::CacheManager;
use net::NetworkMonitor;
use recovery::RecoveryRunner;
use sync::SyncManager;

pub use cache::{AssetFetcher, AssetSource, ContentFetcher, FetchedAsset};
pub use net::{ConnectivitySignal, LinkHint, NetworkState, NetworkStatus};
pub use recovery::RecoveryOutcome;
pub use sync::{ApplyOutcome, RemoteApply, SyncReport, SyncStatus};

/// The assembled engine. Construct one per store; drop after [`close`].
///
/// [`close`]: OfflineEngine::close
pub struct OfflineEngine {
    config: Arc<EngineConfig>,
    store: Arc<dyn OfflineStore>,
    degraded: bool,
    logger: Arc<ErrorLogger>,
    cache: CacheManager,
    sync: Arc<SyncManager>,
    monitor: NetworkMonitor,
    recovery: RecoveryRunner,
}

impl OfflineEngine {
    /// Open the configured SQLite store and assemble the engine.
    ///
    /// A store that cannot be opened does not fail initialization: the
    /// engine falls back to a memory-only store and flags the session as
    /// degraded, so the app keeps working without persistence.
    pub async fn init(
        config: EngineConfig,
        content_fetcher: Arc<dyn ContentFetcher>,
        asset_fetcher: Arc<dyn AssetFetcher>,
        remote: Arc<dyn RemoteApply>,
        signal: ConnectivitySignal,
    ) -> Self {
        let (store, degraded): (Arc<dyn OfflineStore>, bool) = match StoreDb::open(&config.db_path).await {
            Ok(db) => (Arc::new(db), false),
            Err(e) => {
                tracing::error!("failed to open offline store, continuing without persistence: {e}");
                (Arc::new(MemoryStore::new()), true)
            }
        };
        Self::init_with_store(config, store, degraded, content_fetcher, asset_fetcher, remote, signal).await
    }

    /// Assemble the engine over an already-open store.
    #[allow(clippy::too_many_arguments)]
    pub async fn init_with_store(
        config: EngineConfig,
        store: Arc<dyn OfflineStore>,
        degraded: bool,
        content_fetcher: Arc<dyn ContentFetcher>,
        asset_fetcher: Arc<dyn AssetFetcher>,
        remote: Arc<dyn RemoteApply>,
        signal: ConnectivitySignal,
    ) -> Self {
        let config = Arc::new(config);
        let logger = Arc::new(ErrorLogger::new(store.clone(), config.error_log_max));
        let monitor = NetworkMonitor::new(&signal.initial, config.slow_rtt_ms, config.slow_downlink_kbps);
        let sync = SyncManager::new(store.clone(), remote, logger.clone(), monitor.subscribe(), config.max_retries);
        let cache = CacheManager::new(
            store.clone(),
            content_fetcher,
            asset_fetcher,
            config.clone(),
            logger.clone(),
            monitor.subscribe(),
        );
        let recovery = RecoveryRunner::new(store.clone(), logger.clone(), config.preserve_keys.clone());

        monitor.start(signal.hints, sync.clone(), config.sync_debounce());

        if degraded {
            let err = ClassifiedError::store_unavailable("offline store could not be opened");
            logger.log(&err, "engine.init").await;
        }

        tracing::info!(degraded, "offline engine initialized");
        Self { config, store, degraded, logger, cache, sync, monitor, recovery }
    }

    /// Whether this session is running without persistence.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // content

    pub async fn get_content(&self, kind: ContentKind, id: &str) -> Result<Option<ContentRecord>, ClassifiedError> {
        self.cache.get_content(kind, id).await
    }

    pub async fn store_content(
        &self,
        kind: ContentKind,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<ContentRecord, ClassifiedError> {
        self.cache.store_content(kind, id, payload).await
    }

    pub async fn remove_content(&self, kind: ContentKind, id: &str) -> Result<(), ClassifiedError> {
        self.cache.remove_content(kind, id).await
    }

    pub async fn clear_expired(&self) -> Result<u64, ClassifiedError> {
        self.cache.clear_expired().await
    }

    pub async fn prefetch_content(&self, requests: &[(ContentKind, String)]) -> u64 {
        self.cache.prefetch_content(requests).await
    }

    // assets

    pub async fn resolve_asset(&self, url: &str, kind: AssetKind) -> Result<AssetSource, ClassifiedError> {
        self.cache.resolve_asset(url, kind).await
    }

    pub async fn cache_asset(&self, url: &str, kind: AssetKind) -> Result<AssetRecord, ClassifiedError> {
        self.cache.cache_asset(url, kind).await
    }

    pub async fn get_asset(&self, url: &str) -> Result<Option<AssetRecord>, ClassifiedError> {
        self.cache.get_asset(url).await
    }

    pub async fn prefetch_assets(&self, requests: &[(String, AssetKind)]) -> u64 {
        self.cache.prefetch_assets(requests).await
    }

    pub async fn asset_bytes_used(&self) -> Result<u64, ClassifiedError> {
        self.cache.asset_bytes_used().await
    }

    // user data

    pub async fn put_user_data(
        &self,
        key: &str,
        value: &serde_json::Value,
        needs_sync: bool,
    ) -> Result<(), ClassifiedError> {
        self.store.put_user_data(key, value, needs_sync).await.map_err(ClassifiedError::from)
    }

    pub async fn get_user_data(&self, key: &str) -> Result<Option<UserDataRecord>, ClassifiedError> {
        self.store.get_user_data(key).await.map_err(ClassifiedError::from)
    }

    // sync

    /// Queue a local mutation for delivery once online.
    ///
    /// If the device is already online, a sync pass is kicked off in the
    /// background; the single-flight guard absorbs the call when a pass is
    /// already running.
    pub async fn queue_change(
        &self,
        op: SyncOperation,
        priority: Priority,
        conflict: ConflictStrategy,
    ) -> Result<QueueRecord, ClassifiedError> {
        let record = self.sync.enqueue(op, priority, conflict).await?;
        if !self.monitor.current().is_offline() {
            let sync = self.sync.clone();
            tokio::spawn(async move {
                sync.sync_now().await;
            });
        }
        Ok(record)
    }

    /// Run a sync pass now, regardless of the debounce timer.
    pub async fn sync_now(&self) -> SyncReport {
        self.sync.sync_now().await
    }

    pub async fn pending_changes(&self) -> Result<u64, ClassifiedError> {
        self.sync.pending_count().await
    }

    pub fn subscribe_sync_reports(&self) -> tokio::sync::broadcast::Receiver<SyncReport> {
        self.sync.subscribe_reports()
    }

    // network

    pub fn network_state(&self) -> NetworkState {
        self.monitor.current()
    }

    pub fn subscribe_network(&self) -> tokio::sync::watch::Receiver<NetworkState> {
        self.monitor.subscribe()
    }

    // errors and recovery

    /// Classify a bare failure message into the taxonomy.
    pub fn classify(&self, message: &str) -> ClassifiedError {
        corpus_core::taxonomy::classify(message)
    }

    /// Record an error against this session's log.
    pub async fn log_error(&self, error: &ClassifiedError, context: &str) -> corpus_core::store::ErrorLogRecord {
        self.logger.log(error, context).await
    }

    pub async fn recent_errors(&self, limit: u32) -> Vec<corpus_core::store::ErrorLogRecord> {
        self.logger.recent(limit).await
    }

    pub async fn recover(&self, action: RecoveryAction) -> RecoveryOutcome {
        self.recovery.run(action).await
    }

    /// Stop the monitor loop. Queued mutations stay in the store for the
    /// next session.
    pub fn close(&self) {
        self.monitor.stop();
        tracing::info!("offline engine closed");
    }
}
