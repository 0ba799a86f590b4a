//! Content cache manager.
//!
//! Mediates every content read through a per-kind strategy that decides
//! how the persistent cache and the network combine. Strategies degrade
//! toward the cache when the device is offline; a stale entry beats no
//! entry for every strategy except network-only.

pub mod assets;
pub mod policy;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use corpus_core::config::{CacheStrategy, EngineConfig};
use corpus_core::store::{ContentKind, ContentRecord, OfflineStore};
use corpus_core::taxonomy::{ClassifiedError, ErrorLogger};
use tokio::sync::watch;

use crate::net::NetworkState;

pub use assets::{AssetFetcher, AssetSource, FetchedAsset};

/// Fetches content payloads from the remote content service.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, kind: ContentKind, id: &str) -> Result<serde_json::Value, ClassifiedError>;
}

/// Strategy-driven front door for cached content and assets.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn OfflineStore>,
    content_fetcher: Arc<dyn ContentFetcher>,
    asset_fetcher: Arc<dyn AssetFetcher>,
    config: Arc<EngineConfig>,
    logger: Arc<ErrorLogger>,
    state_rx: watch::Receiver<NetworkState>,
    // Keys with a fetch already in flight, to collapse duplicate
    // revalidations and prefetches.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl CacheManager {
    pub fn new(
        store: Arc<dyn OfflineStore>,
        content_fetcher: Arc<dyn ContentFetcher>,
        asset_fetcher: Arc<dyn AssetFetcher>,
        config: Arc<EngineConfig>,
        logger: Arc<ErrorLogger>,
        state_rx: watch::Receiver<NetworkState>,
    ) -> Self {
        Self {
            store,
            content_fetcher,
            asset_fetcher,
            config,
            logger,
            state_rx,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn offline(&self) -> bool {
        self.state_rx.borrow().is_offline()
    }

    /// Read a content entry through its kind's configured strategy.
    ///
    /// `Ok(None)` means a genuine miss that the strategy could not fill:
    /// nothing cached and either the strategy never fetches or the device
    /// is offline. Network-first and network-only treat the network as the
    /// primary source, so for them an unreachable network surfaces as an
    /// error instead. A store that cannot be read counts as a miss; the
    /// strategy still gets its shot at the network.
    pub async fn get_content(&self, kind: ContentKind, id: &str) -> Result<Option<ContentRecord>, ClassifiedError> {
        let cached = match self.store.get_content(kind, id).await {
            Ok(cached) => cached,
            Err(e) => {
                self.logger.log(&ClassifiedError::from(e), "cache.get_content").await;
                None
            }
        };
        match self.config.strategy_for(kind) {
            CacheStrategy::CacheOnly => self.serve_cached(cached).await,
            CacheStrategy::CacheFirst => self.cache_first(kind, id, cached).await,
            CacheStrategy::NetworkFirst => self.network_first(kind, id, cached).await,
            CacheStrategy::StaleWhileRevalidate => self.stale_while_revalidate(kind, id, cached).await,
            CacheStrategy::NetworkOnly => {
                if self.offline() {
                    return Err(ClassifiedError::offline());
                }
                self.fetch_and_store(kind, id).await.map(Some)
            }
        }
    }

    async fn serve_cached(&self, cached: Option<ContentRecord>) -> Result<Option<ContentRecord>, ClassifiedError> {
        if let Some(rec) = cached {
            self.touch(&rec).await;
            Ok(Some(rec))
        } else {
            Ok(None)
        }
    }

    async fn cache_first(
        &self,
        kind: ContentKind,
        id: &str,
        cached: Option<ContentRecord>,
    ) -> Result<Option<ContentRecord>, ClassifiedError> {
        let now = Utc::now().to_rfc3339();
        if let Some(rec) = &cached
            && !rec.is_expired(&now)
        {
            self.touch(rec).await;
            return Ok(Some(rec.clone()));
        }

        if self.offline() {
            // Stale beats nothing while offline.
            return self.serve_cached(cached).await;
        }

        match self.fetch_and_store(kind, id).await {
            Ok(rec) => Ok(Some(rec)),
            Err(e) if cached.is_some() => {
                self.logger.log(&e, "cache.cache_first").await;
                self.serve_cached(cached).await
            }
            Err(e) => Err(e),
        }
    }

    async fn network_first(
        &self,
        kind: ContentKind,
        id: &str,
        cached: Option<ContentRecord>,
    ) -> Result<Option<ContentRecord>, ClassifiedError> {
        let fetch_error = if self.offline() {
            ClassifiedError::offline()
        } else {
            match self.fetch_and_store(kind, id).await {
                Ok(rec) => return Ok(Some(rec)),
                Err(e) => e,
            }
        };

        if cached.is_some() {
            self.logger.log(&fetch_error, "cache.network_first").await;
            self.serve_cached(cached).await
        } else {
            Err(fetch_error)
        }
    }

    async fn stale_while_revalidate(
        &self,
        kind: ContentKind,
        id: &str,
        cached: Option<ContentRecord>,
    ) -> Result<Option<ContentRecord>, ClassifiedError> {
        let now = Utc::now().to_rfc3339();
        if let Some(rec) = cached {
            self.touch(&rec).await;
            if rec.is_expired(&now) && !self.offline() {
                self.spawn_revalidate(kind, id);
            }
            return Ok(Some(rec));
        }

        if self.offline() {
            return Ok(None);
        }
        self.fetch_and_store(kind, id).await.map(Some)
    }

    /// Kick off a background refresh for an expired entry. At most one
    /// refresh per key runs at a time.
    fn spawn_revalidate(&self, kind: ContentKind, id: &str) {
        let key = format!("content:{}:{}", kind.as_str(), id);
        {
            let mut in_flight = match self.in_flight.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            if !in_flight.insert(key.clone()) {
                return;
            }
        }

        let mgr = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = mgr.fetch_and_store(kind, &id).await {
                mgr.logger.log(&e, "cache.revalidate").await;
            }
            if let Ok(mut in_flight) = mgr.in_flight.lock() {
                in_flight.remove(&key);
            }
        });
    }

    /// Warm the cache for the given entries. Entries already fresh or
    /// already being fetched are skipped; individual failures are logged,
    /// not propagated. Returns the count fetched.
    pub async fn prefetch_content(&self, requests: &[(ContentKind, String)]) -> u64 {
        if self.offline() {
            tracing::debug!("offline, skipping content prefetch");
            return 0;
        }

        let now = Utc::now().to_rfc3339();
        let mut fetched = 0u64;
        for (kind, id) in requests {
            match self.store.get_content(*kind, id).await {
                Ok(Some(rec)) if !rec.is_expired(&now) => continue,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("content lookup failed during prefetch: {e}");
                    continue;
                }
            }

            let key = format!("content:{}:{}", kind.as_str(), id);
            {
                let mut in_flight = match self.in_flight.lock() {
                    Ok(guard) => guard,
                    Err(_) => return fetched,
                };
                if !in_flight.insert(key.clone()) {
                    continue;
                }
            }

            let outcome = self.fetch_and_store(*kind, id).await;
            if let Ok(mut in_flight) = self.in_flight.lock() {
                in_flight.remove(&key);
            }
            match outcome {
                Ok(_) => fetched += 1,
                Err(e) => {
                    self.logger.log(&e, "cache.prefetch_content").await;
                }
            }
        }
        fetched
    }

    async fn fetch_and_store(&self, kind: ContentKind, id: &str) -> Result<ContentRecord, ClassifiedError> {
        let payload = self.content_fetcher.fetch(kind, id).await?;
        self.store_content(kind, id, payload).await
    }

    /// Write a payload into the cache under the kind's TTL, bumping the
    /// entry version if one already exists.
    ///
    /// A store that refuses the write does not cost the caller the
    /// payload: the failure is logged and the built record is returned
    /// anyway, it just is not persisted.
    pub async fn store_content(
        &self,
        kind: ContentKind,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<ContentRecord, ClassifiedError> {
        let prev_version = match self.store.get_content(kind, id).await {
            Ok(prev) => prev.map(|rec| rec.version),
            Err(e) => {
                self.logger.log(&ClassifiedError::from(e), "cache.store_content").await;
                None
            }
        };
        let record = policy::build_record(kind, id, payload, self.config.ttl_for(kind), prev_version);
        match self.store.put_content(&record).await {
            Ok(()) => {
                tracing::debug!(kind = kind.as_str(), id, version = record.version, "cached content");
            }
            Err(e) => {
                self.logger.log(&ClassifiedError::from(e), "cache.store_content").await;
            }
        }
        Ok(record)
    }

    pub async fn remove_content(&self, kind: ContentKind, id: &str) -> Result<(), ClassifiedError> {
        self.store.delete_content(kind, id).await.map_err(ClassifiedError::from)
    }

    /// Drop every expired content entry. Returns the count purged.
    pub async fn clear_expired(&self) -> Result<u64, ClassifiedError> {
        let now = Utc::now().to_rfc3339();
        let purged = self.store.purge_expired_content(&now).await.map_err(ClassifiedError::from)?;
        if purged > 0 {
            tracing::info!(purged, "purged expired content");
        }
        Ok(purged)
    }

    async fn touch(&self, rec: &ContentRecord) {
        let now = Utc::now().to_rfc3339();
        if let Err(e) = self.store.touch_content(rec.kind, &rec.id, &now).await {
            tracing::warn!("failed to record content access: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{LinkHint, NetworkMonitor};
    use super::assets::tests::NoAssets;
    use corpus_core::config::{ContentPolicies, KindPolicy};
    use corpus_core::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    pub(crate) struct CountingFetcher {
        calls: AtomicU32,
        fail: bool,
    }

    impl CountingFetcher {
        pub(crate) fn ok() -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), fail: true })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentFetcher for CountingFetcher {
        async fn fetch(&self, _kind: ContentKind, id: &str) -> Result<serde_json::Value, ClassifiedError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(ClassifiedError::timeout("scripted failure"));
            }
            Ok(json!({"id": id, "fetch": n}))
        }
    }

    fn policies(strategy: CacheStrategy, ttl_secs: Option<u64>) -> ContentPolicies {
        let policy = KindPolicy { strategy, ttl_secs };
        ContentPolicies {
            encyclopedia: policy,
            symptom: policy,
            medication: policy,
            region: policy,
            quiz: policy,
            glossary: policy,
        }
    }

    pub(crate) fn harness(
        fetcher: Arc<dyn ContentFetcher>,
        content: ContentPolicies,
        connected: bool,
    ) -> (CacheManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(EngineConfig { content, ..Default::default() });
        let logger = Arc::new(ErrorLogger::new(store.clone(), 50));
        let monitor = NetworkMonitor::new(&LinkHint { connected, ..Default::default() }, 2_000, 500);
        let cache =
            CacheManager::new(store.clone(), fetcher, Arc::new(NoAssets), config, logger, monitor.subscribe());
        (cache, store)
    }

    async fn seed_expired(store: &MemoryStore, kind: ContentKind, id: &str) {
        let mut rec = policy::build_record(kind, id, json!({"stale": true}), None, None);
        rec.expires_at = Some((Utc::now() - chrono::Duration::seconds(60)).to_rfc3339());
        store.put_content(&rec).await.unwrap();
    }

    /// Memory store whose content collection can be made to fail, for the
    /// degraded read/write paths. Everything else delegates.
    struct BrokenContentStore {
        inner: MemoryStore,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl BrokenContentStore {
        fn broken(&self) -> corpus_core::error::Error {
            corpus_core::error::Error::Corrupted("simulated content failure".into())
        }
    }

    #[async_trait]
    impl corpus_core::store::OfflineStore for BrokenContentStore {
        async fn put_content(&self, record: &ContentRecord) -> Result<(), corpus_core::error::Error> {
            if self.fail_writes {
                return Err(self.broken());
            }
            self.inner.put_content(record).await
        }
        async fn get_content(
            &self,
            kind: ContentKind,
            id: &str,
        ) -> Result<Option<ContentRecord>, corpus_core::error::Error> {
            if self.fail_reads {
                return Err(self.broken());
            }
            self.inner.get_content(kind, id).await
        }
        async fn touch_content(&self, kind: ContentKind, id: &str, now: &str) -> Result<(), corpus_core::error::Error> {
            self.inner.touch_content(kind, id, now).await
        }
        async fn content_by_kind(&self, kind: ContentKind) -> Result<Vec<ContentRecord>, corpus_core::error::Error> {
            self.inner.content_by_kind(kind).await
        }
        async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), corpus_core::error::Error> {
            self.inner.delete_content(kind, id).await
        }
        async fn purge_expired_content(&self, now: &str) -> Result<u64, corpus_core::error::Error> {
            self.inner.purge_expired_content(now).await
        }
        async fn clear_content(&self) -> Result<(), corpus_core::error::Error> {
            self.inner.clear_content().await
        }
        async fn count_content(&self) -> Result<u64, corpus_core::error::Error> {
            self.inner.count_content().await
        }
        async fn put_asset(&self, record: &corpus_core::store::AssetRecord) -> Result<(), corpus_core::error::Error> {
            self.inner.put_asset(record).await
        }
        async fn get_asset(
            &self,
            url: &str,
        ) -> Result<Option<corpus_core::store::AssetRecord>, corpus_core::error::Error> {
            self.inner.get_asset(url).await
        }
        async fn has_asset(&self, url: &str) -> Result<bool, corpus_core::error::Error> {
            self.inner.has_asset(url).await
        }
        async fn touch_asset(&self, url: &str, now: &str) -> Result<(), corpus_core::error::Error> {
            self.inner.touch_asset(url, now).await
        }
        async fn delete_asset(&self, url: &str) -> Result<(), corpus_core::error::Error> {
            self.inner.delete_asset(url).await
        }
        async fn total_asset_bytes(&self) -> Result<u64, corpus_core::error::Error> {
            self.inner.total_asset_bytes().await
        }
        async fn evict_assets_over(&self, max_bytes: u64) -> Result<u64, corpus_core::error::Error> {
            self.inner.evict_assets_over(max_bytes).await
        }
        async fn clear_assets(&self) -> Result<(), corpus_core::error::Error> {
            self.inner.clear_assets().await
        }
        async fn count_assets(&self) -> Result<u64, corpus_core::error::Error> {
            self.inner.count_assets().await
        }
        async fn enqueue(&self, record: &corpus_core::operation::QueueRecord) -> Result<(), corpus_core::error::Error> {
            self.inner.enqueue(record).await
        }
        async fn pending_operations(
            &self,
        ) -> Result<Vec<corpus_core::operation::QueueRecord>, corpus_core::error::Error> {
            self.inner.pending_operations().await
        }
        async fn remove_operation(&self, id: &str) -> Result<(), corpus_core::error::Error> {
            self.inner.remove_operation(id).await
        }
        async fn bump_retry(&self, id: &str) -> Result<u32, corpus_core::error::Error> {
            self.inner.bump_retry(id).await
        }
        async fn queue_len(&self) -> Result<u64, corpus_core::error::Error> {
            self.inner.queue_len().await
        }
        async fn clear_queue(&self) -> Result<(), corpus_core::error::Error> {
            self.inner.clear_queue().await
        }
        async fn put_user_data(
            &self,
            key: &str,
            value: &serde_json::Value,
            needs_sync: bool,
        ) -> Result<(), corpus_core::error::Error> {
            self.inner.put_user_data(key, value, needs_sync).await
        }
        async fn get_user_data(
            &self,
            key: &str,
        ) -> Result<Option<corpus_core::store::UserDataRecord>, corpus_core::error::Error> {
            self.inner.get_user_data(key).await
        }
        async fn user_data_needing_sync(
            &self,
        ) -> Result<Vec<corpus_core::store::UserDataRecord>, corpus_core::error::Error> {
            self.inner.user_data_needing_sync().await
        }
        async fn clear_user_data_except(&self, keep: &[String]) -> Result<u64, corpus_core::error::Error> {
            self.inner.clear_user_data_except(keep).await
        }
        async fn append_log(
            &self,
            record: &corpus_core::store::ErrorLogRecord,
        ) -> Result<corpus_core::store::ErrorLogRecord, corpus_core::error::Error> {
            self.inner.append_log(record).await
        }
        async fn recent_logs(
            &self,
            limit: u32,
        ) -> Result<Vec<corpus_core::store::ErrorLogRecord>, corpus_core::error::Error> {
            self.inner.recent_logs(limit).await
        }
        async fn trim_logs(&self, max_entries: u64) -> Result<u64, corpus_core::error::Error> {
            self.inner.trim_logs(max_entries).await
        }
    }

    fn broken_harness(fail_reads: bool, fail_writes: bool) -> (CacheManager, Arc<CountingFetcher>) {
        let fetcher = CountingFetcher::ok();
        let store = Arc::new(BrokenContentStore { inner: MemoryStore::new(), fail_reads, fail_writes });
        let config = Arc::new(EngineConfig {
            content: policies(CacheStrategy::CacheFirst, Some(3600)),
            ..Default::default()
        });
        let logger = Arc::new(ErrorLogger::new(store.clone(), 50));
        let monitor = NetworkMonitor::new(&LinkHint { connected: true, ..Default::default() }, 2_000, 500);
        let cache =
            CacheManager::new(store, fetcher.clone(), Arc::new(NoAssets), config, logger, monitor.subscribe());
        (cache, fetcher)
    }

    #[tokio::test]
    async fn test_cache_first_fresh_hit_skips_network() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) =
            harness(fetcher.clone(), policies(CacheStrategy::CacheFirst, Some(3600)), true);

        cache.store_content(ContentKind::Encyclopedia, "heart", json!({"v": 1})).await.unwrap();
        let rec = cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(rec.payload, json!({"v": 1}));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let fetcher = CountingFetcher::ok();
        let (cache, store) =
            harness(fetcher.clone(), policies(CacheStrategy::CacheFirst, Some(3600)), true);

        let rec = cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(rec.version, 1);
        assert!(store.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cache_first_expired_refetches_fresh_payload() {
        let fetcher = CountingFetcher::ok();
        let (cache, store) =
            harness(fetcher.clone(), policies(CacheStrategy::CacheFirst, Some(3600)), true);
        seed_expired(&store, ContentKind::Encyclopedia, "heart").await;

        let rec = cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(rec.payload["fetch"], 1, "expired entry is replaced, not served");
        assert_eq!(fetcher.calls(), 1);
        let stored = store.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(stored.payload["fetch"], 1);
    }

    #[tokio::test]
    async fn test_store_read_failure_falls_through_to_fetch() {
        let (cache, fetcher) = broken_harness(true, false);

        let rec = cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(rec.payload["fetch"], 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_store_write_failure_still_returns_fetched_payload() {
        let (cache, fetcher) = broken_harness(false, true);

        let rec = cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(rec.payload["fetch"], 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_expired_with_fetch_failure_serves_stale() {
        let fetcher = CountingFetcher::failing();
        let (cache, store) =
            harness(fetcher.clone(), policies(CacheStrategy::CacheFirst, Some(3600)), true);
        seed_expired(&store, ContentKind::Encyclopedia, "heart").await;

        let rec = cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(rec.payload, json!({"stale": true}));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_offline_serves_stale_without_fetching() {
        let fetcher = CountingFetcher::ok();
        let (cache, store) =
            harness(fetcher.clone(), policies(CacheStrategy::CacheFirst, Some(3600)), false);
        seed_expired(&store, ContentKind::Encyclopedia, "heart").await;

        let rec = cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(rec.payload, json!({"stale": true}));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_network_first_prefers_network() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) = harness(fetcher.clone(), policies(CacheStrategy::NetworkFirst, Some(3600)), true);

        cache.store_content(ContentKind::Quiz, "q1", json!({"old": true})).await.unwrap();
        let rec = cache.get_content(ContentKind::Quiz, "q1").await.unwrap().unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(rec.payload["fetch"], 1);
        assert_eq!(rec.version, 2, "refresh bumps the stored version");
    }

    #[tokio::test]
    async fn test_network_first_offline_falls_back_to_cache() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) = harness(fetcher.clone(), policies(CacheStrategy::NetworkFirst, Some(3600)), false);

        cache.store_content(ContentKind::Quiz, "q1", json!({"old": true})).await.unwrap();
        let rec = cache.get_content(ContentKind::Quiz, "q1").await.unwrap().unwrap();
        assert_eq!(rec.payload, json!({"old": true}));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_network_first_offline_miss_is_an_error() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) = harness(fetcher, policies(CacheStrategy::NetworkFirst, Some(3600)), false);

        let err = cache.get_content(ContentKind::Quiz, "q1").await.unwrap_err();
        assert_eq!(err.code, corpus_core::taxonomy::ErrorCode::Offline);
    }

    #[tokio::test]
    async fn test_swr_serves_stale_then_refreshes_in_background() {
        let fetcher = CountingFetcher::ok();
        let (cache, store) =
            harness(fetcher.clone(), policies(CacheStrategy::StaleWhileRevalidate, Some(3600)), true);
        seed_expired(&store, ContentKind::Symptom, "headache").await;

        let rec = cache.get_content(ContentKind::Symptom, "headache").await.unwrap().unwrap();
        assert_eq!(rec.payload, json!({"stale": true}), "stale copy served immediately");

        // Give the background revalidation a moment to land.
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if fetcher.calls() > 0 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        let refreshed = store.get_content(ContentKind::Symptom, "headache").await.unwrap().unwrap();
        assert_eq!(refreshed.payload["fetch"], 1);
    }

    #[tokio::test]
    async fn test_swr_fresh_hit_does_not_refetch() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) =
            harness(fetcher.clone(), policies(CacheStrategy::StaleWhileRevalidate, Some(3600)), true);

        cache.store_content(ContentKind::Symptom, "headache", json!({"v": 1})).await.unwrap();
        cache.get_content(ContentKind::Symptom, "headache").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_only_never_fetches() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) = harness(fetcher.clone(), policies(CacheStrategy::CacheOnly, None), true);

        assert!(cache.get_content(ContentKind::Glossary, "term").await.unwrap().is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_network_only_offline_errors() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) = harness(fetcher.clone(), policies(CacheStrategy::NetworkOnly, Some(60)), false);

        let err = cache.get_content(ContentKind::Quiz, "q1").await.unwrap_err();
        assert_eq!(err.code, corpus_core::taxonomy::ErrorCode::Offline);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_content_skips_fresh_entries() {
        let fetcher = CountingFetcher::ok();
        let (cache, store) = harness(fetcher.clone(), policies(CacheStrategy::CacheFirst, Some(3600)), true);

        cache.store_content(ContentKind::Encyclopedia, "fresh", json!({})).await.unwrap();
        seed_expired(&store, ContentKind::Encyclopedia, "stale").await;

        let fetched = cache
            .prefetch_content(&[
                (ContentKind::Encyclopedia, "fresh".to_string()),
                (ContentKind::Encyclopedia, "stale".to_string()),
                (ContentKind::Encyclopedia, "missing".to_string()),
            ])
            .await;
        assert_eq!(fetched, 2, "expired and missing entries are fetched, fresh is skipped");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_prefetch_content_offline_is_a_noop() {
        let fetcher = CountingFetcher::ok();
        let (cache, _) = harness(fetcher.clone(), policies(CacheStrategy::CacheFirst, Some(3600)), false);
        let fetched = cache.prefetch_content(&[(ContentKind::Encyclopedia, "x".to_string())]).await;
        assert_eq!(fetched, 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_clear_expired_purges_only_stale_entries() {
        let fetcher = CountingFetcher::ok();
        let (cache, store) = harness(fetcher, policies(CacheStrategy::CacheFirst, Some(3600)), true);

        cache.store_content(ContentKind::Encyclopedia, "fresh", json!({})).await.unwrap();
        seed_expired(&store, ContentKind::Encyclopedia, "stale").await;

        assert_eq!(cache.clear_expired().await.unwrap(), 1);
        assert!(store.get_content(ContentKind::Encyclopedia, "fresh").await.unwrap().is_some());
        assert!(store.get_content(ContentKind::Encyclopedia, "stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_access_tracking_on_hit() {
        let fetcher = CountingFetcher::ok();
        let (cache, store) = harness(fetcher, policies(CacheStrategy::CacheFirst, Some(3600)), true);

        cache.store_content(ContentKind::Encyclopedia, "heart", json!({})).await.unwrap();
        cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap();
        cache.get_content(ContentKind::Encyclopedia, "heart").await.unwrap();

        let rec = store.get_content(ContentKind::Encyclopedia, "heart").await.unwrap().unwrap();
        assert_eq!(rec.access_count, 2);
    }
}
