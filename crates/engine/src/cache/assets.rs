//! Binary asset caching.
//!
//! Assets are cached whole, keyed by their remote url, and surfaced to the
//! host through a stable `offline-asset://` uri derived from the url hash.
//! Writes keep the collection under the configured byte ceiling by evicting
//! least-recently-accessed entries.

use async_trait::async_trait;
use chrono::Utc;
use corpus_core::store::{AssetKind, AssetRecord};
use corpus_core::taxonomy::ClassifiedError;
use sha2::{Digest, Sha256};

use super::CacheManager;

/// Bytes and metadata returned by an asset fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Fetches binary assets from their remote urls.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, ClassifiedError>;
}

/// Where an asset request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Served from the cache under a stable local uri.
    Local(String),
    /// Not cached and caching failed; the caller should hit the remote
    /// url directly.
    Remote(String),
    /// Not cached and the device is offline.
    Unavailable,
}

/// Stable local uri for a cached asset.
pub fn local_asset_uri(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("offline-asset://{}", hex::encode(digest))
}

impl CacheManager {
    /// Resolve an asset url to its best available source, caching it on
    /// first online access.
    pub async fn resolve_asset(&self, url: &str, kind: AssetKind) -> Result<AssetSource, ClassifiedError> {
        if self.store.has_asset(url).await.map_err(ClassifiedError::from)? {
            let now = Utc::now().to_rfc3339();
            if let Err(e) = self.store.touch_asset(url, &now).await {
                tracing::warn!("failed to record asset access: {e}");
            }
            return Ok(AssetSource::Local(local_asset_uri(url)));
        }

        if self.offline() {
            return Ok(AssetSource::Unavailable);
        }

        match self.cache_asset(url, kind).await {
            Ok(_) => Ok(AssetSource::Local(local_asset_uri(url))),
            Err(e) => {
                self.logger.log(&e, "cache.resolve_asset").await;
                Ok(AssetSource::Remote(url.to_string()))
            }
        }
    }

    /// Load a cached asset's bytes. `Ok(None)` on a miss.
    pub async fn get_asset(&self, url: &str) -> Result<Option<AssetRecord>, ClassifiedError> {
        let record = self.store.get_asset(url).await.map_err(ClassifiedError::from)?;
        if record.is_some() {
            let now = Utc::now().to_rfc3339();
            if let Err(e) = self.store.touch_asset(url, &now).await {
                tracing::warn!("failed to record asset access: {e}");
            }
        }
        Ok(record)
    }

    /// Cache the given assets ahead of need. Already-cached urls and urls
    /// with a fetch already in flight are skipped; individual failures are
    /// logged, not propagated. Returns the count newly cached.
    pub async fn prefetch_assets(&self, requests: &[(String, AssetKind)]) -> u64 {
        if self.offline() {
            tracing::debug!("offline, skipping asset prefetch");
            return 0;
        }

        let mut cached = 0u64;
        for (url, kind) in requests {
            match self.store.has_asset(url).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("asset lookup failed during prefetch: {e}");
                    continue;
                }
            }

            let key = format!("asset:{url}");
            {
                let mut in_flight = match self.in_flight.lock() {
                    Ok(guard) => guard,
                    Err(_) => return cached,
                };
                if !in_flight.insert(key.clone()) {
                    continue;
                }
            }

            let outcome = self.cache_asset(url, *kind).await;
            if let Ok(mut in_flight) = self.in_flight.lock() {
                in_flight.remove(&key);
            }
            match outcome {
                Ok(_) => cached += 1,
                Err(e) => {
                    self.logger.log(&e, "cache.prefetch_assets").await;
                }
            }
        }
        cached
    }

    pub async fn asset_bytes_used(&self) -> Result<u64, ClassifiedError> {
        self.store.total_asset_bytes().await.map_err(ClassifiedError::from)
    }

    /// Fetch and store an asset, evicting older entries if the write
    /// pushes the collection over the byte ceiling.
    pub async fn cache_asset(&self, url: &str, kind: AssetKind) -> Result<AssetRecord, ClassifiedError> {
        let fetched = self.asset_fetcher.fetch(url).await?;
        let now = Utc::now().to_rfc3339();
        let record = AssetRecord {
            url: url.to_string(),
            kind,
            size: fetched.bytes.len() as i64,
            bytes: fetched.bytes,
            content_type: fetched.content_type,
            cached_at: now.clone(),
            last_accessed: now,
            etag: fetched.etag,
        };
        self.store.put_asset(&record).await.map_err(ClassifiedError::from)?;

        let evicted = self
            .store
            .evict_assets_over(self.config.asset_max_bytes)
            .await
            .map_err(ClassifiedError::from)?;
        if evicted > 0 {
            tracing::info!(evicted, url, "evicted assets to stay under byte ceiling");
        }
        tracing::debug!(url, size = record.size, "cached asset");
        Ok(record)
    }
}
