//! Engine configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CORPUS_*)
//! 2. TOML config file (if CORPUS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::store::ContentKind;

mod validation;

pub use validation::ConfigError;

/// How reads of a content kind combine the cache and the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Serve fresh cache; fetch only on miss or expiry.
    CacheFirst,
    /// Try the network first; fall back to any cached copy.
    NetworkFirst,
    /// Serve any cached copy immediately and refresh in the background.
    StaleWhileRevalidate,
    /// Never touch the network.
    CacheOnly,
    /// Never touch the cache for reads; successful fetches are still stored.
    NetworkOnly,
}

/// Caching policy for a single content kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindPolicy {
    pub strategy: CacheStrategy,
    /// None means entries of this kind never expire.
    pub ttl_secs: Option<u64>,
}

/// Per-kind cache policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPolicies {
    #[serde(default = "default_encyclopedia_policy")]
    pub encyclopedia: KindPolicy,
    #[serde(default = "default_symptom_policy")]
    pub symptom: KindPolicy,
    #[serde(default = "default_medication_policy")]
    pub medication: KindPolicy,
    #[serde(default = "default_region_policy")]
    pub region: KindPolicy,
    #[serde(default = "default_quiz_policy")]
    pub quiz: KindPolicy,
    #[serde(default = "default_glossary_policy")]
    pub glossary: KindPolicy,
}

fn default_encyclopedia_policy() -> KindPolicy {
    KindPolicy { strategy: CacheStrategy::CacheFirst, ttl_secs: Some(7 * 24 * 3600) }
}

fn default_symptom_policy() -> KindPolicy {
    KindPolicy { strategy: CacheStrategy::StaleWhileRevalidate, ttl_secs: Some(24 * 3600) }
}

fn default_medication_policy() -> KindPolicy {
    KindPolicy { strategy: CacheStrategy::StaleWhileRevalidate, ttl_secs: Some(24 * 3600) }
}

fn default_region_policy() -> KindPolicy {
    KindPolicy { strategy: CacheStrategy::CacheFirst, ttl_secs: Some(30 * 24 * 3600) }
}

fn default_quiz_policy() -> KindPolicy {
    KindPolicy { strategy: CacheStrategy::NetworkFirst, ttl_secs: Some(3600) }
}

fn default_glossary_policy() -> KindPolicy {
    KindPolicy { strategy: CacheStrategy::CacheOnly, ttl_secs: None }
}

impl Default for ContentPolicies {
    fn default() -> Self {
        Self {
            encyclopedia: default_encyclopedia_policy(),
            symptom: default_symptom_policy(),
            medication: default_medication_policy(),
            region: default_region_policy(),
            quiz: default_quiz_policy(),
            glossary: default_glossary_policy(),
        }
    }
}

impl ContentPolicies {
    pub fn for_kind(&self, kind: ContentKind) -> KindPolicy {
        match kind {
            ContentKind::Encyclopedia => self.encyclopedia,
            ContentKind::Symptom => self.symptom,
            ContentKind::Medication => self.medication,
            ContentKind::Region => self.region,
            ContentKind::Quiz => self.quiz,
            ContentKind::Glossary => self.glossary,
        }
    }
}

/// Engine configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CORPUS_*)
/// 2. TOML config file (if CORPUS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the SQLite store.
    ///
    /// Set via CORPUS_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Byte ceiling for the binary asset collection.
    ///
    /// Set via CORPUS_ASSET_MAX_BYTES environment variable.
    #[serde(default = "default_asset_max_bytes")]
    pub asset_max_bytes: u64,

    /// Maximum delivery attempts per queued sync operation.
    ///
    /// Set via CORPUS_MAX_RETRIES environment variable.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between regaining connectivity and starting a sync pass.
    ///
    /// Set via CORPUS_SYNC_DEBOUNCE_MS environment variable.
    #[serde(default = "default_sync_debounce_ms")]
    pub sync_debounce_ms: u64,

    /// Round-trip time at or above which a connection counts as slow.
    ///
    /// Set via CORPUS_SLOW_RTT_MS environment variable.
    #[serde(default = "default_slow_rtt_ms")]
    pub slow_rtt_ms: u64,

    /// Downlink below which a connection counts as slow.
    ///
    /// Set via CORPUS_SLOW_DOWNLINK_KBPS environment variable.
    #[serde(default = "default_slow_downlink_kbps")]
    pub slow_downlink_kbps: u64,

    /// Maximum retained error-log entries.
    ///
    /// Set via CORPUS_ERROR_LOG_MAX environment variable.
    #[serde(default = "default_error_log_max")]
    pub error_log_max: u64,

    /// User-data keys that survive a clear-cache recovery.
    ///
    /// Set via CORPUS_PRESERVE_KEYS environment variable (comma-separated).
    #[serde(default = "default_preserve_keys")]
    pub preserve_keys: Vec<String>,

    /// Per-kind cache strategy and TTL overrides.
    #[serde(default)]
    pub content: ContentPolicies,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./corpus-offline.sqlite")
}

fn default_asset_max_bytes() -> u64 {
    268_435_456 // 256MB
}

fn default_max_retries() -> u32 {
    3
}

fn default_sync_debounce_ms() -> u64 {
    1_500
}

fn default_slow_rtt_ms() -> u64 {
    2_000
}

fn default_slow_downlink_kbps() -> u64 {
    500
}

fn default_error_log_max() -> u64 {
    200
}

fn default_preserve_keys() -> Vec<String> {
    vec!["settings".into(), "progress".into()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            asset_max_bytes: default_asset_max_bytes(),
            max_retries: default_max_retries(),
            sync_debounce_ms: default_sync_debounce_ms(),
            slow_rtt_ms: default_slow_rtt_ms(),
            slow_downlink_kbps: default_slow_downlink_kbps(),
            error_log_max: default_error_log_max(),
            preserve_keys: default_preserve_keys(),
            content: ContentPolicies::default(),
        }
    }
}

impl EngineConfig {
    /// Sync debounce as Duration for use with tokio timers.
    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }

    pub fn strategy_for(&self, kind: ContentKind) -> CacheStrategy {
        self.content.for_kind(kind).strategy
    }

    /// TTL for a kind; None means entries never expire.
    pub fn ttl_for(&self, kind: ContentKind) -> Option<Duration> {
        self.content.for_kind(kind).ttl_secs.map(Duration::from_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CORPUS_`
    /// 2. TOML file from `CORPUS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CORPUS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CORPUS_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./corpus-offline.sqlite"));
        assert_eq!(config.asset_max_bytes, 268_435_456);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.sync_debounce_ms, 1_500);
        assert_eq!(config.error_log_max, 200);
        assert_eq!(config.preserve_keys, vec!["settings".to_string(), "progress".to_string()]);
    }

    #[test]
    fn test_default_kind_policies() {
        let config = EngineConfig::default();
        assert_eq!(config.strategy_for(ContentKind::Encyclopedia), CacheStrategy::CacheFirst);
        assert_eq!(config.ttl_for(ContentKind::Encyclopedia), Some(Duration::from_secs(7 * 24 * 3600)));
        assert_eq!(config.strategy_for(ContentKind::Symptom), CacheStrategy::StaleWhileRevalidate);
        assert_eq!(config.strategy_for(ContentKind::Quiz), CacheStrategy::NetworkFirst);
        assert_eq!(config.strategy_for(ContentKind::Glossary), CacheStrategy::CacheOnly);
        assert_eq!(config.ttl_for(ContentKind::Glossary), None);
    }

    #[test]
    fn test_sync_debounce_duration() {
        let config = EngineConfig::default();
        assert_eq!(config.sync_debounce(), Duration::from_millis(1_500));
    }
}
