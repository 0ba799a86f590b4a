//! Configuration validation rules.
//!
//! This module provides validation logic for `EngineConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::EngineConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl EngineConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `asset_max_bytes` is 0
    /// - `max_retries` is 0 or exceeds 10
    /// - `sync_debounce_ms` exceeds 1 minute
    /// - `error_log_max` is 0
    /// - any configured TTL is 0 seconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asset_max_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "asset_max_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Invalid { field: "max_retries".into(), reason: "must be at least 1".into() });
        }
        if self.max_retries > 10 {
            return Err(ConfigError::Invalid { field: "max_retries".into(), reason: "must not exceed 10".into() });
        }

        if self.sync_debounce_ms > 60_000 {
            return Err(ConfigError::Invalid {
                field: "sync_debounce_ms".into(),
                reason: "must not exceed 1 minute (60000ms)".into(),
            });
        }

        if self.error_log_max == 0 {
            return Err(ConfigError::Invalid { field: "error_log_max".into(), reason: "must be at least 1".into() });
        }

        for (name, policy) in [
            ("content.encyclopedia", self.content.encyclopedia),
            ("content.symptom", self.content.symptom),
            ("content.medication", self.content.medication),
            ("content.region", self.content.region),
            ("content.quiz", self.content.quiz),
            ("content.glossary", self.content.glossary),
        ] {
            if policy.ttl_secs == Some(0) {
                return Err(ConfigError::Invalid {
                    field: name.into(),
                    reason: "ttl_secs must be greater than 0 when set".into(),
                });
            }
        }

        Ok(())
    }
}
