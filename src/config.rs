// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Service configuration.
//!
//! Defaults: batches of at most 100 identifiers coalesced over a 100ms
//! window, a 20-token bucket refilled at 5 tokens/second, a 30s flush
//! interval, and a 48h staleness horizon for cached display names.

use crate::error::{NamesError, Result};
use crate::rate_limit::RateConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for [`NameService`](crate::service::NameService).
///
/// Interval fields are plain integers for clean TOML round-trips; the
/// accessor methods return [`Duration`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    /// Location of the on-disk name cache.
    pub cache_path: PathBuf,
    /// Ceiling on identifiers per dispatched batch.
    pub max_batch: usize,
    /// Coalescing window in milliseconds, measured from the first
    /// collected item.
    pub batch_window_ms: u64,
    /// Token-bucket burst capacity (batches).
    pub bucket_capacity: u32,
    /// Token-bucket refill rate (batches per second).
    pub refill_per_second: f64,
    /// Back-off in milliseconds before retrying a failed token
    /// acquisition.
    pub rate_backoff_ms: u64,
    /// Periodic flush interval in seconds, and the minimum spacing
    /// between saves.
    pub flush_interval_secs: u64,
    /// Records older than this many seconds are discarded at load time
    /// unless the mode is legacy-only.
    pub max_record_age_secs: u64,
    /// Default wait budget for `get_async`, in milliseconds.
    pub lookup_timeout_ms: u64,
    /// Refresh-due horizon in seconds stamped on display-name
    /// resolutions that carry none of their own.
    pub display_refresh_secs: u64,
    /// Buffer depth per name-change subscriber.
    pub event_channel_capacity: usize,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(".cache/saorsa_names/name_cache.json"),
            max_batch: 100,
            batch_window_ms: 100,
            bucket_capacity: 20,
            refill_per_second: 5.0,
            rate_backoff_ms: 1000,
            flush_interval_secs: 30,
            max_record_age_secs: 48 * 3600,
            lookup_timeout_ms: 5000,
            display_refresh_secs: 24 * 3600,
            event_channel_capacity: 256,
        }
    }
}

impl NamesConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| NamesError::Config(format!("failed to parse config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a TOML file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NamesError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Check that every budget is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch == 0 {
            return Err(NamesError::Config("max_batch must be at least 1".into()));
        }
        if self.batch_window_ms == 0 {
            return Err(NamesError::Config("batch_window_ms must be non-zero".into()));
        }
        if self.bucket_capacity == 0 {
            return Err(NamesError::Config(
                "bucket_capacity must be at least 1".into(),
            ));
        }
        if self.refill_per_second.is_nan() || self.refill_per_second <= 0.0 {
            return Err(NamesError::Config(
                "refill_per_second must be positive".into(),
            ));
        }
        if self.flush_interval_secs == 0 {
            return Err(NamesError::Config(
                "flush_interval_secs must be non-zero".into(),
            ));
        }
        if self.cache_path.as_os_str().is_empty() {
            return Err(NamesError::Config("cache_path must be set".into()));
        }
        Ok(())
    }

    /// The batch coalescing window.
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    /// Back-off between token acquisition attempts.
    pub fn rate_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_backoff_ms)
    }

    /// Spacing of the periodic cache flush.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Staleness horizon applied at cache load.
    pub fn max_record_age(&self) -> Duration {
        Duration::from_secs(self.max_record_age_secs)
    }

    /// Default wait budget for `get_async`.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Refresh-due horizon for display-name records.
    pub fn display_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.display_refresh_secs)
    }

    /// The token-bucket parameters this configuration describes.
    pub fn rate_config(&self) -> RateConfig {
        RateConfig {
            capacity: self.bucket_capacity,
            refill_per_second: self.refill_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_match_budgets() {
        let config = NamesConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_batch, 100);
        assert_eq!(config.batch_window(), Duration::from_millis(100));
        assert_eq!(config.bucket_capacity, 20);
        assert_eq!(config.refill_per_second, 5.0);
        assert_eq!(config.flush_interval(), Duration::from_secs(30));
        assert_eq!(config.max_record_age(), Duration::from_secs(48 * 3600));
        assert_eq!(config.lookup_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn zero_budgets_are_rejected() {
        let mut config = NamesConfig::default();
        config.max_batch = 0;
        assert!(config.validate().is_err());

        let mut config = NamesConfig::default();
        config.batch_window_ms = 0;
        assert!(config.validate().is_err());

        let mut config = NamesConfig::default();
        config.refill_per_second = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("names.toml");

        let config = NamesConfig {
            max_batch: 50,
            ..NamesConfig::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = NamesConfig::from_file(&path).unwrap();
        assert_eq!(loaded.max_batch, 50);
        assert_eq!(loaded.batch_window_ms, config.batch_window_ms);
    }

    #[test]
    fn invalid_config_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("names.toml");
        std::fs::write(&path, "max_batch = \"plenty\"").unwrap();
        assert!(NamesConfig::from_file(&path).is_err());
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("names.toml");
        std::fs::write(&path, "max_batch = 25\nbucket_capacity = 10\n").unwrap();

        let loaded = NamesConfig::from_file(&path).unwrap();
        assert_eq!(loaded.max_batch, 25);
        assert_eq!(loaded.bucket_capacity, 10);
        assert_eq!(loaded.refill_per_second, 5.0);
    }
}
