//! # Config Module
//!
//! Deployment-tunable settings for the engine.
//!
//! Every field has a default, so a config file only needs to list what it
//! overrides:
//!
//! ```json
//! { "blur_threshold": 50.0, "near_duplicate_threshold": 8 }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fingerprint format version. Bump when any fingerprint algorithm
    /// changes so stored records are recomputed.
    pub algorithm_version: u32,
    /// Sharpness below this is considered blurry
    pub blur_threshold: f64,
    /// Maximum Hamming distance (out of 64) for near-duplicates
    pub near_duplicate_threshold: u32,
    /// Sampling stride for the sharpness measure
    pub sharpness_stride: u32,
    /// Largest edge of the decoded thumbnail fed to the perceptual operations
    pub thumbnail_max_dimension: u32,
    /// How long quarantined backups are kept before purge
    pub retention_days: u32,
    /// How many recent scan events late subscribers receive
    pub replay_capacity: usize,
    /// Per-subscriber queue depth before events are dropped for that subscriber
    pub subscriber_capacity: usize,
    /// Size of the fingerprinting pool
    pub scan_workers: usize,
    /// Interval of the background purge sweep
    pub purge_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(4);

        Self {
            algorithm_version: 1,
            blur_threshold: 100.0,
            near_duplicate_threshold: 6,
            sharpness_stride: 4,
            thumbnail_max_dimension: 200,
            retention_days: 30,
            replay_capacity: 50,
            subscriber_capacity: 256,
            scan_workers: workers,
            purge_interval_secs: 60 * 60,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: EngineConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load a config file if given, otherwise return the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.near_duplicate_threshold > 64 {
            return Err(ConfigError::Invalid {
                field: "near_duplicate_threshold",
                reason: format!("{} (must be 0-64)", self.near_duplicate_threshold),
            });
        }
        if !self.blur_threshold.is_finite() || self.blur_threshold < 0.0 {
            return Err(ConfigError::Invalid {
                field: "blur_threshold",
                reason: format!("{} (must be a non-negative number)", self.blur_threshold),
            });
        }
        if self.sharpness_stride == 0 {
            return Err(ConfigError::Invalid {
                field: "sharpness_stride",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.thumbnail_max_dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "thumbnail_max_dimension",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retention_days == 0 {
            return Err(ConfigError::Invalid {
                field: "retention_days",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scan_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "scan_workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.purge_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "purge_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn blur_threshold(mut self, threshold: f64) -> Self {
        self.blur_threshold = threshold;
        self
    }

    pub fn near_duplicate_threshold(mut self, threshold: u32) -> Self {
        self.near_duplicate_threshold = threshold;
        self
    }

    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn scan_workers(mut self, workers: usize) -> Self {
        self.scan_workers = workers;
        self
    }

    pub fn algorithm_version(mut self, version: u32) -> Self {
        self.algorithm_version = version;
        self
    }

    /// Retention window in milliseconds
    pub fn retention_millis(&self) -> i64 {
        i64::from(self.retention_days.max(1)) * MILLIS_PER_DAY
    }
}

/// Milliseconds in one day
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
