//! Mission core configuration
//!
//! Every section deserialises with defaults so a partial TOML file only needs
//! to name the values it overrides.

use crate::constants;
use crate::error::{ErrorContext, MissionError, MissionResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Whole nanoseconds, so fractional config values map to exact durations
fn secs(value: f64) -> Duration {
    Duration::from_nanos((value.max(0.0) * 1e9).round() as u64)
}

fn millis(value: f64) -> Duration {
    Duration::from_nanos((value.max(0.0) * 1e6).round() as u64)
}

/// Cross-field validation failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MissionConfig: {section}.min_ttl_secs {min} exceeds max_ttl_secs {max}")]
    InvertedTtlBounds {
        section: &'static str,
        min: f64,
        max: f64,
    },
    #[error("MissionConfig: threshold for '{operation}' is negative ({value} ms)")]
    NegativeThreshold { operation: String, value: f64 },
}

/// Reference registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub name_cache_ttl_secs: f64,
    pub name_cache_max_size: usize,
    pub cleanup_interval_secs: f64,
    pub exited_idle_secs: f64,
}

impl RegistryConfig {
    pub fn name_cache_ttl(&self) -> Duration {
        secs(self.name_cache_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        secs(self.cleanup_interval_secs)
    }

    pub fn exited_idle(&self) -> Duration {
        secs(self.exited_idle_secs)
    }

    /// Cache settings for the name lookup cache
    pub fn name_cache(&self) -> CacheConfig {
        CacheConfig {
            default_ttl_secs: self.name_cache_ttl_secs,
            max_size: self.name_cache_max_size,
            ..CacheConfig::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name_cache_ttl_secs: constants::registry::NAME_CACHE_TTL_SECS,
            name_cache_max_size: constants::registry::NAME_CACHE_MAX_SIZE,
            cleanup_interval_secs: constants::registry::CLEANUP_INTERVAL_SECS,
            exited_idle_secs: constants::registry::EXITED_IDLE_SECS,
        }
    }
}

/// Query cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: f64,
    pub max_size: usize,
    pub eviction_fraction: f64,
    pub tuning_fraction: f64,
    pub min_ttl_secs: f64,
    pub max_ttl_secs: f64,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        secs(self.default_ttl_secs)
    }

    pub fn min_ttl(&self) -> Duration {
        secs(self.min_ttl_secs)
    }

    pub fn max_ttl(&self) -> Duration {
        secs(self.max_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: constants::cache::DEFAULT_TTL_SECS,
            max_size: constants::cache::MAX_SIZE,
            eviction_fraction: constants::cache::EVICTION_FRACTION,
            tuning_fraction: constants::cache::TUNING_FRACTION,
            min_ttl_secs: constants::cache::MIN_TTL_SECS,
            max_ttl_secs: constants::cache::MAX_TTL_SECS,
        }
    }
}

/// Error handler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlerConfig {
    pub history_size: usize,
    pub suppression_window_secs: f64,
    pub rate_window_secs: f64,
    pub timeout_max_attempts: u32,
    pub timeout_base_ms: u64,
    pub resource_wait_ms: u64,
    pub retry_window_secs: f64,
    /// Synonymous subsystem names tried when a lookup misses
    pub subsystem_aliases: HashMap<String, Vec<String>>,
}

impl ErrorHandlerConfig {
    pub fn suppression_window(&self) -> Duration {
        secs(self.suppression_window_secs)
    }

    pub fn rate_window(&self) -> Duration {
        secs(self.rate_window_secs)
    }

    pub fn retry_window(&self) -> Duration {
        secs(self.retry_window_secs)
    }

    pub fn timeout_base(&self) -> Duration {
        Duration::from_millis(self.timeout_base_ms)
    }

    pub fn resource_wait(&self) -> Duration {
        Duration::from_millis(self.resource_wait_ms)
    }
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        let aliases = [
            ("engine", &["engines", "propulsion"][..]),
            ("engines", &["engine", "propulsion"][..]),
            ("weapons", &["weapon", "turrets"][..]),
            ("weapon", &["weapons"][..]),
            ("sensors", &["sensor", "radar"][..]),
            ("sensor", &["sensors", "radar"][..]),
            ("communications", &["comms", "communication"][..]),
            ("comms", &["communications"][..]),
            ("navigation", &["nav"][..]),
            ("nav", &["navigation"][..]),
        ];

        Self {
            history_size: constants::errors::HISTORY_SIZE,
            suppression_window_secs: constants::errors::SUPPRESSION_WINDOW_SECS,
            rate_window_secs: constants::errors::RATE_WINDOW_SECS,
            timeout_max_attempts: constants::errors::TIMEOUT_MAX_ATTEMPTS,
            timeout_base_ms: constants::errors::TIMEOUT_BASE_MS,
            resource_wait_ms: constants::errors::RESOURCE_WAIT_MS,
            retry_window_secs: constants::errors::RETRY_WINDOW_SECS,
            subsystem_aliases: aliases
                .iter()
                .map(|(name, synonyms)| {
                    (
                        name.to_string(),
                        synonyms.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

/// Performance monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sample_ring_size: usize,
    pub tuning_interval_secs: f64,
    pub batch_max_size: usize,
    pub batch_budget_ms: f64,
    pub default_threshold_ms: f64,
    pub thresholds_ms: HashMap<String, f64>,
    pub cache: CacheConfig,
}

impl MonitorConfig {
    pub fn tuning_interval(&self) -> Duration {
        secs(self.tuning_interval_secs)
    }

    pub fn batch_budget(&self) -> Duration {
        millis(self.batch_budget_ms)
    }

    /// Slow threshold for an operation, falling back to the default
    pub fn threshold_for(&self, operation: &str) -> Duration {
        millis(
            self.thresholds_ms
                .get(operation)
                .copied()
                .unwrap_or(self.default_threshold_ms),
        )
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_ring_size: constants::monitor::SAMPLE_RING_SIZE,
            tuning_interval_secs: constants::monitor::TUNING_INTERVAL_SECS,
            batch_max_size: constants::monitor::BATCH_MAX_SIZE,
            batch_budget_ms: constants::monitor::BATCH_BUDGET_MS,
            default_threshold_ms: constants::monitor::DEFAULT_THRESHOLD_MS,
            thresholds_ms: constants::monitor::OPERATION_THRESHOLDS_MS
                .iter()
                .map(|(name, ms)| (name.to_string(), *ms))
                .collect(),
            cache: CacheConfig::default(),
        }
    }
}

/// Entity interface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Zero disables status caching
    pub status_cache_ttl_ms: f64,
    pub include_privileged_by_default: bool,
}

impl EntityConfig {
    pub fn status_cache_ttl(&self) -> Duration {
        millis(self.status_cache_ttl_ms)
    }
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            status_cache_ttl_ms: constants::entity::STATUS_CACHE_TTL_MS,
            include_privileged_by_default: false,
        }
    }
}

/// Complete configuration for one mission session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub registry: RegistryConfig,
    pub errors: ErrorHandlerConfig,
    pub monitor: MonitorConfig,
    pub entity: EntityConfig,
}

impl MissionConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> MissionResult<Self> {
        let config: MissionConfig = toml::from_str(source)?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| MissionError::IoError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config = Self::from_toml_str(&source)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;

        log::info!("[MissionConfig] Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, f64, bool, &str); 9] = [
            (
                "registry.name_cache_ttl_secs",
                self.registry.name_cache_ttl_secs,
                self.registry.name_cache_ttl_secs > 0.0,
                "must be positive",
            ),
            (
                "registry.name_cache_max_size",
                self.registry.name_cache_max_size as f64,
                self.registry.name_cache_max_size > 0,
                "cannot be 0",
            ),
            (
                "registry.cleanup_interval_secs",
                self.registry.cleanup_interval_secs,
                self.registry.cleanup_interval_secs > 0.0,
                "must be positive",
            ),
            (
                "errors.history_size",
                self.errors.history_size as f64,
                self.errors.history_size > 0,
                "cannot be 0",
            ),
            (
                "errors.rate_window_secs",
                self.errors.rate_window_secs,
                self.errors.rate_window_secs > 0.0,
                "must be positive",
            ),
            (
                "monitor.sample_ring_size",
                self.monitor.sample_ring_size as f64,
                self.monitor.sample_ring_size > 0,
                "cannot be 0",
            ),
            (
                "monitor.batch_max_size",
                self.monitor.batch_max_size as f64,
                self.monitor.batch_max_size > 0,
                "cannot be 0",
            ),
            (
                "monitor.cache.max_size",
                self.monitor.cache.max_size as f64,
                self.monitor.cache.max_size > 0,
                "cannot be 0",
            ),
            (
                "monitor.default_threshold_ms",
                self.monitor.default_threshold_ms,
                self.monitor.default_threshold_ms >= 0.0,
                "cannot be negative",
            ),
        ];

        for (field, value, ok, reason) in checks {
            if !ok {
                return Err(MissionError::InvalidConfig {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: reason.to_string(),
                }
                .into());
            }
        }

        for (section, cache) in [
            ("registry", self.registry.name_cache()),
            ("monitor.cache", self.monitor.cache.clone()),
        ] {
            if cache.min_ttl_secs > cache.max_ttl_secs {
                return Err(ConfigError::InvertedTtlBounds {
                    section,
                    min: cache.min_ttl_secs,
                    max: cache.max_ttl_secs,
                }
                .into());
            }
        }

        if let Some((name, ms)) = self.monitor.thresholds_ms.iter().find(|(_, ms)| **ms < 0.0) {
            return Err(ConfigError::NegativeThreshold {
                operation: name.clone(),
                value: *ms,
            }
            .into());
        }

        log::debug!("[MissionConfig] Configuration validated successfully");
        Ok(())
    }
}
