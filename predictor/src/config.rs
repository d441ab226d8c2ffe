//! Configuration management for the Headroom predictor
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files and environment variables. Thresholds are additionally
//! addressable through flat dotted keys (`heap.warning`, `gc.critical_ms`,
//! `history.max_size`, ...) so outer layers can treat them as a simple
//! name → number mapping.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Flat keys accepted by [`PredictorConfig::get_threshold`] and friends
pub const FLAT_KEYS: &[&str] = &[
    "heap.warning",
    "heap.critical",
    "heap.imminent",
    "cpu.warning",
    "cpu.critical",
    "thread.warning",
    "thread.critical",
    "gc.warning_ms",
    "gc.critical_ms",
    "queue.warning",
    "queue.critical",
    "history.max_size",
    "sample.period_seconds",
];

/// Largest accepted history window
pub const MAX_HISTORY_SIZE: usize = 10_000;

/// Prefix for environment overrides, e.g. `HEADROOM_HEAP_WARNING`
const ENV_PREFIX: &str = "HEADROOM_";

/// Main configuration structure for the predictor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Analyzer thresholds
    pub thresholds: ThresholdConfig,

    /// History window configuration
    pub history: HistoryConfig,

    /// Sampling schedule configuration
    pub sampling: SamplingConfig,

    /// Reference metrics source configuration
    pub source: SourceConfig,

    /// Prometheus metrics configuration
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Thresholds for every analyzer family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub heap: HeapThresholds,
    pub cpu: CpuThresholds,
    pub thread: ThreadThresholds,
    pub gc: GcThresholds,
    pub queue: QueueThresholds,
}

/// Heap usage thresholds, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapThresholds {
    pub warning: f64,
    pub critical: f64,
    pub imminent: f64,
}

/// Process CPU load thresholds, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuThresholds {
    pub warning: f64,
    pub critical: f64,
}

/// Absolute thread count thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadThresholds {
    pub warning: u32,
    pub critical: u32,
}

/// Last GC pause thresholds, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcThresholds {
    pub warning_ms: u64,
    pub critical_ms: u64,
}

/// Worker pool queue length thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueThresholds {
    pub warning: u32,
    pub critical: u32,
}

/// History window configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of retained snapshots
    pub max_size: usize,
}

/// Sampling schedule configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Period between scheduled evaluations
    pub period_seconds: u64,

    /// Log the structured metrics report on every tick
    pub log_reports: bool,
}

/// Reference metrics source configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// When false every collection reports "unavailable"
    pub enabled: bool,

    /// Memory ceiling used as the heap maximum; total system memory when unset
    pub memory_limit_bytes: Option<u64>,
}

/// Prometheus metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Metric name prefix
    pub namespace: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Log format (`plain` or `json`)
    pub format: String,
}

impl Default for HeapThresholds {
    fn default() -> Self {
        Self {
            warning: 70.0,
            critical: 85.0,
            imminent: 95.0,
        }
    }
}

impl Default for CpuThresholds {
    fn default() -> Self {
        Self {
            warning: 70.0,
            critical: 85.0,
        }
    }
}

impl Default for ThreadThresholds {
    fn default() -> Self {
        Self {
            warning: 80,
            critical: 90,
        }
    }
}

impl Default for GcThresholds {
    fn default() -> Self {
        Self {
            warning_ms: 1000,
            critical_ms: 5000,
        }
    }
}

impl Default for QueueThresholds {
    fn default() -> Self {
        Self {
            warning: 50,
            critical: 80,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_size: 10 }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_seconds: 10,
            log_reports: true,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_limit_bytes: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "headroom".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

impl SamplingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }
}

impl PredictorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.to_string_lossy().to_string() })?;

        let config: PredictorConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults overridden by environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = PredictorConfig::default();
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback order: defaults -> file -> env
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let mut config = PredictorConfig::default();

        if let Some(path) = config_path {
            if path.as_ref().exists() {
                config = PredictorConfig::from_file(path)?;
            }
        }

        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HEADROOM_*` overrides from the given variables.
    ///
    /// Every flat key maps to an upper-cased variable with dots replaced by
    /// underscores (`gc.warning_ms` → `HEADROOM_GC_WARNING_MS`). Two extra
    /// switches are understood: `HEADROOM_LOG_LEVEL` and
    /// `HEADROOM_MONITOR_ENABLED`.
    pub fn apply_env<I>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, raw) in vars {
            let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match suffix {
                "LOG_LEVEL" => self.logging.level = raw,
                "MONITOR_ENABLED" => {
                    self.source.enabled = raw.parse().map_err(|_| ConfigError::InvalidValue {
                        field: name.clone(),
                        value: raw.clone(),
                    })?;
                }
                _ => {
                    let Some(key) = FLAT_KEYS.iter().find(|key| env_name(key) == suffix) else {
                        continue;
                    };
                    let value: f64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                        field: name.clone(),
                        value: raw.clone(),
                    })?;
                    self.set_threshold(key, value)?;
                }
            }
        }

        Ok(())
    }

    /// Read a threshold by its flat key
    pub fn get_threshold(&self, key: &str) -> ConfigResult<f64> {
        let t = &self.thresholds;
        let value = match key {
            "heap.warning" => t.heap.warning,
            "heap.critical" => t.heap.critical,
            "heap.imminent" => t.heap.imminent,
            "cpu.warning" => t.cpu.warning,
            "cpu.critical" => t.cpu.critical,
            "thread.warning" => t.thread.warning as f64,
            "thread.critical" => t.thread.critical as f64,
            "gc.warning_ms" => t.gc.warning_ms as f64,
            "gc.critical_ms" => t.gc.critical_ms as f64,
            "queue.warning" => t.queue.warning as f64,
            "queue.critical" => t.queue.critical as f64,
            "history.max_size" => self.history.max_size as f64,
            "sample.period_seconds" => self.sampling.period_seconds as f64,
            _ => return Err(ConfigError::UnknownKey { key: key.to_string() }),
        };
        Ok(value)
    }

    /// Set a threshold by its flat key.
    ///
    /// Count and duration keys only accept non-negative whole numbers.
    pub fn set_threshold(&mut self, key: &str, value: f64) -> ConfigResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidValue { field: key.to_string(), value: value.to_string() });
        }

        let t = &mut self.thresholds;
        match key {
            "heap.warning" => t.heap.warning = value,
            "heap.critical" => t.heap.critical = value,
            "heap.imminent" => t.heap.imminent = value,
            "cpu.warning" => t.cpu.warning = value,
            "cpu.critical" => t.cpu.critical = value,
            "thread.warning" => t.thread.warning = whole(key, value)? as u32,
            "thread.critical" => t.thread.critical = whole(key, value)? as u32,
            "gc.warning_ms" => t.gc.warning_ms = whole(key, value)?,
            "gc.critical_ms" => t.gc.critical_ms = whole(key, value)?,
            "queue.warning" => t.queue.warning = whole(key, value)? as u32,
            "queue.critical" => t.queue.critical = whole(key, value)? as u32,
            "history.max_size" => self.history.max_size = whole(key, value)? as usize,
            "sample.period_seconds" => self.sampling.period_seconds = whole(key, value)?,
            _ => return Err(ConfigError::UnknownKey { key: key.to_string() }),
        }
        Ok(())
    }

    /// Build a configuration from defaults overridden by a flat mapping
    pub fn from_flat_map<'a, I>(entries: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut config = PredictorConfig::default();
        for (key, value) in entries {
            config.set_threshold(key, value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Export every flat key with its current value
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        FLAT_KEYS
            .iter()
            .filter_map(|key| self.get_threshold(key).ok().map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let t = &self.thresholds;

        check_percent("heap.warning", t.heap.warning)?;
        check_percent("heap.critical", t.heap.critical)?;
        check_percent("heap.imminent", t.heap.imminent)?;
        check_ascending("heap.warning", t.heap.warning, "heap.critical", t.heap.critical)?;
        check_ascending("heap.critical", t.heap.critical, "heap.imminent", t.heap.imminent)?;

        check_percent("cpu.warning", t.cpu.warning)?;
        check_percent("cpu.critical", t.cpu.critical)?;
        check_ascending("cpu.warning", t.cpu.warning, "cpu.critical", t.cpu.critical)?;

        check_ascending(
            "thread.warning",
            t.thread.warning as f64,
            "thread.critical",
            t.thread.critical as f64,
        )?;
        check_ascending("gc.warning_ms", t.gc.warning_ms as f64, "gc.critical_ms", t.gc.critical_ms as f64)?;
        check_ascending("queue.warning", t.queue.warning as f64, "queue.critical", t.queue.critical as f64)?;

        if self.history.max_size == 0 || self.history.max_size > MAX_HISTORY_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "history.max_size".to_string(),
                value: self.history.max_size.to_string(),
            });
        }

        if self.sampling.period_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sample.period_seconds".to_string(),
                value: "0".to_string(),
            });
        }

        if !matches!(self.logging.format.as_str(), "plain" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("headroom").join("predictor.toml"))
            .ok_or_else(|| ConfigError::ValidationFailed {
                reason: "Unable to determine config directory".to_string(),
            })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| ConfigError::ValidationFailed {
                reason: format!("Unable to create config directory: {}", parent.display()),
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationFailed { reason: e.to_string() })?;

        fs::write(path, content)
            .map_err(|_| ConfigError::PermissionDenied { path: path.to_string_lossy().to_string() })?;

        Ok(())
    }
}

fn env_name(key: &str) -> String {
    key.replace('.', "_").to_uppercase()
}

fn whole(key: &str, value: f64) -> ConfigResult<u64> {
    if value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(ConfigError::InvalidValue { field: key.to_string(), value: value.to_string() });
    }
    Ok(value as u64)
}

fn check_percent(field: &str, value: f64) -> ConfigResult<()> {
    if !(0.0..=100.0).contains(&value) || value == 0.0 {
        return Err(ConfigError::InvalidValue { field: field.to_string(), value: value.to_string() });
    }
    Ok(())
}

fn check_ascending(lower_field: &str, lower: f64, upper_field: &str, upper: f64) -> ConfigResult<()> {
    if lower >= upper {
        return Err(ConfigError::ValidationFailed {
            reason: format!("{lower_field} ({lower}) must be below {upper_field} ({upper})"),
        });
    }
    Ok(())
}
