//! Error handling for the Headroom predictor
//!
//! This module provides the error types for configuration loading, metric
//! collection, the sampling scheduler and metrics export. An unavailable
//! metrics reading is an ordinary value here: the engine turns it into a
//! neutral prediction instead of failing.

use std::io;

use thiserror::Error;

/// The main error type for the predictor
#[derive(Error, Debug)]
pub enum PredictorError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Metric collection errors
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    /// Sampling scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Metrics export errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Generic(String),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Unknown configuration key: {key}")]
    UnknownKey { key: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration file permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Configuration parsing error: {reason}")]
    ParseError { reason: String },
}

/// Reasons a metrics source could not produce a reading
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectionError {
    #[error("Metric collection is disabled")]
    Disabled,

    #[error("Metrics source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Process {pid} not found")]
    ProcessNotFound { pid: u32 },
}

/// Sampling scheduler errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Evaluation task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Metrics related errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metric registration failed: {name}")]
    RegistrationFailed { name: String },

    #[error("Metrics export failed: {reason}")]
    ExportFailed { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PredictorError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A specialized result type for metric collection
pub type CollectionResult<T> = std::result::Result<T, CollectionError>;

/// A specialized result type for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// A specialized result type for metrics operations
pub type MetricsResult<T> = std::result::Result<T, MetricsError>;

impl PredictorError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            PredictorError::Collection(_) => true,
            PredictorError::Scheduler(SchedulerError::TaskFailed { .. }) => true,
            PredictorError::Config(_) => false,
            PredictorError::Io(io_error) => {
                matches!(io_error.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock)
            }
            _ => true,
        }
    }

    /// Get the error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            PredictorError::Config(_) => "config",
            PredictorError::Collection(_) => "collection",
            PredictorError::Scheduler(_) => "scheduler",
            PredictorError::Metrics(_) => "metrics",
            PredictorError::Io(_) => "io",
            PredictorError::Serialization(_) => "serialization",
            PredictorError::Generic(_) => "generic",
        }
    }
}

impl From<prometheus::Error> for MetricsError {
    fn from(err: prometheus::Error) -> Self {
        MetricsError::ExportFailed { reason: err.to_string() }
    }
}
