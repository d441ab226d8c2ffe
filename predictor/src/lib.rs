//! Headroom predictor library
//!
//! Samples process-level resource metrics on a fixed cadence, classifies the
//! current risk of exhaustion, and projects near-future heap usage from a
//! short sliding history, so an operator or an automated throttling mechanism
//! is warned before the process crashes or freezes.

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod metrics;
pub mod prediction;
pub mod projection;
pub mod report;
pub mod scheduler;
pub mod snapshot;
pub mod source;

// Re-export commonly used types
pub use analyzer::{default_analyzers, SignalAnalyzer};
pub use config::PredictorConfig;
pub use engine::PredictionEngine;
pub use error::{CollectionError, ConfigError, PredictorError, Result};
pub use history::HistoryWindow;
pub use metrics::PredictionMetrics;
pub use prediction::{HealthSummary, PartialVerdict, Prediction, PredictionLevel, ThrottleSignal};
pub use scheduler::{LastPrediction, SamplingScheduler};
pub use snapshot::{MetricsSnapshot, ProjectedMetrics, WorkerPool};
pub use source::{Clock, MetricsSource, SysinfoSource, SystemClock, WorkerPoolGauge};
