//! Prediction engine
//!
//! [`PredictionEngine::evaluate`] collects one snapshot, appends it to the
//! shared history window, runs every analyzer and folds their verdicts into a
//! single [`Prediction`]. Collection, append and computation happen under one
//! lock so concurrent callers never interleave their history updates.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, warn};

use crate::analyzer::{default_analyzers, SignalAnalyzer};
use crate::config::PredictorConfig;
use crate::history::HistoryWindow;
use crate::metrics::PredictionMetrics;
use crate::prediction::{PartialVerdict, Prediction};
use crate::projection::project;
use crate::snapshot::MetricsSnapshot;
use crate::source::{Clock, MetricsSource};

/// Stateful evaluator owning the history window
pub struct PredictionEngine {
    source: Arc<dyn MetricsSource>,
    clock: Arc<dyn Clock>,
    analyzers: Vec<Box<dyn SignalAnalyzer>>,
    history: Mutex<HistoryWindow>,
    metrics: Option<Arc<PredictionMetrics>>,
}

impl PredictionEngine {
    pub fn new(config: &PredictorConfig, source: Arc<dyn MetricsSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            analyzers: default_analyzers(&config.thresholds),
            history: Mutex::new(HistoryWindow::new(config.history.max_size)),
            metrics: None,
        }
    }

    /// Record every evaluation into the given registry
    pub fn with_metrics(mut self, metrics: Arc<PredictionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<PredictionMetrics>> {
        self.metrics.as_ref()
    }

    /// Collect a fresh snapshot and compute a prediction from it
    pub fn evaluate(&self) -> Prediction {
        let started = Instant::now();
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);

        let prediction = match self.source.collect() {
            Ok(snapshot) => {
                history.push(snapshot.clone());
                self.compute(snapshot, &history)
            }
            Err(e) => {
                warn!("Metrics unavailable, reporting a neutral prediction: {}", e);
                Prediction::unavailable(self.clock.now())
            }
        };
        drop(history);

        if let Some(metrics) = &self.metrics {
            metrics.record_prediction(&prediction);
            metrics.record_evaluation_duration(started.elapsed());
        }

        debug!(
            level = %prediction.level,
            risk_score = prediction.risk_score,
            warnings = prediction.warnings.len(),
            critical_issues = prediction.critical_issues.len(),
            "Evaluation complete"
        );

        prediction
    }

    fn compute(&self, snapshot: MetricsSnapshot, history: &HistoryWindow) -> Prediction {
        let verdict = PartialVerdict::fold(
            self.analyzers
                .iter()
                .filter_map(|analyzer| analyzer.analyze(&snapshot, history)),
        );

        let now = self.clock.now();
        let projected = project(&snapshot, history, now);
        Prediction::from_verdict(now, verdict, snapshot, projected)
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Analyzer names in evaluation order
    pub fn analyzer_names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }
}
