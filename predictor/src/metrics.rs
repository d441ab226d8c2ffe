//! Prometheus metrics for the Headroom predictor
//!
//! Every evaluation updates a small set of gauges mirroring the latest
//! prediction, plus counters for evaluations, unavailable samples, failed
//! scheduler ticks and throttling verdicts.

use std::time::Duration;

use prometheus::core::Collector;
use prometheus::{Counter, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::config::MetricsConfig;
use crate::error::{MetricsError, MetricsResult};
use crate::prediction::Prediction;

/// Prediction metrics registry
pub struct PredictionMetrics {
    registry: Registry,
    counters: PredictionCounters,
}

/// Gauges and counters exported by the predictor
#[derive(Clone)]
pub struct PredictionCounters {
    // Latest verdict
    pub risk_score: Gauge,
    pub level_rank: IntGauge,
    pub heap_usage_percent: Gauge,
    pub projected_heap_usage_percent: Gauge,
    pub cpu_usage_percent: Gauge,
    pub thread_count: IntGauge,
    pub queue_size: IntGauge,

    // Totals
    pub evaluations: IntCounter,
    pub unavailable_samples: IntCounter,
    pub failed_ticks: IntCounter,
    pub throttling_verdicts: IntCounter,

    // Timing
    pub evaluation_duration: Histogram,
    pub evaluation_seconds: Counter,
}

/// Snapshot of the counters, for JSON export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionStats {
    pub evaluations: u64,
    pub unavailable_samples: u64,
    pub failed_ticks: u64,
    pub throttling_verdicts: u64,
    pub last_risk_score: f64,
    pub last_level_rank: i64,
    pub avg_evaluation_ms: f64,
}

impl PredictionMetrics {
    pub fn new(config: &MetricsConfig) -> MetricsResult<Self> {
        let registry = Registry::new();
        let counters = PredictionCounters::new(&registry, &config.namespace)?;
        Ok(Self { registry, counters })
    }

    pub fn counters(&self) -> &PredictionCounters {
        &self.counters
    }

    /// Update gauges and counters from one evaluation
    pub fn record_prediction(&self, prediction: &Prediction) {
        let c = &self.counters;
        c.evaluations.inc();
        c.risk_score.set(prediction.risk_score);
        c.level_rank.set(i64::from(prediction.level.rank()));

        if prediction.requires_throttling() {
            c.throttling_verdicts.inc();
        }

        let Some(current) = &prediction.current_metrics else {
            c.unavailable_samples.inc();
            return;
        };

        c.heap_usage_percent.set(current.heap_usage_percent());
        c.cpu_usage_percent.set(current.cpu.process_load_percent.unwrap_or(0.0));
        c.thread_count.set(i64::from(current.threads.current));
        c.queue_size.set(current.worker_pool.queue_size().map_or(0, i64::from));

        if let Some(projected) = &prediction.projected_metrics {
            c.projected_heap_usage_percent.set(projected.heap_usage_percent);
        }
    }

    pub fn record_evaluation_duration(&self, duration: Duration) {
        self.counters.evaluation_duration.observe(duration.as_secs_f64());
        self.counters.evaluation_seconds.inc_by(duration.as_secs_f64());
    }

    /// A scheduler tick that did not produce a prediction
    pub fn record_failed_tick(&self) {
        self.counters.failed_ticks.inc();
    }

    pub fn stats(&self) -> PredictionStats {
        let c = &self.counters;
        let samples = c.evaluation_duration.get_sample_count();
        let avg_evaluation_ms = if samples > 0 {
            c.evaluation_duration.get_sample_sum() / samples as f64 * 1000.0
        } else {
            0.0
        };

        PredictionStats {
            evaluations: c.evaluations.get(),
            unavailable_samples: c.unavailable_samples.get(),
            failed_ticks: c.failed_ticks.get(),
            throttling_verdicts: c.throttling_verdicts.get(),
            last_risk_score: c.risk_score.get(),
            last_level_rank: c.level_rank.get(),
            avg_evaluation_ms,
        }
    }

    /// Prometheus text exposition
    pub fn render(&self) -> MetricsResult<String> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }

    /// Export in `prometheus` or `json` format
    pub fn export(&self, format: &str) -> MetricsResult<String> {
        match format {
            "prometheus" => self.render(),
            "json" => serde_json::to_string_pretty(&self.stats())
                .map_err(|e| MetricsError::ExportFailed { reason: e.to_string() }),
            _ => Err(MetricsError::ExportFailed {
                reason: format!("Unsupported format: {}", format),
            }),
        }
    }
}

impl PredictionCounters {
    fn new(registry: &Registry, namespace: &str) -> MetricsResult<Self> {
        let opts = |name: &str, help: &str| Opts::new(name, help).namespace(namespace);

        let risk_score = register(registry, Gauge::with_opts(opts("risk_score", "Risk score of the latest prediction")))?;
        let level_rank = register(
            registry,
            IntGauge::with_opts(opts("level_rank", "Level of the latest prediction (0 safe .. 3 imminent)")),
        )?;
        let heap_usage_percent = register(registry, Gauge::with_opts(opts("heap_usage_percent", "Heap usage percentage")))?;
        let projected_heap_usage_percent = register(
            registry,
            Gauge::with_opts(opts("projected_heap_usage_percent", "Projected heap usage percentage")),
        )?;
        let cpu_usage_percent = register(registry, Gauge::with_opts(opts("cpu_usage_percent", "Process CPU load percentage")))?;
        let thread_count = register(registry, IntGauge::with_opts(opts("thread_count", "Current thread count")))?;
        let queue_size = register(registry, IntGauge::with_opts(opts("queue_size", "Worker pool queue length")))?;

        let evaluations = register(registry, IntCounter::with_opts(opts("evaluations_total", "Total evaluations")))?;
        let unavailable_samples = register(
            registry,
            IntCounter::with_opts(opts("unavailable_samples_total", "Evaluations without a metrics reading")),
        )?;
        let failed_ticks = register(registry, IntCounter::with_opts(opts("failed_ticks_total", "Scheduler ticks that failed")))?;
        let throttling_verdicts = register(
            registry,
            IntCounter::with_opts(opts("throttling_verdicts_total", "Predictions that required throttling")),
        )?;

        let evaluation_duration = register(
            registry,
            Histogram::with_opts(
                HistogramOpts::new("evaluation_duration_seconds", "Evaluation duration")
                    .namespace(namespace)
                    .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            ),
        )?;
        let evaluation_seconds = register(
            registry,
            Counter::with_opts(opts("evaluation_seconds_total", "Total time spent evaluating")),
        )?;

        Ok(Self {
            risk_score,
            level_rank,
            heap_usage_percent,
            projected_heap_usage_percent,
            cpu_usage_percent,
            thread_count,
            queue_size,
            evaluations,
            unavailable_samples,
            failed_ticks,
            throttling_verdicts,
            evaluation_duration,
            evaluation_seconds,
        })
    }
}

fn register<C>(registry: &Registry, metric: prometheus::Result<C>) -> MetricsResult<C>
where
    C: Collector + Clone + 'static,
{
    let metric = metric.map_err(|e| MetricsError::RegistrationFailed { name: e.to_string() })?;
    registry
        .register(Box::new(metric.clone()))
        .map_err(|e| MetricsError::RegistrationFailed { name: e.to_string() })?;
    Ok(metric)
}
