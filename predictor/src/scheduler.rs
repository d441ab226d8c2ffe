//! Fixed-period sampling loop and the last published prediction
//!
//! The scheduler owns a background task that evaluates the engine once per
//! period. Evaluation itself is synchronous and runs on the blocking pool;
//! a tick that panics is logged and counted, and the loop keeps going.
//!
//! [`LastPrediction`] starts empty, is replaced wholesale after every
//! successful tick, and can be read by any number of callers at once. A
//! reader sees either the previous or the newest complete prediction.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SamplingConfig;
use crate::engine::PredictionEngine;
use crate::error::{SchedulerError, SchedulerResult};
use crate::prediction::Prediction;
use crate::report;

/// Atomically replaced holder of the most recent scheduled prediction
#[derive(Debug)]
pub struct LastPrediction {
    tx: watch::Sender<Option<Arc<Prediction>>>,
}

impl LastPrediction {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, prediction: Prediction) {
        self.tx.send_replace(Some(Arc::new(prediction)));
    }

    /// `None` until the first successful tick
    pub fn get(&self) -> Option<Arc<Prediction>> {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Prediction>>> {
        self.tx.subscribe()
    }
}

impl Default for LastPrediction {
    fn default() -> Self {
        Self::new()
    }
}

struct RunningTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs the engine on a fixed period and publishes each result
pub struct SamplingScheduler {
    engine: Arc<PredictionEngine>,
    last: Arc<LastPrediction>,
    period: Duration,
    log_reports: bool,
    task: Mutex<Option<RunningTask>>,
}

impl SamplingScheduler {
    /// A zero period is raised to one millisecond
    pub fn new(engine: Arc<PredictionEngine>, period: Duration) -> Self {
        Self {
            engine,
            last: Arc::new(LastPrediction::new()),
            period: period.max(Duration::from_millis(1)),
            log_reports: false,
            task: Mutex::new(None),
        }
    }

    pub fn from_config(engine: Arc<PredictionEngine>, config: &SamplingConfig) -> Self {
        Self::new(engine, config.period()).with_reports(config.log_reports)
    }

    /// Log the structured report after every tick
    pub fn with_reports(mut self, enabled: bool) -> Self {
        self.log_reports = enabled;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn engine(&self) -> &Arc<PredictionEngine> {
        &self.engine
    }

    /// Start the background loop. The first evaluation runs immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> SchedulerResult<()> {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            self.engine.clone(),
            self.last.clone(),
            self.period,
            self.log_reports,
            token.clone(),
        ));

        *task = Some(RunningTask { token, handle });
        info!("Sampling scheduler started with a {:?} period", self.period);
        Ok(())
    }

    /// Cancel the loop and wait for an in-flight tick to finish
    pub async fn stop(&self) -> SchedulerResult<()> {
        let running = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SchedulerError::NotRunning)?;

        running.token.cancel();
        running
            .handle
            .await
            .map_err(|e| SchedulerError::TaskFailed { reason: e.to_string() })?;

        info!("Sampling scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Most recent scheduled prediction
    pub fn last_prediction(&self) -> Option<Arc<Prediction>> {
        self.last.get()
    }

    /// Shared handle to the published prediction, for readers that outlive the scheduler borrow
    pub fn last_prediction_handle(&self) -> Arc<LastPrediction> {
        self.last.clone()
    }

    /// On-demand evaluation sharing the scheduler's history; not published
    pub fn evaluate_now(&self) -> Prediction {
        self.engine.evaluate()
    }

    /// The last scheduled prediction, or a fresh evaluation when none exists yet
    pub fn cached_or_evaluate(&self) -> Arc<Prediction> {
        self.last_prediction()
            .unwrap_or_else(|| Arc::new(self.evaluate_now()))
    }
}

impl Drop for SamplingScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.token.cancel();
        }
    }
}

async fn sampling_loop(
    engine: Arc<PredictionEngine>,
    last: Arc<LastPrediction>,
    period: Duration,
    log_reports: bool,
    token: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let tick_engine = engine.clone();
        match tokio::task::spawn_blocking(move || tick_engine.evaluate()).await {
            Ok(prediction) => {
                if log_reports {
                    report::log_prediction(&prediction);
                }
                debug!(level = %prediction.level, "Publishing scheduled prediction");
                last.publish(prediction);
            }
            Err(e) => {
                error!("Error during scheduled evaluation: {}", e);
                if let Some(metrics) = engine.metrics() {
                    metrics.record_failed_tick();
                }
            }
        }
    }
}
