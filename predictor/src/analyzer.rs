//! Per-signal risk analyzers
//!
//! Each analyzer classifies one signal family and is independent of the
//! others. Returning `None` means "contributes nothing" (the signal was not
//! measured, or the analyzer needs more history); returning a SAFE verdict
//! means the signal was measured and found safe.

use crate::config::{CpuThresholds, GcThresholds, HeapThresholds, QueueThresholds, ThreadThresholds, ThresholdConfig};
use crate::history::HistoryWindow;
use crate::prediction::PartialVerdict;
use crate::snapshot::{MetricsSnapshot, WorkerPool};

/// Heap growth over the window, in percentage points, that counts as rapid
pub const TREND_GROWTH_THRESHOLD: f64 = 10.0;

/// Minimum number of history entries before the trend is evaluated
pub const TREND_MIN_SAMPLES: usize = 3;

/// A pure classifier for one signal family
pub trait SignalAnalyzer: Send + Sync {
    /// Stable identifier used in logs
    fn name(&self) -> &'static str;

    /// Classify the snapshot, optionally consulting history
    fn analyze(&self, snapshot: &MetricsSnapshot, history: &HistoryWindow) -> Option<PartialVerdict>;
}

/// Heap usage against warning/critical/imminent thresholds
#[derive(Debug, Clone, Copy)]
pub struct HeapAnalyzer {
    thresholds: HeapThresholds,
}

impl HeapAnalyzer {
    pub fn new(thresholds: HeapThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalAnalyzer for HeapAnalyzer {
    fn name(&self) -> &'static str {
        "heap"
    }

    fn analyze(&self, snapshot: &MetricsSnapshot, _history: &HistoryWindow) -> Option<PartialVerdict> {
        let usage = snapshot.heap_usage_percent();
        let t = &self.thresholds;

        let verdict = if usage >= t.imminent {
            PartialVerdict::imminent(format!("Heap usage at {usage:.2}% - imminent exhaustion risk"), 0.95)
        } else if usage >= t.critical {
            PartialVerdict::critical(format!("Heap usage at {usage:.2}% - critical"), 0.75)
        } else if usage >= t.warning {
            PartialVerdict::warning(format!("Heap usage at {usage:.2}% - approaching threshold"), 0.5)
        } else {
            // Scaled into [0, 0.3] so safe readings stay ordered
            PartialVerdict::safe(usage / 100.0 * 0.3)
        };

        Some(verdict)
    }
}

/// Process CPU load against warning/critical thresholds
#[derive(Debug, Clone, Copy)]
pub struct CpuAnalyzer {
    thresholds: CpuThresholds,
}

impl CpuAnalyzer {
    pub fn new(thresholds: CpuThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalAnalyzer for CpuAnalyzer {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn analyze(&self, snapshot: &MetricsSnapshot, _history: &HistoryWindow) -> Option<PartialVerdict> {
        let Some(load) = snapshot.cpu.process_load_percent else {
            return Some(PartialVerdict::neutral());
        };
        let t = &self.thresholds;

        let verdict = if load >= t.critical {
            PartialVerdict::critical(format!("CPU usage at {load:.2}% - sustained load may freeze the process"), 0.7)
        } else if load >= t.warning {
            PartialVerdict::warning(format!("CPU usage at {load:.2}% - elevated"), 0.4)
        } else {
            PartialVerdict::safe(load / 100.0 * 0.2)
        };

        Some(verdict)
    }
}

/// Absolute thread count, plus a peak-vs-current volatility note
#[derive(Debug, Clone, Copy)]
pub struct ThreadAnalyzer {
    thresholds: ThreadThresholds,
}

impl ThreadAnalyzer {
    pub fn new(thresholds: ThreadThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalAnalyzer for ThreadAnalyzer {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn analyze(&self, snapshot: &MetricsSnapshot, _history: &HistoryWindow) -> Option<PartialVerdict> {
        let current = snapshot.threads.current;
        let peak = snapshot.threads.peak;
        let t = &self.thresholds;

        let mut verdict = if current >= t.critical {
            PartialVerdict::critical(format!("Thread count at {current} - thread exhaustion risk"), 0.65)
        } else if current >= t.warning {
            PartialVerdict::warning(format!("Thread count at {current} - high thread usage"), 0.35)
        } else {
            PartialVerdict::neutral()
        };

        if peak as f64 > current as f64 * 1.5 {
            verdict = verdict.with_note(format!("Peak threads ({peak}) well above current ({current})"));
        }

        Some(verdict)
    }
}

/// Duration of the last garbage collection pause
#[derive(Debug, Clone, Copy)]
pub struct GcPauseAnalyzer {
    thresholds: GcThresholds,
}

impl GcPauseAnalyzer {
    pub fn new(thresholds: GcThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalAnalyzer for GcPauseAnalyzer {
    fn name(&self) -> &'static str {
        "gc"
    }

    fn analyze(&self, snapshot: &MetricsSnapshot, _history: &HistoryWindow) -> Option<PartialVerdict> {
        let pause = snapshot.gc.last_pause_ms;
        if pause == 0 {
            return None;
        }
        let t = &self.thresholds;

        let verdict = if pause >= t.critical_ms {
            PartialVerdict::critical(format!("GC pause of {pause} ms - process may freeze during collection"), 0.6)
        } else if pause >= t.warning_ms {
            PartialVerdict::warning(format!("GC pause of {pause} ms - long pauses"), 0.3)
        } else {
            PartialVerdict::neutral()
        };

        Some(verdict)
    }
}

/// Queue backlog of a bounded worker pool
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolAnalyzer {
    thresholds: QueueThresholds,
}

impl WorkerPoolAnalyzer {
    pub fn new(thresholds: QueueThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalAnalyzer for WorkerPoolAnalyzer {
    fn name(&self) -> &'static str {
        "worker_pool"
    }

    fn analyze(&self, snapshot: &MetricsSnapshot, _history: &HistoryWindow) -> Option<PartialVerdict> {
        let WorkerPool::Bounded(pool) = snapshot.worker_pool else {
            return None;
        };
        let queued = pool.queue_size;
        let t = &self.thresholds;

        let verdict = if queued >= t.critical {
            PartialVerdict::critical(format!("Worker pool queue at {queued} - tasks backing up"), 0.7)
        } else if queued >= t.warning {
            PartialVerdict::warning(format!("Worker pool queue at {queued} - queue growing"), 0.4)
        } else {
            PartialVerdict::neutral()
        };

        Some(verdict)
    }
}

/// Heap growth between the oldest and newest entry of the history window.
///
/// This is a two-point slope, not a regression: intermediate samples are
/// ignored, so a spike-and-recover inside the window goes unnoticed.
#[derive(Debug, Clone, Copy)]
pub struct TrendAnalyzer {
    growth_threshold: f64,
    min_samples: usize,
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self {
            growth_threshold: TREND_GROWTH_THRESHOLD,
            min_samples: TREND_MIN_SAMPLES,
        }
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAnalyzer for TrendAnalyzer {
    fn name(&self) -> &'static str {
        "trend"
    }

    fn analyze(&self, _snapshot: &MetricsSnapshot, history: &HistoryWindow) -> Option<PartialVerdict> {
        if history.len() < self.min_samples {
            return None;
        }
        let oldest = history.oldest()?;
        let newest = history.newest()?;

        let trend = newest.heap_usage_percent() - oldest.heap_usage_percent();
        if trend > self.growth_threshold {
            return Some(PartialVerdict::warning(
                format!("Heap growing rapidly: +{trend:.2}% across the window"),
                0.4,
            ));
        }

        Some(PartialVerdict::neutral())
    }
}

/// The analyzers in evaluation order: heap, CPU, threads, GC, worker pool, trend
pub fn default_analyzers(thresholds: &ThresholdConfig) -> Vec<Box<dyn SignalAnalyzer>> {
    vec![
        Box::new(HeapAnalyzer::new(thresholds.heap)),
        Box::new(CpuAnalyzer::new(thresholds.cpu)),
        Box::new(ThreadAnalyzer::new(thresholds.thread)),
        Box::new(GcPauseAnalyzer::new(thresholds.gc)),
        Box::new(WorkerPoolAnalyzer::new(thresholds.queue)),
        Box::new(TrendAnalyzer::new()),
    ]
}
