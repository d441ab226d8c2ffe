//! Point-in-time resource readings
//!
//! A [`MetricsSnapshot`] is produced once per sample and never mutated
//! afterwards. Usage percentages are derived from their byte counts at
//! construction time; a zero denominator yields 0%, so callers must check
//! [`MemoryMetrics::has_heap_limit`] / [`SystemMemoryMetrics::has_system_memory`] before
//! reading 0% as "idle".

use chrono::{DateTime, Utc};
use serde::Serialize;

/// All observed signals at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,

    /// Managed memory (heap) of the process
    pub memory: MemoryMetrics,

    /// Garbage collection counters
    pub gc: GcMetrics,

    /// Thread counts
    pub threads: ThreadMetrics,

    /// CPU load
    pub cpu: CpuMetrics,

    /// Host memory
    pub system_memory: SystemMemoryMetrics,

    /// Worker pool saturation, when the process runs a bounded pool
    pub worker_pool: WorkerPool,
}

impl MetricsSnapshot {
    /// Heap usage as a percentage of the heap ceiling
    pub fn heap_usage_percent(&self) -> f64 {
        self.memory.usage_percent()
    }
}

/// Heap and non-heap memory readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryMetrics {
    heap_used_bytes: u64,
    heap_max_bytes: u64,
    heap_committed_bytes: u64,
    non_heap_used_bytes: u64,
    heap_usage_percent: f64,
}

impl MemoryMetrics {
    pub fn new(
        heap_used_bytes: u64,
        heap_max_bytes: u64,
        heap_committed_bytes: u64,
        non_heap_used_bytes: u64,
    ) -> Self {
        Self {
            heap_used_bytes,
            heap_max_bytes,
            heap_committed_bytes,
            non_heap_used_bytes,
            heap_usage_percent: percent_of(heap_used_bytes, heap_max_bytes),
        }
    }

    pub fn heap_used_bytes(&self) -> u64 {
        self.heap_used_bytes
    }

    pub fn heap_max_bytes(&self) -> u64 {
        self.heap_max_bytes
    }

    pub fn heap_committed_bytes(&self) -> u64 {
        self.heap_committed_bytes
    }

    pub fn non_heap_used_bytes(&self) -> u64 {
        self.non_heap_used_bytes
    }

    /// Derived heap usage in [0, 100]; 0 when the ceiling is unknown
    pub fn usage_percent(&self) -> f64 {
        self.heap_usage_percent
    }

    /// Whether the heap ceiling is known
    pub fn has_heap_limit(&self) -> bool {
        self.heap_max_bytes > 0
    }
}

/// Garbage collection readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GcMetrics {
    /// Cumulative number of collections
    pub collection_count: u64,

    /// Cumulative time spent collecting, in milliseconds
    pub collection_time_ms: u64,

    /// Duration of the most recent pause; 0 when none has been observed
    pub last_pause_ms: u64,
}

/// Thread counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThreadMetrics {
    pub current: u32,
    pub peak: u32,
    pub daemon: u32,
}

/// CPU load readings; `None` when the platform cannot report the value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CpuMetrics {
    pub process_load_percent: Option<f64>,
    pub system_load_percent: Option<f64>,
}

/// Host memory readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemMemoryMetrics {
    used_bytes: u64,
    total_bytes: u64,
    usage_percent: f64,
}

impl SystemMemoryMetrics {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            usage_percent: percent_of(used_bytes, total_bytes),
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Derived usage in [0, 100]; 0 when the total is unknown
    pub fn usage_percent(&self) -> f64 {
        self.usage_percent
    }

    pub fn has_system_memory(&self) -> bool {
        self.total_bytes > 0
    }
}

impl Default for SystemMemoryMetrics {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Execution substrate of the process' background work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerPool {
    /// A bounded pool with a task queue that can back up
    Bounded(WorkerPoolMetrics),

    /// An elastic substrate with no queue to observe
    #[default]
    Elastic,
}

impl WorkerPool {
    /// Queue length, only for bounded pools
    pub fn queue_size(&self) -> Option<u32> {
        match self {
            WorkerPool::Bounded(metrics) => Some(metrics.queue_size),
            WorkerPool::Elastic => None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, WorkerPool::Bounded(_))
    }
}

/// Readings of a bounded worker pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerPoolMetrics {
    pub active_count: u32,
    pub queue_size: u32,
    pub pool_size: u32,
    pub completed_tasks: u64,
}

/// Heap-only projection of a future snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedMetrics {
    /// Instant the projection refers to
    pub timestamp: DateTime<Utc>,

    /// Projected heap usage, capped at 100
    pub heap_usage_percent: f64,
}

fn percent_of(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 * 100.0 / total as f64).clamp(0.0, 100.0)
}
