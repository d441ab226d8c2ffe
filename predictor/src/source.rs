//! Metrics sources and clocks
//!
//! The engine only depends on the [`MetricsSource`] and [`Clock`] traits.
//! [`SysinfoSource`] is the reference adapter used by the daemon binary; it
//! reads the current process through `sysinfo` and an optional
//! [`WorkerPoolGauge`] the host application keeps up to date.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use sysinfo::{Pid, System};
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::{CollectionError, CollectionResult};
use crate::snapshot::{
    CpuMetrics, GcMetrics, MemoryMetrics, MetricsSnapshot, SystemMemoryMetrics, ThreadMetrics, WorkerPool,
    WorkerPoolMetrics,
};

/// Produces a snapshot on demand.
///
/// Implementations must be safe to call from the scheduler and from
/// on-demand callers at the same time. An unavailable reading is an `Err`
/// value, never a panic.
pub trait MetricsSource: Send + Sync {
    fn collect(&self) -> CollectionResult<MetricsSnapshot>;
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared counters describing a bounded worker pool.
///
/// The host application updates the gauge as tasks move through its pool;
/// the source only reads it.
#[derive(Debug, Default)]
pub struct WorkerPoolGauge {
    active: AtomicU32,
    queued: AtomicU32,
    pool_size: AtomicU32,
    completed: AtomicU64,
}

impl WorkerPoolGauge {
    pub fn new(pool_size: u32) -> Self {
        Self {
            pool_size: AtomicU32::new(pool_size),
            ..Self::default()
        }
    }

    pub fn set_pool_size(&self, size: u32) {
        self.pool_size.store(size, Ordering::Relaxed);
    }

    /// A task entered the queue
    pub fn task_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// A queued task was picked up by a worker
    pub fn task_started(&self) {
        saturating_decrement(&self.queued);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// A running task completed
    pub fn task_finished(&self) {
        saturating_decrement(&self.active);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerPoolMetrics {
        WorkerPoolMetrics {
            active_count: self.active.load(Ordering::Relaxed),
            queue_size: self.queued.load(Ordering::Relaxed),
            pool_size: self.pool_size.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
        }
    }
}

fn saturating_decrement(counter: &AtomicU32) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
}

/// Reads the current process and host through `sysinfo`
pub struct SysinfoSource {
    config: SourceConfig,
    pid: Pid,
    system: Mutex<SamplerState>,
    peak_threads: AtomicU32,
    pool: Option<Arc<WorkerPoolGauge>>,
}

struct SamplerState {
    system: System,
    /// Process CPU usage needs two refreshes before it means anything
    primed: bool,
}

impl SysinfoSource {
    pub fn new(config: SourceConfig) -> CollectionResult<Self> {
        let pid = sysinfo::get_current_pid().map_err(|reason| CollectionError::Unavailable {
            reason: reason.to_string(),
        })?;

        Ok(Self {
            config,
            pid,
            system: Mutex::new(SamplerState {
                system: System::new(),
                primed: false,
            }),
            peak_threads: AtomicU32::new(0),
            pool: None,
        })
    }

    /// Report worker pool saturation from the given gauge
    pub fn with_worker_pool(mut self, gauge: Arc<WorkerPoolGauge>) -> Self {
        self.pool = Some(gauge);
        self
    }

    fn worker_pool(&self) -> WorkerPool {
        match &self.pool {
            Some(gauge) => WorkerPool::Bounded(gauge.snapshot()),
            None => WorkerPool::Elastic,
        }
    }

    fn threads(&self) -> ThreadMetrics {
        let current = current_thread_count();
        let previous_peak = self.peak_threads.fetch_max(current, Ordering::Relaxed);
        ThreadMetrics {
            current,
            peak: previous_peak.max(current),
            daemon: 0,
        }
    }
}

impl MetricsSource for SysinfoSource {
    fn collect(&self) -> CollectionResult<MetricsSnapshot> {
        if !self.config.enabled {
            return Err(CollectionError::Disabled);
        }

        let mut state = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let SamplerState { system, primed } = &mut *state;

        system.refresh_memory();
        system.refresh_cpu();
        if !system.refresh_process(self.pid) {
            return Err(CollectionError::ProcessNotFound { pid: std::process::id() });
        }

        let process = system
            .process(self.pid)
            .ok_or(CollectionError::ProcessNotFound { pid: std::process::id() })?;

        let resident = process.memory();
        let heap_max = self.config.memory_limit_bytes.unwrap_or_else(|| system.total_memory());

        let cpu_count = system.cpus().len().max(1) as f64;
        let was_primed = *primed;
        let process_load = was_primed.then(|| (process.cpu_usage() as f64 / cpu_count).clamp(0.0, 100.0));
        let system_load = was_primed.then(|| system.global_cpu_info().cpu_usage() as f64);
        *primed = true;

        let snapshot = MetricsSnapshot {
            timestamp: Utc::now(),
            memory: MemoryMetrics::new(resident, heap_max, resident, process.virtual_memory().saturating_sub(resident)),
            gc: GcMetrics::default(),
            threads: self.threads(),
            cpu: CpuMetrics {
                process_load_percent: process_load,
                system_load_percent: system_load,
            },
            system_memory: SystemMemoryMetrics::new(system.used_memory(), system.total_memory()),
            worker_pool: self.worker_pool(),
        };

        debug!(
            heap_percent = snapshot.heap_usage_percent(),
            threads = snapshot.threads.current,
            "Collected process metrics"
        );

        Ok(snapshot)
    }
}

#[cfg(target_os = "linux")]
fn current_thread_count() -> u32 {
    std::fs::read_dir("/proc/self/task")
        .map(|entries| entries.count() as u32)
        .unwrap_or(1)
        .max(1)
}

#[cfg(not(target_os = "linux"))]
fn current_thread_count() -> u32 {
    1
}
