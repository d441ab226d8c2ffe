//! Human-readable metrics report logged on every scheduled tick

use std::fmt::Write;

use tracing::{error, info, warn};

use crate::prediction::Prediction;
use crate::snapshot::{MetricsSnapshot, WorkerPool};

const RULE: &str = "===============================================================";
const THIN_RULE: &str = "---------------------------------------------------------------";

/// Format a byte count with a 1024 base and two decimals above bytes
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    match bytes {
        0 => "0 B".to_string(),
        b if b < 1024 => format!("{} B", b),
        b if (b as f64) < MB => format!("{:.2} KB", b as f64 / KB),
        b if (b as f64) < GB => format!("{:.2} MB", b as f64 / MB),
        b => format!("{:.2} GB", b as f64 / GB),
    }
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v))
}

/// Render the structured report for a prediction and the snapshot it was computed from
pub fn build_report(snapshot: &MetricsSnapshot, prediction: &Prediction) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "RESOURCE METRICS REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Timestamp: {}", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Prediction Level: {} | Risk Score: {:.2}", prediction.level, prediction.risk_score);
    let _ = writeln!(out, "{THIN_RULE}");

    write_memory(&mut out, snapshot);
    write_gc(&mut out, snapshot);
    write_threads(&mut out, snapshot);
    write_cpu(&mut out, snapshot);
    write_system_memory(&mut out, snapshot);
    write_worker_pool(&mut out, snapshot);

    let _ = write!(out, "{RULE}");
    out
}

fn write_memory(out: &mut String, snapshot: &MetricsSnapshot) {
    let m = &snapshot.memory;
    let _ = writeln!(out, "MEMORY");
    let _ = writeln!(out, "   |- Heap Used:        {}", format_bytes(m.heap_used_bytes()));
    let _ = writeln!(out, "   |- Heap Max:         {}", format_bytes(m.heap_max_bytes()));
    let _ = writeln!(out, "   |- Heap Committed:   {}", format_bytes(m.heap_committed_bytes()));
    let _ = writeln!(out, "   |- Non-Heap Used:    {}", format_bytes(m.non_heap_used_bytes()));
    let _ = writeln!(out, "   `- Heap Usage:       {:.2}%", m.usage_percent());
}

fn write_gc(out: &mut String, snapshot: &MetricsSnapshot) {
    let gc = &snapshot.gc;
    if gc.collection_count == 0 {
        return;
    }
    let _ = writeln!(out, "GARBAGE COLLECTION");
    let _ = writeln!(out, "   |- Collection Count: {}", gc.collection_count);
    let _ = writeln!(out, "   |- Total GC Time:    {} ms", gc.collection_time_ms);
    let _ = writeln!(out, "   `- Last Pause:       {} ms", gc.last_pause_ms);
}

fn write_threads(out: &mut String, snapshot: &MetricsSnapshot) {
    let t = &snapshot.threads;
    let _ = writeln!(out, "THREADS");
    let _ = writeln!(out, "   |- Current:          {}", t.current);
    let _ = writeln!(out, "   |- Peak:             {}", t.peak);
    let _ = writeln!(out, "   `- Daemon:           {}", t.daemon);
}

fn write_cpu(out: &mut String, snapshot: &MetricsSnapshot) {
    let cpu = &snapshot.cpu;
    let _ = writeln!(out, "CPU");
    let _ = writeln!(out, "   |- Process:          {}", format_percent(cpu.process_load_percent));
    let _ = writeln!(out, "   `- System:           {}", format_percent(cpu.system_load_percent));
}

fn write_system_memory(out: &mut String, snapshot: &MetricsSnapshot) {
    let sys = &snapshot.system_memory;
    if !sys.has_system_memory() {
        return;
    }
    let _ = writeln!(out, "SYSTEM MEMORY");
    let _ = writeln!(out, "   |- Used:             {}", format_bytes(sys.used_bytes()));
    let _ = writeln!(out, "   |- Total:            {}", format_bytes(sys.total_bytes()));
    let _ = writeln!(out, "   `- Usage:            {:.2}%", sys.usage_percent());
}

fn write_worker_pool(out: &mut String, snapshot: &MetricsSnapshot) {
    let _ = writeln!(out, "WORKER POOL");
    match &snapshot.worker_pool {
        WorkerPool::Elastic => {
            let _ = writeln!(out, "   `- Elastic substrate (no pool metrics available)");
        }
        WorkerPool::Bounded(pool) => {
            let _ = writeln!(out, "   |- Active:           {}", pool.active_count);
            let _ = writeln!(out, "   |- Queue Size:       {}", pool.queue_size);
            let _ = writeln!(out, "   |- Pool Size:        {}", pool.pool_size);
            let _ = writeln!(out, "   `- Completed Tasks:  {}", pool.completed_tasks);
        }
    }
}

/// Log the report, then warnings, critical issues and the throttling verdict
pub fn log_prediction(prediction: &Prediction) {
    if let Some(snapshot) = &prediction.current_metrics {
        info!("{}", build_report(snapshot, prediction));
    }

    let risk = format!("{:.2}", prediction.risk_score);

    if !prediction.warnings.is_empty() {
        warn!("Resource warnings (risk {}): {}", risk, prediction.warnings.join("; "));
    }

    if !prediction.critical_issues.is_empty() {
        error!("Critical resource issues (risk {}): {}", risk, prediction.critical_issues.join("; "));
    }

    if prediction.requires_throttling() {
        error!("Throttling required - level {}, risk score {}", prediction.level, risk);
    }
}
