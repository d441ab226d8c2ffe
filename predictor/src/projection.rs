//! Heap usage projection

use chrono::{DateTime, Duration, Utc};

use crate::history::HistoryWindow;
use crate::snapshot::{MetricsSnapshot, ProjectedMetrics};

/// How far ahead a projection looks
pub const PROJECTION_HORIZON_MINUTES: i64 = 5;

/// Project heap usage one step ahead.
///
/// Growth is the difference between the two most recent history entries,
/// applied once to the current reading and capped at 100%. With fewer than
/// two entries the current reading is returned unchanged.
pub fn project(current: &MetricsSnapshot, history: &HistoryWindow, now: DateTime<Utc>) -> ProjectedMetrics {
    let current_heap = current.heap_usage_percent();

    let (Some(newest), Some(previous)) = (history.newest(), history.previous()) else {
        return ProjectedMetrics {
            timestamp: current.timestamp,
            heap_usage_percent: current_heap,
        };
    };

    let growth = newest.heap_usage_percent() - previous.heap_usage_percent();

    ProjectedMetrics {
        timestamp: now + Duration::minutes(PROJECTION_HORIZON_MINUTES),
        heap_usage_percent: (current_heap + growth).min(100.0),
    }
}
