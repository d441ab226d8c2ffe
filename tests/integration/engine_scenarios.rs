//! End-to-end evaluation scenarios against scripted metrics

use std::sync::Arc;

use chrono::Duration;
use headroom_predictor::error::CollectionError;
use headroom_predictor::{Clock, PredictionEngine, PredictionLevel, PredictorConfig};
use headroom_tests::{test_setup, ManualClock, ScriptedSource, SnapshotBuilder, Step};
use proptest::prelude::*;

fn engine_with(source: ScriptedSource) -> (PredictionEngine, Arc<ScriptedSource>, Arc<ManualClock>) {
    let source = Arc::new(source);
    let clock = Arc::new(ManualClock::at_epoch());
    let engine = PredictionEngine::new(&PredictorConfig::default(), source.clone(), clock.clone());
    (engine, source, clock)
}

#[test]
fn test_imminent_heap_requires_throttling() {
    test_setup!();
    let snapshot = SnapshotBuilder::new().heap_percent(96.0).cpu(50.0).threads(20).gc_pause(0).build();
    let (engine, _, _) = engine_with(ScriptedSource::constant(snapshot));

    let prediction = engine.evaluate();

    assert_eq!(prediction.level, PredictionLevel::Imminent);
    assert!(prediction.risk_score >= 0.95);
    assert_eq!(prediction.critical_issues.len(), 1);
    assert!(prediction.critical_issues[0].contains("96.00%"));
    assert!(prediction.warnings.is_empty());
    assert!(prediction.requires_throttling());
    assert!(prediction.throttle_signal().throttle_required);
}

#[test]
fn test_quiet_process_is_safe() {
    test_setup!();
    let snapshot = SnapshotBuilder::new().heap_percent(45.0).cpu(20.0).threads(12).bounded_pool(3).build();
    let (engine, _, _) = engine_with(ScriptedSource::constant(snapshot));

    let prediction = engine.evaluate();

    assert_eq!(prediction.level, PredictionLevel::Safe);
    assert!(prediction.risk_score < 0.5);
    assert!(!prediction.requires_throttling());
}

#[test]
fn test_everything_critical_still_caps_risk() {
    test_setup!();
    let snapshot = SnapshotBuilder::new()
        .heap_percent(99.0)
        .cpu(97.0)
        .threads(150)
        .gc_pause(9000)
        .bounded_pool(500)
        .build();
    let (engine, _, _) = engine_with(ScriptedSource::constant(snapshot));

    let prediction = engine.evaluate();

    assert_eq!(prediction.level, PredictionLevel::Imminent);
    assert_eq!(prediction.risk_score, 0.95);
    assert!(prediction.risk_score <= 1.0);
    // heap, cpu, threads, gc, queue, in evaluation order
    assert_eq!(prediction.critical_issues.len(), 5);
    assert!(prediction.critical_issues[0].starts_with("Heap"));
    assert!(prediction.critical_issues[1].starts_with("CPU"));
    assert!(prediction.critical_issues[2].starts_with("Thread"));
    assert!(prediction.critical_issues[3].starts_with("GC"));
    assert!(prediction.critical_issues[4].starts_with("Worker pool"));
}

#[test]
fn test_warnings_take_max_not_sum() {
    test_setup!();
    let snapshot = SnapshotBuilder::new().heap_percent(30.0).cpu(72.0).gc_pause(2000).build();
    let (engine, _, _) = engine_with(ScriptedSource::constant(snapshot));

    let prediction = engine.evaluate();

    assert_eq!(prediction.level, PredictionLevel::Warning);
    assert_eq!(prediction.risk_score, 0.4);
    assert_eq!(prediction.warnings.len(), 2);
}

#[test]
fn test_elastic_pool_is_inert() {
    test_setup!();
    let elastic = SnapshotBuilder::new().heap_percent(30.0).elastic_pool().build();
    let (engine, _, _) = engine_with(ScriptedSource::constant(elastic));

    let prediction = engine.evaluate();
    assert!(prediction.warnings.iter().all(|w| !w.contains("queue")));
    assert_eq!(prediction.health_summary().warning_count, 0);
}

#[test]
fn test_outage_does_not_touch_history() {
    test_setup!();
    let reading = SnapshotBuilder::new().heap_percent(60.0).build();
    let (engine, source, clock) = engine_with(ScriptedSource::new([
        Step::Reading(reading.clone()),
        Step::Unavailable(CollectionError::Unavailable { reason: "agent restarting".to_string() }),
        Step::Reading(reading),
    ]));

    engine.evaluate();
    assert_eq!(engine.history_len(), 1);

    clock.advance(Duration::seconds(10));
    let outage = engine.evaluate();
    assert_eq!(outage.level, PredictionLevel::Safe);
    assert_eq!(outage.risk_score, 0.0);
    assert!(outage.warnings.is_empty() && outage.critical_issues.is_empty());
    assert!(outage.current_metrics.is_none());
    assert!(outage.projected_metrics.is_none());
    assert_eq!(outage.timestamp, clock.now());
    assert_eq!(engine.history_len(), 1);

    engine.evaluate();
    assert_eq!(engine.history_len(), 2);
    assert_eq!(source.calls(), 3);
}

#[test]
fn test_single_spike_flips_level_both_ways() {
    test_setup!();
    let (engine, _, _) = engine_with(ScriptedSource::readings([
        SnapshotBuilder::new().heap_percent(30.0).build(),
        SnapshotBuilder::new().heap_percent(96.0).build(),
        SnapshotBuilder::new().heap_percent(30.0).build(),
    ]));

    let levels: Vec<_> = (0..3).map(|_| engine.evaluate()).collect();
    assert_eq!(levels[0].level, PredictionLevel::Safe);
    assert_eq!(levels[1].level, PredictionLevel::Imminent);
    assert_eq!(levels[2].level, PredictionLevel::Safe);

    // no memory of the spike: oldest and newest are both 30%
    let recovered = &levels[2];
    assert!(recovered.critical_issues.is_empty());
    assert!(recovered.warnings.is_empty());
    assert!(recovered.risk_score < 0.5);
    assert!(!recovered.requires_throttling());
}

#[test]
fn test_heap_ramp_triggers_trend_and_projection() {
    test_setup!();
    let builder = SnapshotBuilder::new().cpu(10.0);
    let (engine, _, clock) = engine_with(ScriptedSource::readings([
        builder.clone().heap_percent(40.0).build(),
        builder.clone().heap_percent(45.0).build(),
        builder.clone().heap_percent(55.0).build(),
    ]));

    let first = engine.evaluate();
    assert_eq!(first.projected_metrics.unwrap().heap_usage_percent, 40.0);

    let second = engine.evaluate();
    assert_eq!(second.projected_metrics.unwrap().heap_usage_percent, 50.0);
    assert!(second.warnings.is_empty());

    let third = engine.evaluate();
    assert_eq!(third.level, PredictionLevel::Warning);
    assert_eq!(third.risk_score, 0.4);
    assert!(third.warnings[0].contains("+15.00%"));

    let projected = third.projected_metrics.unwrap();
    assert_eq!(projected.heap_usage_percent, 65.0);
    assert_eq!(projected.timestamp, clock.now() + Duration::minutes(5));
}

#[test]
fn test_projection_from_documented_example() {
    test_setup!();
    let (engine, _, _) = engine_with(ScriptedSource::readings([
        SnapshotBuilder::new().heap_percent(50.0).build(),
        SnapshotBuilder::new().heap_percent(60.0).build(),
        SnapshotBuilder::new().heap_percent(65.0).build(),
    ]));

    engine.evaluate();
    engine.evaluate();
    let prediction = engine.evaluate();

    // growth between the two newest entries (60 -> 65) applied to 65
    assert_eq!(prediction.projected_metrics.unwrap().heap_usage_percent, 70.0);
}

#[test]
fn test_thread_peak_note() {
    test_setup!();
    let snapshot = SnapshotBuilder::new().threads(10).peak_threads(40).build();
    let (engine, _, _) = engine_with(ScriptedSource::constant(snapshot));

    let prediction = engine.evaluate();
    assert_eq!(prediction.level, PredictionLevel::Safe);
    assert_eq!(prediction.warnings.len(), 1);
    assert!(prediction.warnings[0].contains("Peak threads (40)"));
}

#[test]
fn test_custom_thresholds_from_flat_map() {
    test_setup!();
    let config = PredictorConfig::from_flat_map([("heap.warning", 40.0), ("heap.critical", 50.0)]).unwrap();
    let source = Arc::new(ScriptedSource::constant(SnapshotBuilder::new().heap_percent(45.0).build()));
    let engine = PredictionEngine::new(&config, source, Arc::new(ManualClock::at_epoch()));

    let prediction = engine.evaluate();
    assert_eq!(prediction.level, PredictionLevel::Warning);
    assert_eq!(prediction.risk_score, 0.5);
}

proptest! {
    #[test]
    fn prop_history_never_exceeds_capacity(capacity in 1usize..20, evaluations in 0usize..60) {
        let mut config = PredictorConfig::default();
        config.history.max_size = capacity;
        let source = Arc::new(ScriptedSource::constant(SnapshotBuilder::new().build()));
        let engine = PredictionEngine::new(&config, source, Arc::new(ManualClock::at_epoch()));

        for _ in 0..evaluations {
            engine.evaluate();
            prop_assert!(engine.history_len() <= capacity);
        }
        prop_assert_eq!(engine.history_len(), evaluations.min(capacity));
    }

    #[test]
    fn prop_risk_score_stays_in_unit_interval(
        heap in 0.0f64..=100.0,
        cpu in 0.0f64..=100.0,
        threads in 0u32..500,
        pause in 0u64..20_000,
        queue in 0u32..500,
    ) {
        let snapshot = SnapshotBuilder::new()
            .heap_percent(heap)
            .cpu(cpu)
            .threads(threads)
            .gc_pause(pause)
            .bounded_pool(queue)
            .build();
        let source = Arc::new(ScriptedSource::constant(snapshot));
        let engine = PredictionEngine::new(&PredictorConfig::default(), source, Arc::new(ManualClock::at_epoch()));

        let prediction = engine.evaluate();
        prop_assert!((0.0..=1.0).contains(&prediction.risk_score));
        prop_assert_eq!(prediction.requires_throttling(), prediction.level >= PredictionLevel::Critical);
        if heap >= 95.0 {
            prop_assert_eq!(prediction.level, PredictionLevel::Imminent);
        }
    }
}
