//! Configuration files and overrides flowing into the engine

use std::sync::Arc;

use headroom_predictor::config::SourceConfig;
use headroom_predictor::error::{CollectionError, ConfigError};
use headroom_predictor::{MetricsSource, PredictionEngine, PredictionLevel, PredictorConfig, SysinfoSource};
use headroom_tests::{test_setup, ManualClock, ScriptedSource, SnapshotBuilder};
use tempfile::TempDir;

const TIGHT_HEAP: &str = r#"
[thresholds.heap]
warning = 40.0
critical = 50.0
imminent = 60.0

[history]
max_size = 3
"#;

#[test]
fn test_file_thresholds_reach_the_analyzers() -> anyhow::Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let path = dir.path().join("predictor.toml");
    std::fs::write(&path, TIGHT_HEAP)?;

    let config = PredictorConfig::from_file(&path)?;
    assert_eq!(config.thresholds.cpu.warning, 70.0);

    let source = Arc::new(ScriptedSource::constant(SnapshotBuilder::new().heap_percent(55.0).build()));
    let engine = PredictionEngine::new(&config, source, Arc::new(ManualClock::at_epoch()));

    let prediction = engine.evaluate();
    assert_eq!(prediction.level, PredictionLevel::Critical);
    assert!(prediction.requires_throttling());

    for _ in 0..5 {
        engine.evaluate();
    }
    assert_eq!(engine.history_len(), 3);
    Ok(())
}

#[test]
fn test_env_overrides_apply_over_file() -> anyhow::Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let path = dir.path().join("predictor.toml");
    std::fs::write(&path, TIGHT_HEAP)?;

    let mut config = PredictorConfig::from_file(&path)?;
    config.apply_env([
        ("HEADROOM_GC_WARNING_MS".to_string(), "250".to_string()),
        ("HEADROOM_LOG_LEVEL".to_string(), "debug".to_string()),
        ("UNRELATED_VARIABLE".to_string(), "ignored".to_string()),
    ])?;
    config.validate()?;

    assert_eq!(config.thresholds.gc.warning_ms, 250);
    assert_eq!(config.thresholds.heap.warning, 40.0);
    assert_eq!(config.logging.level, "debug");

    let source = Arc::new(ScriptedSource::constant(SnapshotBuilder::new().heap_percent(10.0).gc_pause(300).build()));
    let engine = PredictionEngine::new(&config, source, Arc::new(ManualClock::at_epoch()));
    let prediction = engine.evaluate();
    assert_eq!(prediction.level, PredictionLevel::Warning);
    assert!(prediction.warnings[0].starts_with("GC pause of 300 ms"));
    Ok(())
}

#[test]
fn test_malformed_env_value_is_rejected() {
    test_setup!();
    let mut config = PredictorConfig::default();
    let result = config.apply_env([("HEADROOM_HEAP_WARNING".to_string(), "lots".to_string())]);
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_inverted_thresholds_fail_validation() -> anyhow::Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let path = dir.path().join("inverted.toml");
    std::fs::write(&path, "[thresholds.cpu]\nwarning = 90.0\ncritical = 80.0\n")?;

    let result = PredictorConfig::from_file(&path);
    assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    Ok(())
}

#[test]
fn test_unparseable_file_and_missing_file() -> anyhow::Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[thresholds.heap\nwarning = ")?;

    assert!(matches!(PredictorConfig::from_file(&path), Err(ConfigError::ParseError { .. })));
    assert!(matches!(
        PredictorConfig::from_file(dir.path().join("absent.toml")),
        Err(ConfigError::FileNotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_save_and_reload_preserves_flat_view() -> anyhow::Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("predictor.toml");

    let config = PredictorConfig::from_flat_map([("queue.warning", 20.0), ("queue.critical", 30.0)])?;
    config.save_to_file(&path)?;

    let reloaded = PredictorConfig::from_file(&path)?;
    assert_eq!(reloaded, config);
    assert_eq!(reloaded.to_flat_map()["queue.critical"], 30.0);
    Ok(())
}

#[test]
fn test_disabled_source_yields_neutral_predictions() -> anyhow::Result<()> {
    test_setup!();
    let source = SysinfoSource::new(SourceConfig { enabled: false, memory_limit_bytes: None })?;
    assert_eq!(source.collect(), Err(CollectionError::Disabled));

    let clock = Arc::new(ManualClock::at_epoch());
    let engine = PredictionEngine::new(&PredictorConfig::default(), Arc::new(source), clock);

    let prediction = engine.evaluate();
    assert_eq!(prediction.level, PredictionLevel::Safe);
    assert_eq!(prediction.risk_score, 0.0);
    assert!(prediction.current_metrics.is_none());
    assert_eq!(engine.history_len(), 0);
    Ok(())
}

#[test]
fn test_live_source_produces_a_reading() -> anyhow::Result<()> {
    test_setup!();
    let source = SysinfoSource::new(SourceConfig { enabled: true, memory_limit_bytes: Some(1 << 40) })?;
    let snapshot = source.collect()?;

    assert_eq!(snapshot.memory.heap_max_bytes(), 1 << 40);
    assert!(snapshot.threads.current >= 1);
    assert!((0.0..=100.0).contains(&snapshot.heap_usage_percent()));
    Ok(())
}
