use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use headroom_predictor::error::{CollectionError, CollectionResult};
use headroom_predictor::{MetricsSnapshot, MetricsSource};

/// One scripted outcome of `collect()`
#[derive(Debug, Clone)]
pub enum Step {
    Reading(MetricsSnapshot),
    Unavailable(CollectionError),
    Panic(&'static str),
}

/// Metrics source that replays a script.
///
/// Steps are consumed in order; once only one remains it is repeated
/// forever. An empty script reports the source as disabled.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns the same snapshot
    pub fn constant(snapshot: MetricsSnapshot) -> Self {
        Self::new([Step::Reading(snapshot)])
    }

    /// Replays the snapshots in order, repeating the last
    pub fn readings(snapshots: impl IntoIterator<Item = MetricsSnapshot>) -> Self {
        Self::new(snapshots.into_iter().map(Step::Reading))
    }

    /// Every collect reports the given error
    pub fn unavailable(reason: &str) -> Self {
        Self::new([Step::Unavailable(CollectionError::Unavailable { reason: reason.to_string() })])
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner).push_back(step);
    }

    /// Number of collect calls so far, including panicking ones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Option<Step> {
        let mut steps = self.steps.lock().unwrap_or_else(PoisonError::into_inner);
        if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        }
    }
}

impl MetricsSource for ScriptedSource {
    fn collect(&self) -> CollectionResult<MetricsSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        // Lock released before panicking so the script stays usable
        match self.next_step() {
            Some(Step::Reading(snapshot)) => Ok(snapshot),
            Some(Step::Unavailable(error)) => Err(error),
            Some(Step::Panic(message)) => panic!("{}", message),
            None => Err(CollectionError::Disabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::SnapshotBuilder;

    #[test]
    fn test_script_repeats_last_step() {
        let source = ScriptedSource::readings([
            SnapshotBuilder::new().heap_percent(10.0).build(),
            SnapshotBuilder::new().heap_percent(20.0).build(),
        ]);

        assert_eq!(source.collect().unwrap().heap_usage_percent(), 10.0);
        assert_eq!(source.collect().unwrap().heap_usage_percent(), 20.0);
        assert_eq!(source.collect().unwrap().heap_usage_percent(), 20.0);
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn test_empty_script_is_disabled() {
        let source = ScriptedSource::default();
        assert_eq!(source.collect(), Err(CollectionError::Disabled));
    }

    #[test]
    fn test_panic_step() {
        let source = ScriptedSource::new([Step::Panic("boom"), Step::Unavailable(CollectionError::Disabled)]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| source.collect()));
        assert!(result.is_err());
        assert_eq!(source.collect(), Err(CollectionError::Disabled));
    }
}
