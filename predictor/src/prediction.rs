//! Risk levels, analyzer verdicts and the composite prediction
//!
//! Every analyzer returns an immutable [`PartialVerdict`]. The engine folds
//! them with [`PartialVerdict::merge`], a pure reducer: messages are
//! concatenated in evaluation order, the level is the highest by rank and the
//! risk score is the maximum contribution (never a sum).

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::snapshot::{MetricsSnapshot, ProjectedMetrics};

/// Severity of a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionLevel {
    /// No issues detected
    Safe,
    /// Approaching thresholds
    Warning,
    /// High risk of issues
    Critical,
    /// Crash or freeze likely soon
    Imminent,
}

impl PredictionLevel {
    /// Explicit severity rank used for ordering
    pub const fn rank(self) -> u8 {
        match self {
            Self::Safe => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Imminent => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Imminent => "IMMINENT",
        }
    }

    /// The more severe of two levels
    pub fn max_of(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl PartialOrd for PredictionLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PredictionLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for PredictionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analyzer's contribution before composition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialVerdict {
    pub warnings: Vec<String>,
    pub critical_issues: Vec<String>,
    pub risk_score: f64,
    pub level: PredictionLevel,
}

impl PartialVerdict {
    /// Identity of the fold: SAFE, zero risk, no messages
    pub fn neutral() -> Self {
        Self::safe(0.0)
    }

    /// Measured and found safe
    pub fn safe(risk_score: f64) -> Self {
        Self {
            warnings: Vec::new(),
            critical_issues: Vec::new(),
            risk_score,
            level: PredictionLevel::Safe,
        }
    }

    /// WARNING level with a warning message
    pub fn warning(message: impl Into<String>, risk_score: f64) -> Self {
        Self {
            warnings: vec![message.into()],
            critical_issues: Vec::new(),
            risk_score,
            level: PredictionLevel::Warning,
        }
    }

    /// CRITICAL level with a critical issue
    pub fn critical(message: impl Into<String>, risk_score: f64) -> Self {
        Self {
            warnings: Vec::new(),
            critical_issues: vec![message.into()],
            risk_score,
            level: PredictionLevel::Critical,
        }
    }

    /// IMMINENT level with a critical issue
    pub fn imminent(message: impl Into<String>, risk_score: f64) -> Self {
        Self {
            level: PredictionLevel::Imminent,
            ..Self::critical(message, risk_score)
        }
    }

    /// Attach an informational warning that leaves level and score alone
    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }

    /// Pure reducer combining two verdicts
    pub fn merge(mut self, other: PartialVerdict) -> Self {
        self.warnings.extend(other.warnings);
        self.critical_issues.extend(other.critical_issues);
        self.risk_score = self.risk_score.max(other.risk_score);
        self.level = self.level.max_of(other.level);
        self
    }

    /// Fold any number of verdicts, starting from [`PartialVerdict::neutral`]
    pub fn fold<I>(verdicts: I) -> Self
    where
        I: IntoIterator<Item = PartialVerdict>,
    {
        verdicts.into_iter().fold(Self::neutral(), Self::merge)
    }
}

/// Composite result of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub timestamp: DateTime<Utc>,
    pub level: PredictionLevel,
    /// Risk in [0, 1]
    pub risk_score: f64,
    pub warnings: Vec<String>,
    pub critical_issues: Vec<String>,
    /// Snapshot the verdict was computed from; absent when the sample was unavailable
    pub current_metrics: Option<MetricsSnapshot>,
    /// Heap-only projection
    pub projected_metrics: Option<ProjectedMetrics>,
}

impl Prediction {
    /// Neutral prediction for a tick without data
    pub fn unavailable(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            level: PredictionLevel::Safe,
            risk_score: 0.0,
            warnings: Vec::new(),
            critical_issues: Vec::new(),
            current_metrics: None,
            projected_metrics: None,
        }
    }

    /// Assemble a prediction from a folded verdict, clamping the risk to 1.0
    pub fn from_verdict(
        timestamp: DateTime<Utc>,
        verdict: PartialVerdict,
        current: MetricsSnapshot,
        projected: ProjectedMetrics,
    ) -> Self {
        Self {
            timestamp,
            level: verdict.level,
            risk_score: verdict.risk_score.clamp(0.0, 1.0),
            warnings: verdict.warnings,
            critical_issues: verdict.critical_issues,
            current_metrics: Some(current),
            projected_metrics: Some(projected),
        }
    }

    /// True when an external load-shedding mechanism should kick in
    pub fn requires_throttling(&self) -> bool {
        matches!(self.level, PredictionLevel::Critical | PredictionLevel::Imminent)
    }

    pub fn throttle_signal(&self) -> ThrottleSignal {
        ThrottleSignal {
            throttle_required: self.requires_throttling(),
            level: self.level,
            risk_score: self.risk_score,
            critical_issues: self.critical_issues.clone(),
        }
    }

    pub fn health_summary(&self) -> HealthSummary {
        let current = self.current_metrics.as_ref();
        HealthSummary {
            level: self.level,
            risk_score: self.risk_score,
            heap_usage_percent: current.map_or(0.0, |m| m.heap_usage_percent()),
            cpu_usage_percent: current.and_then(|m| m.cpu.process_load_percent).unwrap_or(0.0),
            thread_count: current.map_or(0, |m| m.threads.current),
            warning_count: self.warnings.len(),
            critical_issue_count: self.critical_issues.len(),
        }
    }
}

/// Throttling recommendation for load-shedding consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThrottleSignal {
    pub throttle_required: bool,
    pub level: PredictionLevel,
    pub risk_score: f64,
    pub critical_issues: Vec<String>,
}

/// Compact health view of a prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub level: PredictionLevel,
    pub risk_score: f64,
    pub heap_usage_percent: f64,
    pub cpu_usage_percent: f64,
    pub thread_count: u32,
    pub warning_count: usize,
    pub critical_issue_count: usize,
}
