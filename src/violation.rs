//! Threshold rules evaluated against coverage counters.
//!
//! Evaluation is a pure function: every rule is checked independently, in
//! the order given, and each failing rule yields one [`Violation`]. Whether
//! violations fail the run is decided by the caller.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{rate, Counters, CoverageCounter, CoverageEntity};

/// How a rule reads a number out of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// covered / total, 0 when total is 0.
    #[default]
    CoveredRatio,
    CoveredCount,
    MissedCount,
    /// missed / total, 0 when total is 0.
    MissedRatio,
    TotalCount,
}

impl ValueType {
    pub fn value(&self, counter: &CoverageCounter) -> f64 {
        match self {
            ValueType::CoveredRatio => rate(counter.covered, counter.total()),
            ValueType::CoveredCount => counter.covered as f64,
            ValueType::MissedCount => counter.missed as f64,
            ValueType::MissedRatio => rate(counter.missed, counter.total()),
            ValueType::TotalCount => counter.total() as f64,
        }
    }

    /// Whether values of this type are fractions in `[0, 1]`.
    pub fn is_ratio(&self) -> bool {
        matches!(self, ValueType::CoveredRatio | ValueType::MissedRatio)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolationRule {
    pub entity: CoverageEntity,
    pub value_type: ValueType,
    pub min: f64,
    /// Minimum number of observations (missed + covered) before the rule is
    /// judged at all.
    pub ignore_threshold: Option<u64>,
}

impl ViolationRule {
    /// A covered-ratio rule, the common case.
    pub fn ratio(entity: CoverageEntity, min: f64) -> Self {
        Self {
            entity,
            value_type: ValueType::CoveredRatio,
            min,
            ignore_threshold: None,
        }
    }

    #[must_use]
    pub fn with_ignore_threshold(mut self, threshold: u64) -> Self {
        self.ignore_threshold = Some(threshold);
        self
    }

    fn is_ignored_by_threshold(&self, counter: &CoverageCounter) -> bool {
        self.ignore_threshold
            .is_some_and(|threshold| counter.total() < threshold)
    }
}

/// A rule whose required minimum was not met.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub entity_name: String,
    pub expected_min: f64,
    pub actual: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Expected minimum: {}, actual: {}",
            self.entity_name, self.expected_min, self.actual
        )
    }
}

/// Check every rule against `counters` and collect the failures in rule
/// order. A missing counter is treated as `{missed: 0, covered: 0}`.
pub fn evaluate(rules: &[ViolationRule], counters: &Counters) -> Vec<Violation> {
    let mut violations = Vec::new();

    for rule in rules {
        let counter = counters
            .get(&rule.entity)
            .copied()
            .unwrap_or(CoverageCounter::EMPTY);

        if rule.is_ignored_by_threshold(&counter) {
            info!(
                "Coverage violation of {} was ignored because threshold={} but total={}",
                rule.entity,
                rule.ignore_threshold.unwrap_or_default(),
                counter.total()
            );
            continue;
        }

        let actual = rule.value_type.value(&counter);
        if actual < rule.min {
            violations.push(Violation {
                entity_name: rule.entity.to_string(),
                expected_min: rule.min,
                actual,
            });
        }
    }

    violations
}
