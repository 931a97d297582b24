use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::catalog::{Direction, Domain, MetricDefinition, MetricUnit};

/// Minimum delta that counts as a real difference for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Materiality {
    /// Delta magnitude in the metric's own unit.
    Absolute(f64),
    /// Fraction of the benchmark's magnitude (0.1 = 10%).
    Relative(f64),
}

impl Materiality {
    fn epsilon(&self, benchmark: f64) -> f64 {
        match *self {
            Materiality::Absolute(value) => value.abs(),
            Materiality::Relative(fraction) => (fraction * benchmark).abs(),
        }
    }
}

/// Per-unit materiality thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialityPolicy {
    thresholds: HashMap<MetricUnit, Materiality>,
    fallback: Materiality,
}

impl MaterialityPolicy {
    pub fn uniform(materiality: Materiality) -> Self {
        Self {
            thresholds: HashMap::new(),
            fallback: materiality,
        }
    }

    pub fn with_threshold(mut self, unit: MetricUnit, materiality: Materiality) -> Self {
        self.thresholds.insert(unit, materiality);
        self
    }

    pub fn threshold_for(&self, unit: MetricUnit) -> Materiality {
        self.thresholds.get(&unit).copied().unwrap_or(self.fallback)
    }
}

impl Default for MaterialityPolicy {
    fn default() -> Self {
        Self::uniform(Materiality::Absolute(0.0))
            .with_threshold(MetricUnit::Minutes, Materiality::Absolute(5.0))
            .with_threshold(MetricUnit::Percent, Materiality::Absolute(2.0))
            .with_threshold(MetricUnit::Ratio, Materiality::Absolute(0.1))
            .with_threshold(MetricUnit::Rate, Materiality::Absolute(0.5))
            .with_threshold(MetricUnit::Score, Materiality::Absolute(1.0))
            .with_threshold(MetricUnit::Count, Materiality::Relative(0.1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionLabel {
    Favorable,
    Unfavorable,
    Neutral,
    InsufficientData,
}

impl DirectionLabel {
    pub fn label(&self) -> &'static str {
        match self {
            DirectionLabel::Favorable => "favorable",
            DirectionLabel::Unfavorable => "unfavorable",
            DirectionLabel::Neutral => "neutral",
            DirectionLabel::InsufficientData => "insufficient data",
        }
    }
}

/// Facility-vs-benchmark comparison for one cataloged metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAssessment {
    pub metric_id: String,
    pub display_name: String,
    pub domain: Domain,
    pub unit: MetricUnit,
    pub direction: Direction,
    pub facility_value: Option<f64>,
    pub benchmark_value: Option<f64>,
    pub delta: Option<f64>,
    pub label: DirectionLabel,
}

impl MetricAssessment {
    /// Facility value as a percentage of the benchmark, when both are usable.
    pub fn percent_of_benchmark(&self) -> Option<f64> {
        match (self.facility_value, self.benchmark_value) {
            (Some(value), Some(benchmark)) if benchmark != 0.0 => Some(value / benchmark * 100.0),
            _ => None,
        }
    }
}

/// Label a facility value against its benchmark.
///
/// Non-finite inputs are treated as missing so that NaN never reaches a
/// narrative as a number.
pub fn classify(
    metric: &MetricDefinition,
    facility_value: Option<f64>,
    benchmark_value: Option<f64>,
    policy: &MaterialityPolicy,
) -> MetricAssessment {
    let facility_value = facility_value.filter(|value| value.is_finite());
    let benchmark_value = benchmark_value.filter(|value| value.is_finite());

    let (delta, label) = match (facility_value, benchmark_value) {
        (Some(value), Some(benchmark)) => {
            let delta = value - benchmark;
            let epsilon = policy.threshold_for(metric.unit).epsilon(benchmark);
            (Some(delta), label_for(metric.direction, delta, epsilon))
        }
        _ => (None, DirectionLabel::InsufficientData),
    };

    MetricAssessment {
        metric_id: metric.id.clone(),
        display_name: metric.display_name.clone(),
        domain: metric.domain,
        unit: metric.unit,
        direction: metric.direction,
        facility_value,
        benchmark_value,
        delta,
        label,
    }
}

fn label_for(direction: Direction, delta: f64, epsilon: f64) -> DirectionLabel {
    let (better, worse) = match direction {
        Direction::LowerIsBetter => (delta < -epsilon, delta > epsilon),
        Direction::HigherIsBetter => (delta > epsilon, delta < -epsilon),
        Direction::Neutral => return DirectionLabel::Neutral,
    };

    if better {
        DirectionLabel::Favorable
    } else if worse {
        DirectionLabel::Unfavorable
    } else {
        DirectionLabel::Neutral
    }
}
