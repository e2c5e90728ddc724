//! Guardrail metrics: safety limits checked before the primary metric.

use serde::{Deserialize, Serialize};

use crate::design::ExperimentDesign;
use crate::error::DesignError;
use crate::interim::InterimStatistics;

/// Which side of the threshold is unsafe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailDirection {
    /// Violated when the observed value exceeds the threshold
    /// (e.g. error rate, latency).
    Maximum,
    /// Violated when the observed value falls below the threshold
    /// (e.g. order value, retention).
    Minimum,
}

/// How the observed value is derived from the interim aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailMeasure {
    /// `(treatment − control) / control`.
    RelativeChange,
    /// `treatment − control`.
    AbsoluteDifference,
    /// Treatment mean on its own.
    TreatmentMean,
}

/// A registered safety limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailDefinition {
    /// Unique guardrail name.
    pub name: String,
    /// Metric id in interim snapshots.
    pub metric: String,
    /// Limit on the observed value.
    pub threshold: f64,
    /// Which side of the limit is unsafe.
    pub direction: GuardrailDirection,
    /// How the observed value is computed.
    pub measure: GuardrailMeasure,
}

impl GuardrailDefinition {
    /// Construct a guardrail.
    pub fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        threshold: f64,
        direction: GuardrailDirection,
        measure: GuardrailMeasure,
    ) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            threshold,
            direction,
            measure,
        }
    }

    /// Reject empty identifiers and non-finite thresholds.
    pub fn validate(&self) -> Result<(), DesignError> {
        let invalid = |reason: &str| DesignError::InvalidGuardrail {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.metric.trim().is_empty() {
            return Err(invalid("metric must not be empty"));
        }
        if !self.threshold.is_finite() {
            return Err(invalid("threshold must be finite"));
        }
        Ok(())
    }

    /// Observed value in `interim`, or `None` when the metric is missing or
    /// an arm has no data.
    pub fn observe(&self, interim: &InterimStatistics) -> Option<f64> {
        let stats = interim.metrics.get(&self.metric)?;
        if stats.treatment.count == 0 {
            return None;
        }
        let treatment = stats.treatment.mean();
        if self.measure == GuardrailMeasure::TreatmentMean {
            return Some(treatment);
        }
        if stats.control.count == 0 {
            return None;
        }
        let control = stats.control.mean();
        match self.measure {
            GuardrailMeasure::RelativeChange if control == 0.0 => None,
            GuardrailMeasure::RelativeChange => Some((treatment - control) / control),
            _ => Some(treatment - control),
        }
    }

    /// Compare `observed` with the threshold.
    ///
    /// A missing observation counts as a violation.
    pub fn evaluate(&self, observed: Option<f64>) -> GuardrailStatus {
        let violated = match observed {
            Some(x) if x.is_finite() => match self.direction {
                GuardrailDirection::Maximum => x > self.threshold,
                GuardrailDirection::Minimum => x < self.threshold,
            },
            _ => true,
        };
        GuardrailStatus {
            name: self.name.clone(),
            observed: observed.filter(|x| x.is_finite()),
            threshold: self.threshold,
            violated,
        }
    }
}

/// Outcome of one guardrail check at one look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailStatus {
    /// Guardrail name.
    pub name: String,
    /// Observed value; `None` when the data was missing.
    pub observed: Option<f64>,
    /// Threshold it was compared against.
    pub threshold: f64,
    /// Whether the limit was breached (or data was missing).
    pub violated: bool,
}

impl GuardrailStatus {
    /// Whether the status reflects missing data rather than a measurement.
    pub fn is_missing(&self) -> bool {
        self.observed.is_none()
    }
}

/// Status of every guardrail registered with `design`, in registration order.
pub fn evaluate_guardrails(design: &ExperimentDesign, interim: &InterimStatistics) -> Vec<GuardrailStatus> {
    design
        .guardrails
        .iter()
        .map(|g| g.evaluate(g.observe(interim)))
        .collect()
}
