//! Experiment design: what is tested, how it is powered, and how it is monitored.
//!
//! A design is immutable once monitoring begins. The monitor takes its own
//! copy and exposes no mutators.

use serde::{Deserialize, Serialize};

use seqmon_core::constants::{DEFAULT_ALPHA, DEFAULT_FUTILITY_THRESHOLD, DEFAULT_POWER};
use seqmon_core::spending::{equally_spaced, validate_fractions};
use seqmon_core::{
    BoundarySet, ComputationError, ConditionalPowerTrend, ImprovementDirection, MetricType,
    SpendingFamily,
};

use crate::error::{DesignError, InfeasibleDesignError, Result};
use crate::monitor::GuardrailDefinition;

/// Smallest effect the experiment is powered to detect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinimumDetectableEffect {
    /// Difference in metric units (e.g. 0.005 = half a percentage point).
    Absolute(f64),
    /// Fraction of the baseline mean (e.g. 0.05 = 5% lift).
    Relative(f64),
}

/// Conditional-power futility rule registered with the design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FutilityRule {
    /// Stop for futility when conditional power falls below this.
    #[serde(default = "default_futility_threshold")]
    pub threshold: f64,
    /// Assumed drift for the remaining information. Must be chosen explicitly.
    pub trend: ConditionalPowerTrend,
}

impl FutilityRule {
    /// Rule with the conventional 0.20 threshold.
    pub fn new(trend: ConditionalPowerTrend) -> Self {
        Self {
            threshold: DEFAULT_FUTILITY_THRESHOLD,
            trend,
        }
    }

    /// Set the threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Group-sequential monitoring plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialPlan {
    /// Boundary family (serialized as `method`).
    #[serde(flatten)]
    pub family: SpendingFamily,
    /// Number of planned looks K, including the final analysis.
    pub planned_looks: usize,
    /// Explicit information fractions; equally spaced when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub look_schedule: Option<Vec<f64>>,
    /// Futility monitoring; disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub futility: Option<FutilityRule>,
}

impl SequentialPlan {
    /// Plan with `planned_looks` equally spaced looks and no futility rule.
    pub fn new(family: SpendingFamily, planned_looks: usize) -> Self {
        Self {
            family,
            planned_looks,
            look_schedule: None,
            futility: None,
        }
    }

    /// Use explicit information fractions.
    pub fn with_schedule(mut self, fractions: Vec<f64>) -> Self {
        self.look_schedule = Some(fractions);
        self
    }

    /// Register a futility rule.
    pub fn with_futility(mut self, rule: FutilityRule) -> Self {
        self.futility = Some(rule);
        self
    }
}

/// A fully specified experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDesign {
    /// Experiment identifier.
    pub name: String,
    /// Free-text hypothesis.
    #[serde(default)]
    pub hypothesis: String,
    /// Metric id of the primary metric in interim snapshots.
    pub primary_metric: String,
    /// Declared type of the primary metric.
    pub metric_type: MetricType,
    /// Baseline (control) mean of the primary metric.
    pub baseline_mean: f64,
    /// Per-unit variance of the primary metric.
    ///
    /// Required for continuous metrics. Derived as p(1−p) for proportions
    /// and as the mean for counts when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_variance: Option<f64>,
    /// Minimum detectable effect.
    pub minimum_detectable_effect: MinimumDetectableEffect,
    /// Which direction counts as an improvement.
    #[serde(default)]
    pub improvement_direction: ImprovementDirection,
    /// Target power (1 − β).
    #[serde(default = "default_power")]
    pub power: f64,
    /// Overall two-sided significance level.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Fraction of units assigned to treatment.
    #[serde(default = "default_allocation")]
    pub allocation_ratio: f64,
    /// Safety metrics that stop the experiment when breached.
    #[serde(default)]
    pub guardrails: Vec<GuardrailDefinition>,
    /// Monitoring plan.
    pub sequential: SequentialPlan,
}

fn default_power() -> f64 {
    DEFAULT_POWER
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}

fn default_allocation() -> f64 {
    0.5
}

fn default_futility_threshold() -> f64 {
    DEFAULT_FUTILITY_THRESHOLD
}

impl ExperimentDesign {
    /// Design with default power, alpha and an even split.
    pub fn new(
        name: impl Into<String>,
        primary_metric: impl Into<String>,
        metric_type: MetricType,
        baseline_mean: f64,
        minimum_detectable_effect: MinimumDetectableEffect,
        sequential: SequentialPlan,
    ) -> Self {
        Self {
            name: name.into(),
            hypothesis: String::new(),
            primary_metric: primary_metric.into(),
            metric_type,
            baseline_mean,
            baseline_variance: None,
            minimum_detectable_effect,
            improvement_direction: ImprovementDirection::default(),
            power: DEFAULT_POWER,
            alpha: DEFAULT_ALPHA,
            allocation_ratio: 0.5,
            guardrails: Vec::new(),
            sequential,
        }
    }

    /// Set the hypothesis text.
    pub fn with_hypothesis(mut self, hypothesis: impl Into<String>) -> Self {
        self.hypothesis = hypothesis.into();
        self
    }

    /// Set the baseline variance.
    pub fn with_variance(mut self, variance: f64) -> Self {
        self.baseline_variance = Some(variance);
        self
    }

    /// Set the improvement direction.
    pub fn with_direction(mut self, direction: ImprovementDirection) -> Self {
        self.improvement_direction = direction;
        self
    }

    /// Set the significance level.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the target power.
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Set the fraction of units assigned to treatment.
    pub fn with_allocation(mut self, allocation_ratio: f64) -> Self {
        self.allocation_ratio = allocation_ratio;
        self
    }

    /// Add a guardrail.
    pub fn with_guardrail(mut self, guardrail: GuardrailDefinition) -> Self {
        self.guardrails.push(guardrail);
        self
    }

    /// Parse and validate a JSON design.
    pub fn from_json(json: &str) -> Result<Self> {
        let design: Self = serde_json::from_str(json)?;
        design.validate()?;
        Ok(design)
    }

    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DesignError::Empty("experiment name").into());
        }
        if self.primary_metric.trim().is_empty() {
            return Err(DesignError::Empty("primary metric").into());
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ComputationError::InvalidAlpha(self.alpha).into());
        }
        if !(self.power > 0.0 && self.power < 1.0) {
            return Err(DesignError::InvalidPower(self.power).into());
        }
        if !(self.allocation_ratio > 0.0 && self.allocation_ratio < 1.0) {
            return Err(DesignError::InvalidAllocation(self.allocation_ratio).into());
        }
        if !self.baseline_mean.is_finite() {
            return Err(DesignError::InvalidBaseline(self.baseline_mean).into());
        }
        let mde = match self.minimum_detectable_effect {
            MinimumDetectableEffect::Absolute(d) | MinimumDetectableEffect::Relative(d) => d,
        };
        if !(mde.is_finite() && mde > 0.0) {
            return Err(DesignError::InvalidEffect(mde).into());
        }
        self.variance()?;
        if let Some(rule) = &self.sequential.futility {
            if !(rule.threshold > 0.0 && rule.threshold < 1.0) {
                return Err(DesignError::InvalidFutilityThreshold(rule.threshold).into());
            }
        }
        self.sequential.family.validate()?;
        self.information_fractions()?;

        let mut seen = std::collections::BTreeSet::new();
        for g in &self.guardrails {
            g.validate()?;
            if !seen.insert(g.name.as_str()) {
                return Err(DesignError::DuplicateGuardrail(g.name.clone()).into());
            }
        }
        Ok(())
    }

    /// Absolute magnitude of the minimum detectable effect.
    pub fn absolute_effect(&self) -> f64 {
        match self.minimum_detectable_effect {
            MinimumDetectableEffect::Absolute(d) => d.abs(),
            MinimumDetectableEffect::Relative(r) => (self.baseline_mean * r).abs(),
        }
    }

    /// Treatment mean under the design alternative.
    pub fn treatment_mean(&self) -> f64 {
        self.baseline_mean + self.improvement_direction.sign() * self.absolute_effect()
    }

    /// Design alternative as a signed treatment-minus-control difference.
    pub fn signed_effect(&self) -> f64 {
        self.improvement_direction.sign() * self.absolute_effect()
    }

    /// Per-unit variance of the primary metric in the control arm.
    pub fn variance(&self) -> Result<f64> {
        let variance = match (self.metric_type, self.baseline_variance) {
            (MetricType::Proportion, given) => {
                let p = self.baseline_mean;
                if !(p > 0.0 && p < 1.0) {
                    return Err(InfeasibleDesignError::ProportionOutOfRange {
                        name: "baseline",
                        value: p,
                    }
                    .into());
                }
                given.unwrap_or(p * (1.0 - p))
            }
            (MetricType::Continuous, Some(v)) => v,
            (MetricType::Continuous, None) => {
                return Err(DesignError::MissingVariance(MetricType::Continuous).into())
            }
            (MetricType::Count, given) => given.unwrap_or(self.baseline_mean),
        };
        if !(variance.is_finite() && variance > 0.0) {
            return Err(InfeasibleDesignError::NonPositiveVariance(variance).into());
        }
        Ok(variance)
    }

    /// Number of planned looks K.
    pub fn planned_looks(&self) -> usize {
        self.sequential.planned_looks
    }

    /// Information fractions of the planned looks.
    pub fn information_fractions(&self) -> std::result::Result<Vec<f64>, ComputationError> {
        match &self.sequential.look_schedule {
            Some(fractions) => {
                if fractions.len() != self.sequential.planned_looks {
                    return Err(ComputationError::InvalidFractions(format!(
                        "{} fractions given for {} planned looks",
                        fractions.len(),
                        self.sequential.planned_looks
                    )));
                }
                validate_fractions(fractions)?;
                Ok(fractions.clone())
            }
            None => equally_spaced(self.sequential.planned_looks),
        }
    }

    /// Solve the boundaries of this design, with the futility rule attached.
    pub fn boundaries(&self) -> std::result::Result<BoundarySet, ComputationError> {
        let set = BoundarySet::solve(
            &self.sequential.family,
            &self.information_fractions()?,
            self.alpha,
        )?;
        Ok(match &self.sequential.futility {
            Some(rule) => set.with_futility(rule.threshold),
            None => set,
        })
    }

    /// Look up a guardrail by name.
    pub fn guardrail(&self, name: &str) -> Option<&GuardrailDefinition> {
        self.guardrails.iter().find(|g| g.name == name)
    }
}
