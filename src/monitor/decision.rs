//! Stopping decisions and the audit trail.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use seqmon_core::{BoundaryValue, EffectEstimate, TestStatistic};

use super::guardrails::GuardrailStatus;

/// Outcome of evaluating one look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Keep collecting data.
    Continue,
    /// The primary metric crossed the efficacy boundary.
    StopSuperiority,
    /// Conditional power fell below the futility threshold.
    StopFutility,
    /// A guardrail was breached, its data was missing, or an operator
    /// stopped the experiment.
    StopSafety,
    /// The final look was reached without crossing the boundary.
    CompletedMaxDuration,
}

impl DecisionKind {
    /// Whether no further looks follow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DecisionKind::Continue)
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionKind::Continue => write!(f, "continue"),
            DecisionKind::StopSuperiority => write!(f, "stop: superiority"),
            DecisionKind::StopFutility => write!(f, "stop: futility"),
            DecisionKind::StopSafety => write!(f, "stop: safety"),
            DecisionKind::CompletedMaxDuration => write!(f, "completed at maximum duration"),
        }
    }
}

/// Sign of the observed treatment-minus-control difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectDirection {
    /// Treatment above control.
    Increase,
    /// Treatment below control.
    Decrease,
    /// No difference.
    None,
}

impl EffectDirection {
    /// Direction of `effect`.
    pub fn of(effect: f64) -> Self {
        if effect > 0.0 {
            EffectDirection::Increase
        } else if effect < 0.0 {
            EffectDirection::Decrease
        } else {
            EffectDirection::None
        }
    }
}

/// Everything the monitor concluded at one look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppingDecision {
    /// Experiment name.
    pub experiment: String,
    /// Decision.
    pub kind: DecisionKind,
    /// Look index (0 for an override before the first look).
    pub look: usize,
    /// Boundary applied at this look.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<BoundaryValue>,
    /// Primary-metric test statistic, when it could be computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistic: Option<TestStatistic>,
    /// Direction of the observed primary effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_direction: Option<EffectDirection>,
    /// Conditional power, when futility was evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_power: Option<f64>,
    /// Naive effect estimate (terminal data-driven decisions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naive_estimate: Option<EffectEstimate>,
    /// Estimate from the configured estimator (terminal data-driven decisions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_estimate: Option<EffectEstimate>,
    /// Guardrail statuses considered at this look.
    #[serde(default)]
    pub guardrails: Vec<GuardrailStatus>,
    /// Timestamp of the interim snapshot the decision is based on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Human-readable reason.
    pub justification: String,
}

impl StoppingDecision {
    /// Two-sided p-value of the primary metric, when computed.
    pub fn p_value(&self) -> Option<f64> {
        self.statistic.map(|s| s.p_value)
    }

    /// Whether this decision ends the experiment.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Interval used downstream: the adjusted estimate when available,
    /// else the naive one.
    pub fn effect_estimate(&self) -> Option<&EffectEstimate> {
        self.adjusted_estimate.as_ref().or(self.naive_estimate.as_ref())
    }
}

/// Append-only audit entry for one submission of a look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LookRecord {
    /// The look was evaluated.
    Decision(StoppingDecision),
    /// The data couldn't support the look; it may be resubmitted.
    Deferred {
        /// Look index that was deferred.
        look: usize,
        /// Snapshot timestamp; absent when the snapshot itself couldn't be fetched.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
        /// What was wrong with the data.
        reason: String,
    },
}

impl LookRecord {
    /// Look index of the record.
    pub fn look(&self) -> usize {
        match self {
            LookRecord::Decision(d) => d.look,
            LookRecord::Deferred { look, .. } => *look,
        }
    }

    /// The decision, if this record holds one.
    pub fn decision(&self) -> Option<&StoppingDecision> {
        match self {
            LookRecord::Decision(d) => Some(d),
            LookRecord::Deferred { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_kinds() {
        assert!(!DecisionKind::Continue.is_terminal());
        for kind in [
            DecisionKind::StopSuperiority,
            DecisionKind::StopFutility,
            DecisionKind::StopSafety,
            DecisionKind::CompletedMaxDuration,
        ] {
            assert!(kind.is_terminal());
        }
    }

    #[test]
    fn test_kind_serde() {
        assert_eq!(
            serde_json::to_string(&DecisionKind::StopSuperiority).unwrap(),
            "\"stop_superiority\""
        );
    }

    #[test]
    fn test_effect_direction() {
        assert_eq!(EffectDirection::of(0.3), EffectDirection::Increase);
        assert_eq!(EffectDirection::of(-1e-9), EffectDirection::Decrease);
        assert_eq!(EffectDirection::of(0.0), EffectDirection::None);
    }
}
