//! Launch decisions from terminal monitoring outcomes.
//!
//! [`recommend`] is a pure function of its inputs: no clock, no randomness.

use core::fmt;

use serde::{Deserialize, Serialize};

use seqmon_core::analysis::{cochran_q, naive, Heterogeneity, SubgroupEffect};
use seqmon_core::constants::DEFAULT_CONFIDENCE_LEVEL;
use seqmon_core::{EffectEstimate, ImprovementDirection};

use crate::config::DecisionCriteria;
use crate::design::ExperimentDesign;
use crate::error::{DecisionError, Result};
use crate::monitor::{DecisionKind, GuardrailStatus, StoppingDecision};

/// Verdict on whether to ship the treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Ship it.
    Launch,
    /// Don't ship it.
    NoLaunch,
    /// Evidence is significant but inconsistent across subgroups; investigate.
    Hold,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Launch => write!(f, "LAUNCH"),
            Recommendation::NoLaunch => write!(f, "NO LAUNCH"),
            Recommendation::Hold => write!(f, "HOLD"),
        }
    }
}

/// Recommendation with everything it was based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    /// Experiment name.
    pub experiment: String,
    /// Verdict.
    pub recommendation: Recommendation,
    /// Terminal decision kind it was derived from.
    pub decision_kind: DecisionKind,
    /// Effect interval used (bias-adjusted when available).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_interval: Option<EffectEstimate>,
    /// Subgroup heterogeneity, when at least two subgroups were given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heterogeneity: Option<Heterogeneity>,
    /// Reasons, most important first.
    pub reasons: Vec<String>,
}

/// Turn a terminal stopping decision into a launch recommendation.
///
/// `guardrails` are checked in addition to the statuses the decision
/// already carries. Effects are oriented by the design's improvement
/// direction before comparing against `criteria.practical_threshold`.
pub fn recommend(
    design: &ExperimentDesign,
    terminal: &StoppingDecision,
    guardrails: &[GuardrailStatus],
    subgroups: &[SubgroupEffect],
    criteria: &DecisionCriteria,
) -> Result<RecommendationRecord> {
    if !terminal.kind.is_terminal() {
        return Err(DecisionError::NotTerminal(terminal.kind).into());
    }

    let mut no_launch = Vec::new();
    let mut hold = Vec::new();
    let mut supporting = Vec::new();

    for g in guardrails.iter().chain(&terminal.guardrails).filter(|g| g.violated) {
        let reason = match g.observed {
            Some(x) => format!("guardrail '{}' violated ({x:.4} vs {:.4})", g.name, g.threshold),
            None => format!("guardrail '{}' has no data", g.name),
        };
        if !no_launch.contains(&reason) {
            no_launch.push(reason);
        }
    }

    let significant = match terminal.kind {
        DecisionKind::StopSuperiority => {
            supporting.push("crossed the superiority boundary".to_string());
            true
        }
        DecisionKind::CompletedMaxDuration => match terminal.p_value() {
            Some(p) if p < design.alpha => {
                supporting.push(format!("completed with p = {p:.4} < {}", design.alpha));
                true
            }
            Some(p) => {
                no_launch.push(format!("completed without significance (p = {p:.4})"));
                false
            }
            None => {
                no_launch.push("completed without a primary-metric result".to_string());
                false
            }
        },
        DecisionKind::StopFutility => {
            no_launch.push("stopped for futility".to_string());
            false
        }
        DecisionKind::StopSafety => {
            no_launch.push(format!("stopped for safety: {}", terminal.justification));
            false
        }
        DecisionKind::Continue => false,
    };

    let effect_interval = match terminal.effect_estimate() {
        Some(e) => Some(*e),
        None => match terminal.statistic {
            Some(s) => Some(naive(s.effect, s.standard_error, DEFAULT_CONFIDENCE_LEVEL)?),
            None => None,
        },
    };

    let sign = design.improvement_direction.sign();
    if significant {
        match &effect_interval {
            Some(e) => {
                let (lower, upper) = oriented(e, design.improvement_direction);
                let floor = criteria.practical_threshold.max(0.0);
                if sign * e.effect < 0.0 {
                    no_launch.push(format!(
                        "effect {:.4} is significant in the harmful direction",
                        e.effect
                    ));
                } else if lower <= floor {
                    no_launch.push(format!(
                        "interval [{lower:.4}, {upper:.4}] reaches below the practical threshold {floor:.4}"
                    ));
                } else {
                    supporting.push(format!(
                        "interval [{lower:.4}, {upper:.4}] lies above {floor:.4}"
                    ));
                }
            }
            None => no_launch.push("no effect estimate available".to_string()),
        }
    }

    let heterogeneity = if subgroups.len() >= 2 {
        Some(cochran_q(subgroups)?)
    } else {
        None
    };
    if let Some(h) = &heterogeneity {
        if h.p_value < criteria.heterogeneity_p_value && h.i_squared > criteria.max_i_squared {
            hold.push(format!(
                "subgroup effects are heterogeneous (Q = {:.2}, p = {:.4}, I² = {:.0}%)",
                h.q,
                h.p_value,
                100.0 * h.i_squared
            ));
        }
    }
    for s in subgroups {
        let conflicting = if sign > 0.0 { s.is_negative() } else { s.is_positive() };
        if conflicting {
            hold.push(format!(
                "subgroup '{}' shows an effect in the opposite direction ({:.4})",
                s.name, s.effect
            ));
        }
    }

    let (recommendation, reasons) = if !no_launch.is_empty() {
        (Recommendation::NoLaunch, no_launch)
    } else if !hold.is_empty() {
        (Recommendation::Hold, hold)
    } else {
        (Recommendation::Launch, supporting)
    };

    tracing::info!(
        experiment = %design.name,
        recommendation = %recommendation,
        kind = %terminal.kind,
        "recommendation"
    );

    Ok(RecommendationRecord {
        experiment: design.name.clone(),
        recommendation,
        decision_kind: terminal.kind,
        effect_interval,
        heterogeneity,
        reasons,
    })
}

/// Interval bounds in the improvement direction.
fn oriented(e: &EffectEstimate, direction: ImprovementDirection) -> (f64, f64) {
    match direction {
        ImprovementDirection::HigherIsBetter => (e.lower, e.upper),
        ImprovementDirection::LowerIsBetter => (-e.upper, -e.lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{MinimumDetectableEffect, SequentialPlan};
    use crate::error::Error;
    use seqmon_core::{EffectEstimator, MetricType, SpendingFamily};

    fn design() -> ExperimentDesign {
        ExperimentDesign::new(
            "checkout",
            "conversion",
            MetricType::Proportion,
            0.10,
            MinimumDetectableEffect::Relative(0.1),
            SequentialPlan::new(SpendingFamily::ObrienFleming, 4),
        )
    }

    fn decision(kind: DecisionKind, effect: f64, lower: f64, upper: f64) -> StoppingDecision {
        StoppingDecision {
            experiment: "checkout".into(),
            kind,
            look: 2,
            boundary: None,
            statistic: None,
            effect_direction: None,
            conditional_power: None,
            naive_estimate: None,
            adjusted_estimate: Some(EffectEstimate {
                estimator: EffectEstimator::MedianUnbiased,
                effect,
                lower,
                upper,
                level: 0.95,
            }),
            guardrails: Vec::new(),
            timestamp: None,
            justification: String::new(),
        }
    }

    #[test]
    fn test_launch() {
        let d = decision(DecisionKind::StopSuperiority, 0.012, 0.004, 0.020);
        let r = recommend(&design(), &d, &[], &[], &DecisionCriteria::default()).unwrap();
        assert_eq!(r.recommendation, Recommendation::Launch);
    }

    #[test]
    fn test_continue_rejected() {
        let d = decision(DecisionKind::Continue, 0.0, -0.01, 0.01);
        assert!(matches!(
            recommend(&design(), &d, &[], &[], &DecisionCriteria::default()),
            Err(Error::Decision(DecisionError::NotTerminal(DecisionKind::Continue)))
        ));
    }

    #[test]
    fn test_practical_threshold() {
        let d = decision(DecisionKind::StopSuperiority, 0.012, 0.004, 0.020);
        let criteria = DecisionCriteria::new().practical_threshold(0.005);
        let r = recommend(&design(), &d, &[], &[], &criteria).unwrap();
        assert_eq!(r.recommendation, Recommendation::NoLaunch);
    }

    #[test]
    fn test_lower_is_better_orientation() {
        let d = decision(DecisionKind::StopSuperiority, -0.012, -0.020, -0.004);
        let lower_better = design().with_direction(ImprovementDirection::LowerIsBetter);
        let r = recommend(&lower_better, &d, &[], &[], &DecisionCriteria::default()).unwrap();
        assert_eq!(r.recommendation, Recommendation::Launch);

        let r = recommend(&design(), &d, &[], &[], &DecisionCriteria::default()).unwrap();
        assert_eq!(r.recommendation, Recommendation::NoLaunch);
        assert!(r.reasons[0].contains("harmful"));
    }

    #[test]
    fn test_conflicting_subgroup_holds() {
        let d = decision(DecisionKind::StopSuperiority, 0.012, 0.004, 0.020);
        let subgroups = [
            SubgroupEffect::new("desktop", 0.020, 0.004),
            SubgroupEffect::new("mobile", -0.015, 0.005),
        ];
        let r = recommend(&design(), &d, &[], &subgroups, &DecisionCriteria::default()).unwrap();
        assert_eq!(r.recommendation, Recommendation::Hold);
        assert!(r.heterogeneity.is_some());
    }
}
