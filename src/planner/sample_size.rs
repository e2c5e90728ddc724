//! Fixed-horizon sample size by metric type.
//!
//! Allocation ratio `r = n_t / n_c = f / (1 − f)` where `f` is the fraction
//! of units assigned to treatment. Each formula gives the control-arm size;
//! the treatment arm is `r·n_c`.

use serde::{Deserialize, Serialize};

use seqmon_core::math::{normal_quantile, two_sided_critical};
use seqmon_core::MetricType;

use crate::design::ExperimentDesign;
use crate::error::{InfeasibleDesignError, Result};

/// Minimum per-arm size for the t-test's normal approximation.
const MIN_CONTINUOUS_SAMPLE: u64 = 30;

/// Minimum Poisson rate for the normal approximation.
const MIN_POISSON_RATE: f64 = 5.0;

/// Fixed-horizon sample size for the primary metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedHorizonSize {
    /// Metric type the size was computed for.
    pub metric_type: MetricType,
    /// Control-arm units.
    pub control: u64,
    /// Treatment-arm units.
    pub treatment: u64,
    /// Whether the normal-approximation rule of thumb holds at this size.
    pub assumptions_met: bool,
    /// Smallest per-arm size at which the approximation is adequate, when
    /// the rule is size-based.
    pub min_for_normal_approximation: Option<u64>,
    /// Caveats to report with the plan.
    pub warnings: Vec<String>,
}

impl FixedHorizonSize {
    /// Units across both arms.
    pub fn total(&self) -> u64 {
        self.control + self.treatment
    }
}

/// Sample size of a single-look test with the design's α and power.
///
/// `pooled` selects the pooled null standard error for proportions.
pub fn fixed_horizon(design: &ExperimentDesign, pooled: bool) -> Result<FixedHorizonSize> {
    let z_alpha = two_sided_critical(design.alpha);
    let z_beta = normal_quantile(design.power);
    let r = design.allocation_ratio / (1.0 - design.allocation_ratio);
    let delta = design.absolute_effect();
    let baseline = design.baseline_mean;
    let alternative = design.treatment_mean();
    let mut warnings = Vec::new();

    let (n_control, assumptions_met, min_n) = match design.metric_type {
        MetricType::Proportion => {
            let p1 = baseline;
            let p2 = alternative;
            design.variance()?;
            if !(p2 > 0.0 && p2 < 1.0) {
                return Err(InfeasibleDesignError::ProportionOutOfRange {
                    name: "treatment",
                    value: p2,
                }
                .into());
            }
            let alt_se = (p1 * (1.0 - p1) + p2 * (1.0 - p2) / r).sqrt();
            let n = if pooled {
                let p_bar = (p1 + r * p2) / (1.0 + r);
                let null_se = (p_bar * (1.0 - p_bar) * (1.0 + 1.0 / r)).sqrt();
                ((z_alpha * null_se + z_beta * alt_se) / delta).powi(2)
            } else {
                ((z_alpha + z_beta) * alt_se / delta).powi(2)
            };
            let min_n = [5.0 / p1, 5.0 / (1.0 - p1), 5.0 / p2, 5.0 / (1.0 - p2)]
                .into_iter()
                .fold(0.0_f64, f64::max)
                .ceil();
            let smaller_arm = n.min(r * n);
            (n, smaller_arm >= min_n, Some(min_n as u64))
        }
        MetricType::Continuous => {
            let sigma = design.variance()?.sqrt();
            let n = ((z_alpha + z_beta) * sigma / delta).powi(2) * (1.0 + 1.0 / r);
            let smaller_arm = n.min(r * n).ceil() as u64;
            (n, smaller_arm >= MIN_CONTINUOUS_SAMPLE, Some(MIN_CONTINUOUS_SAMPLE))
        }
        MetricType::Count => {
            let (l1, l2) = (baseline, alternative);
            if !(l1 > 0.0 && l2 > 0.0) {
                return Err(InfeasibleDesignError::NonPositiveVariance(l1.min(l2)).into());
            }
            // Extra-Poisson variation scales the required size.
            let dispersion = design.variance()? / l1;
            let l_bar = (l1 + r * l2) / (1.0 + r);
            let null_se = (l_bar * (1.0 + 1.0 / r)).sqrt();
            let alt_se = (l1 + l2 / r).sqrt();
            let n = ((z_alpha * null_se + z_beta * alt_se) / delta).powi(2) * dispersion.max(1.0);
            (n, l1 >= MIN_POISSON_RATE && l2 >= MIN_POISSON_RATE, None)
        }
    };

    if !assumptions_met {
        warnings.push(match design.metric_type {
            MetricType::Proportion => {
                "normal approximation may be inadequate; consider exact methods or a larger effect"
                    .to_string()
            }
            MetricType::Continuous => {
                "small sample may violate t-test assumptions; consider non-parametric methods"
                    .to_string()
            }
            MetricType::Count => {
                "Poisson rates below 5 may require exact methods".to_string()
            }
        });
    }

    let control = n_control.ceil() as u64;
    let treatment = (r * n_control).ceil() as u64;
    Ok(FixedHorizonSize {
        metric_type: design.metric_type,
        control,
        treatment,
        assumptions_met,
        min_for_normal_approximation: min_n,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{MinimumDetectableEffect, SequentialPlan};
    use crate::error::Error;
    use seqmon_core::SpendingFamily;

    fn design(metric_type: MetricType, baseline: f64, mde: MinimumDetectableEffect) -> ExperimentDesign {
        ExperimentDesign::new(
            "t",
            "m",
            metric_type,
            baseline,
            mde,
            SequentialPlan::new(SpendingFamily::ObrienFleming, 1),
        )
    }

    #[test]
    fn test_two_proportion_equal_allocation() {
        let d = design(MetricType::Proportion, 0.10, MinimumDetectableEffect::Relative(0.1));
        let n = fixed_horizon(&d, true).unwrap();
        assert_eq!(n.control, 14751);
        assert_eq!(n.treatment, 14751);
        assert!(n.assumptions_met);
        assert_eq!(n.total(), 29502);

        let unpooled = fixed_horizon(&d, false).unwrap();
        assert_eq!(unpooled.control, 14749);
    }

    #[test]
    fn test_unequal_allocation() {
        let d = design(MetricType::Proportion, 0.10, MinimumDetectableEffect::Relative(0.1))
            .with_allocation(0.4);
        let n = fixed_horizon(&d, true).unwrap();
        assert_eq!(n.control, 18377);
        assert_eq!(n.treatment, 12251);
    }

    #[test]
    fn test_continuous() {
        let d = design(MetricType::Continuous, 85.0, MinimumDetectableEffect::Absolute(2.0))
            .with_variance(900.0);
        let n = fixed_horizon(&d, true).unwrap();
        assert_eq!(n.control, 3532);
        assert!(n.assumptions_met);
    }

    #[test]
    fn test_count_flags_small_rates() {
        let d = design(MetricType::Count, 2.0, MinimumDetectableEffect::Relative(0.1));
        let n = fixed_horizon(&d, true).unwrap();
        assert_eq!(n.control, 825);
        assert!(!n.assumptions_met);
        assert_eq!(n.warnings.len(), 1);
    }

    #[test]
    fn test_treatment_proportion_out_of_range() {
        let d = design(MetricType::Proportion, 0.95, MinimumDetectableEffect::Relative(0.1));
        assert!(matches!(
            fixed_horizon(&d, true),
            Err(Error::InfeasibleDesign(InfeasibleDesignError::ProportionOutOfRange {
                name: "treatment",
                ..
            }))
        ));
    }

    #[test]
    fn test_small_baseline_fails_rule_of_thumb() {
        // Huge effect on a rare event: tiny n, but 5/p is large
        let d = design(MetricType::Proportion, 0.001, MinimumDetectableEffect::Relative(20.0));
        let n = fixed_horizon(&d, true).unwrap();
        assert!(!n.assumptions_met);
        assert_eq!(n.min_for_normal_approximation, Some(5000));
    }
}
