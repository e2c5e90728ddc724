//! Effect estimation after a group-sequential stop.
//!
//! Stopping when the statistic crosses a boundary biases the naive estimate
//! away from zero. The median-unbiased estimator uses stage-wise ordering of
//! the sample space: an outcome `(j, z_j)` is more extreme than the observed
//! `(k*, z*)` when it stopped above the upper boundary at an earlier look
//! `j < k*`, or stopped at `k*` with `z_j ≥ z*`. The estimate is the drift θ
//! at which the observed outcome is the median; confidence limits solve the
//! same equation at `(1 ∓ level)/2`.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DRIFT_SEARCH_HALF_WIDTH, DRIFT_SEARCH_MAX_DOUBLINGS};
use crate::error::ComputationError;
use crate::math::{bisect, normal_quantile};
use crate::spending::{recursion, BoundarySet};

use super::TestStatistic;

/// Estimator applied to terminal decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectEstimator {
    /// Observed difference with a fixed-sample Wald interval.
    Naive,
    /// Median-unbiased estimate under stage-wise ordering.
    #[default]
    MedianUnbiased,
}

impl fmt::Display for EffectEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectEstimator::Naive => write!(f, "naive"),
            EffectEstimator::MedianUnbiased => write!(f, "median-unbiased"),
        }
    }
}

/// Point estimate and confidence interval on the effect scale
/// (treatment minus control).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectEstimate {
    /// Estimator that produced this estimate.
    pub estimator: EffectEstimator,
    /// Point estimate.
    pub effect: f64,
    /// Lower confidence limit.
    pub lower: f64,
    /// Upper confidence limit.
    pub upper: f64,
    /// Confidence level of the interval.
    pub level: f64,
}

impl EffectEstimate {
    /// Whether the interval excludes zero.
    pub fn excludes_zero(&self) -> bool {
        self.lower > 0.0 || self.upper < 0.0
    }
}

/// Naive estimate: the observed difference with a Wald interval.
pub fn naive(effect: f64, standard_error: f64, level: f64) -> Result<EffectEstimate, ComputationError> {
    validate_level(level)?;
    let half = normal_quantile(0.5 + level / 2.0) * standard_error;
    Ok(EffectEstimate {
        estimator: EffectEstimator::Naive,
        effect,
        lower: effect - half,
        upper: effect + half,
        level,
    })
}

/// Estimate the effect after stopping at `look` with the observed `statistic`.
///
/// At the first look (or in a single-look design) the median-unbiased
/// estimate coincides with the naive one.
pub fn estimate(
    estimator: EffectEstimator,
    boundaries: &BoundarySet,
    look: usize,
    statistic: &TestStatistic,
    level: f64,
) -> Result<EffectEstimate, ComputationError> {
    validate_level(level)?;
    let t = boundaries.at(look)?.information_fraction;
    let (z, standard_error) = (statistic.z, statistic.standard_error);
    if !(z.is_finite() && standard_error.is_finite() && standard_error > 0.0) {
        return Err(ComputationError::NonFinite("estimator input"));
    }

    if estimator == EffectEstimator::Naive || look == 1 {
        return naive(statistic.effect, standard_error, level);
    }

    let theta_hat = z / t.sqrt();
    let tail = |theta: f64| stagewise_tail(boundaries, look, z, theta);
    let solve = |name: &'static str, target: f64| -> Result<f64, ComputationError> {
        let (lo, hi) = bracket(tail, theta_hat, name, target)?;
        Ok(bisect(tail, lo, hi, target, true))
    };

    let scale = standard_error * t.sqrt();
    Ok(EffectEstimate {
        estimator: EffectEstimator::MedianUnbiased,
        effect: solve("median", 0.5)? * scale,
        lower: solve("lower confidence limit", (1.0 - level) / 2.0)? * scale,
        upper: solve("upper confidence limit", (1.0 + level) / 2.0)? * scale,
        level,
    })
}

/// Find a drift interval around `center` whose ends straddle `target`.
///
/// A large statistic at a later look can put the root far from the naive
/// drift (earlier upper crossings dominate the tail), so the half-width
/// doubles until `tail(lo) ≤ target ≤ tail(hi)`.
fn bracket<F>(
    tail: F,
    center: f64,
    name: &'static str,
    target: f64,
) -> Result<(f64, f64), ComputationError>
where
    F: Fn(f64) -> f64,
{
    let mut half = DRIFT_SEARCH_HALF_WIDTH;
    for _ in 0..=DRIFT_SEARCH_MAX_DOUBLINGS {
        let (lo, hi) = (center - half, center + half);
        if tail(lo) <= target && tail(hi) >= target {
            return Ok((lo, hi));
        }
        half *= 2.0;
    }
    Err(ComputationError::RootNotBracketed {
        name,
        target,
        lo: center - half / 2.0,
        hi: center + half / 2.0,
    })
}

/// P_θ(outcome at least as extreme as stopping at `look` with statistic `z`).
///
/// Non-decreasing in θ.
pub fn stagewise_tail(boundaries: &BoundarySet, look: usize, z: f64, theta: f64) -> f64 {
    let fractions = &boundaries.fractions()[..look];
    let critical = boundaries.critical_values();
    let earlier = &critical[..look - 1];

    let exits = recursion::exit_probabilities(&fractions[..look - 1], earlier, theta);
    let stages = recursion::stages(&fractions[..look - 1], earlier, theta);
    let crossed_above: f64 = exits.iter().map(|e| e.upper).sum();

    let t = fractions[look - 1];
    crossed_above + recursion::upper_exit(stages.last(), t, z * t.sqrt(), theta)
}

fn validate_level(level: f64) -> Result<(), ComputationError> {
    if level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(ComputationError::InvalidProbability {
            name: "confidence level",
            value: level,
        })
    }
}
