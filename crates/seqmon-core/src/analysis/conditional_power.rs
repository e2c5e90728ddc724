//! Conditional power under the Brownian-motion approximation.
//!
//! Given `B(t_k) = z_k·√t_k`, the remaining increment `B(1) − B(t_k)` is
//! normal with mean `θ(1 − t_k)` and variance `1 − t_k`. Conditional power is
//! the probability that the final statistic crosses the final critical value
//! in either direction:
//!
//! ```text
//! CP = 1 − Φ((c − m)/√(1−t)) + Φ((−c − m)/√(1−t)),   m = z√t + θ(1−t)
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ComputationError;
use crate::math::{normal_cdf, normal_sf};

/// Assumed drift for the not-yet-observed information.
///
/// There is no default: the choice materially changes futility behaviour and
/// must be registered with the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalPowerTrend {
    /// Continue at the currently observed effect (θ = z/√t).
    CurrentTrend,
    /// Continue at the minimum detectable effect the study was powered for.
    DesignAlternative,
    /// Assume no effect from here on (θ = 0).
    Null,
}

impl fmt::Display for ConditionalPowerTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionalPowerTrend::CurrentTrend => write!(f, "current trend"),
            ConditionalPowerTrend::DesignAlternative => write!(f, "design alternative"),
            ConditionalPowerTrend::Null => write!(f, "null"),
        }
    }
}

impl ConditionalPowerTrend {
    /// Drift θ implied by this trend at an interim look.
    ///
    /// `design_drift` is the drift of the design alternative, only used by
    /// [`ConditionalPowerTrend::DesignAlternative`].
    pub fn drift(&self, z: f64, t: f64, design_drift: f64) -> f64 {
        match self {
            ConditionalPowerTrend::CurrentTrend => z / t.sqrt(),
            ConditionalPowerTrend::DesignAlternative => design_drift,
            ConditionalPowerTrend::Null => 0.0,
        }
    }
}

/// Conditional probability of rejecting at the final analysis.
///
/// `z` is the current standard-normal statistic at information fraction `t`,
/// `final_critical` the final look's critical |z| and `theta` the assumed
/// drift. Undefined at `t = 1` where no information remains.
pub fn conditional_power(
    z: f64,
    t: f64,
    final_critical: f64,
    theta: f64,
) -> Result<f64, ComputationError> {
    if !(t > 0.0 && t < 1.0) {
        return Err(ComputationError::InvalidProbability {
            name: "information fraction for conditional power",
            value: t,
        });
    }
    if !(z.is_finite() && theta.is_finite() && final_critical.is_finite()) {
        return Err(ComputationError::NonFinite("conditional power input"));
    }
    let remaining = 1.0 - t;
    let sd = remaining.sqrt();
    let mean = z * t.sqrt() + theta * remaining;
    let cp = normal_sf((final_critical - mean) / sd) + normal_cdf((-final_critical - mean) / sd);
    Ok(cp.clamp(0.0, 1.0))
}

/// Drift corresponding to an absolute effect `delta` when the current
/// standard error is `standard_error` at information fraction `t`.
///
/// The full-information standard error is `standard_error·√t`.
pub fn drift_for_effect(delta: f64, standard_error: f64, t: f64) -> f64 {
    delta / (standard_error * t.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_FINAL: f64 = 2.0243;

    #[test]
    fn test_current_trend_known_value() {
        let theta = ConditionalPowerTrend::CurrentTrend.drift(1.25, 0.75, 0.0);
        let cp = conditional_power(1.25, 0.75, C_FINAL, theta).unwrap();
        assert!((cp - 0.12265).abs() < 1e-4, "cp = {cp}");
    }

    #[test]
    fn test_null_trend_is_lower_for_positive_effect() {
        let cur = conditional_power(1.25, 0.75, C_FINAL, 1.25 / 0.75_f64.sqrt()).unwrap();
        let null = conditional_power(1.25, 0.75, C_FINAL, 0.0).unwrap();
        assert!(null < cur);
        assert!((null - 0.0298).abs() < 1e-3, "null = {null}");
    }

    #[test]
    fn test_symmetric_in_sign() {
        let up = conditional_power(1.5, 0.5, 2.0, 1.5 / 0.5_f64.sqrt()).unwrap();
        let down = conditional_power(-1.5, 0.5, 2.0, -1.5 / 0.5_f64.sqrt()).unwrap();
        assert!((up - down).abs() < 1e-12);
    }

    #[test]
    fn test_strong_effect_gives_high_power() {
        let cp = conditional_power(3.5, 0.5, 2.0, 3.5 / 0.5_f64.sqrt()).unwrap();
        assert!(cp > 0.99);
    }

    #[test]
    fn test_undefined_at_full_information() {
        assert!(conditional_power(1.0, 1.0, 2.0, 0.0).is_err());
        assert!(conditional_power(1.0, 0.0, 2.0, 0.0).is_err());
    }

    #[test]
    fn test_drift_for_effect() {
        // se = 0.02 at t = 0.25 → full-information se = 0.01
        assert!((drift_for_effect(0.03, 0.02, 0.25) - 3.0).abs() < 1e-12);
        assert_eq!(ConditionalPowerTrend::DesignAlternative.drift(1.0, 0.5, 2.8), 2.8);
        assert_eq!(ConditionalPowerTrend::Null.drift(1.0, 0.5, 2.8), 0.0);
    }
}
