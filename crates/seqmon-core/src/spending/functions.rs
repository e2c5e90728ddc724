//! Alpha-spending functions α(t).
//!
//! Every function maps an information fraction `t ∈ [0, 1]` to the
//! cumulative two-sided Type-I error spent by that point, with α(0) = 0 and
//! α(1) = α.

use serde::{Deserialize, Serialize};

use crate::constants::SPENDING_TOLERANCE;
use crate::error::ComputationError;
use crate::math::{normal_sf, two_sided_critical};

/// A monotone alpha-spending curve.
///
/// `Tabulated` covers arbitrary user-specified curves without open-ended
/// dynamic dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpendingFunction {
    /// Lan-DeMets O'Brien-Fleming type: α(t) = 2 − 2Φ(z_{1−α/2} / √t).
    ObrienFlemingType,

    /// Lan-DeMets Pocock type: α(t) = α · ln(1 + (e − 1) t).
    PocockType,

    /// Kim-DeMets power family: α(t) = α · t^ρ.
    Power {
        /// Exponent ρ > 0. ρ = 3 approximates O'Brien-Fleming, ρ = 1 Pocock.
        rho: f64,
    },

    /// Hwang-Shih-DeCani family: α(t) = α (1 − e^{−γt}) / (1 − e^{−γ}).
    ///
    /// γ = 0 is the linear curve α·t.
    HwangShihDeCani {
        /// Shape parameter; negative values spend conservatively early.
        gamma: f64,
    },

    /// Piecewise-linear interpolation of `(t, fraction of α spent)` points.
    ///
    /// Points must be strictly increasing in `t`, non-decreasing in the
    /// spent fraction, within `[0, 1]`, and end at `(1, 1)`. `(0, 0)` is
    /// implied.
    Tabulated {
        /// Knots of the curve.
        points: Vec<(f64, f64)>,
    },
}

impl SpendingFunction {
    /// Check that the parameters describe a valid spending curve.
    pub fn validate(&self) -> Result<(), ComputationError> {
        match self {
            SpendingFunction::ObrienFlemingType | SpendingFunction::PocockType => Ok(()),
            SpendingFunction::Power { rho } => {
                if rho.is_finite() && *rho > 0.0 {
                    Ok(())
                } else {
                    Err(ComputationError::InvalidSpending(format!(
                        "power family needs rho > 0, got {rho}"
                    )))
                }
            }
            SpendingFunction::HwangShihDeCani { gamma } => {
                if gamma.is_finite() {
                    Ok(())
                } else {
                    Err(ComputationError::InvalidSpending(
                        "Hwang-Shih-DeCani gamma must be finite".into(),
                    ))
                }
            }
            SpendingFunction::Tabulated { points } => validate_table(points),
        }
    }

    /// Cumulative alpha spent at information fraction `t`.
    ///
    /// `t` is clamped into `[0, 1]`.
    pub fn cumulative(&self, t: f64, alpha: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        if t == 0.0 {
            return 0.0;
        }
        let spent = match self {
            SpendingFunction::ObrienFlemingType => {
                let z = two_sided_critical(alpha);
                2.0 * normal_sf(z / t.sqrt())
            }
            SpendingFunction::PocockType => {
                alpha * (1.0 + (core::f64::consts::E - 1.0) * t).ln()
            }
            SpendingFunction::Power { rho } => alpha * t.powf(*rho),
            SpendingFunction::HwangShihDeCani { gamma } => {
                if gamma.abs() < 1e-12 {
                    alpha * t
                } else {
                    alpha * (1.0 - (-gamma * t).exp()) / (1.0 - (-gamma).exp())
                }
            }
            SpendingFunction::Tabulated { points } => alpha * interpolate(points, t),
        };
        spent.clamp(0.0, alpha)
    }

    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            SpendingFunction::ObrienFlemingType => "O'Brien-Fleming type",
            SpendingFunction::PocockType => "Pocock type",
            SpendingFunction::Power { .. } => "power family",
            SpendingFunction::HwangShihDeCani { .. } => "Hwang-Shih-DeCani",
            SpendingFunction::Tabulated { .. } => "tabulated",
        }
    }
}

fn validate_table(points: &[(f64, f64)]) -> Result<(), ComputationError> {
    let Some(&(last_t, last_f)) = points.last() else {
        return Err(ComputationError::InvalidSpending(
            "tabulated spending needs at least one point".into(),
        ));
    };
    let mut prev = (0.0_f64, 0.0_f64);
    for &(t, f) in points {
        if !(t.is_finite() && f.is_finite()) || t <= prev.0 || t > 1.0 {
            return Err(ComputationError::InvalidSpending(format!(
                "information fractions must be strictly increasing in (0, 1], got {t} after {}",
                prev.0
            )));
        }
        if f < prev.1 || f > 1.0 {
            return Err(ComputationError::InvalidSpending(format!(
                "spent fraction must be non-decreasing within [0, 1], got {f} after {}",
                prev.1
            )));
        }
        prev = (t, f);
    }
    if (last_t - 1.0).abs() > SPENDING_TOLERANCE || (last_f - 1.0).abs() > SPENDING_TOLERANCE {
        return Err(ComputationError::InvalidSpending(format!(
            "tabulated spending must end at (1, 1), got ({last_t}, {last_f})"
        )));
    }
    Ok(())
}

fn interpolate(points: &[(f64, f64)], t: f64) -> f64 {
    let mut prev = (0.0_f64, 0.0_f64);
    for &(x, y) in points {
        if t <= x {
            let span = x - prev.0;
            if span <= 0.0 {
                return y;
            }
            return prev.1 + (y - prev.1) * (t - prev.0) / span;
        }
        prev = (x, y);
    }
    prev.1
}
