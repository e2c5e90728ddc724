//! Heterogeneity of treatment effects across subgroups.
//!
//! Cochran's Q with fixed-effect inverse-variance weights, and Higgins' I²
//! (the share of total variation attributable to heterogeneity rather than
//! sampling error).

use serde::{Deserialize, Serialize};

use crate::error::ComputationError;
use crate::math::chi_squared_sf;

/// Estimated effect within one subgroup (segment, platform, region).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupEffect {
    /// Subgroup label.
    pub name: String,
    /// Treatment minus control within the subgroup.
    pub effect: f64,
    /// Standard error of `effect`.
    pub standard_error: f64,
}

impl SubgroupEffect {
    /// Construct a subgroup effect.
    pub fn new(name: impl Into<String>, effect: f64, standard_error: f64) -> Self {
        Self {
            name: name.into(),
            effect,
            standard_error,
        }
    }

    /// Approximate 95% interval lies entirely above zero.
    pub fn is_positive(&self) -> bool {
        self.effect - 1.959_963_984_540_054 * self.standard_error > 0.0
    }

    /// Approximate 95% interval lies entirely below zero.
    pub fn is_negative(&self) -> bool {
        self.effect + 1.959_963_984_540_054 * self.standard_error < 0.0
    }
}

/// Result of a heterogeneity test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heterogeneity {
    /// Cochran's Q statistic.
    pub q: f64,
    /// Degrees of freedom (subgroups − 1).
    pub degrees_of_freedom: usize,
    /// P(χ²_df ≥ Q).
    pub p_value: f64,
    /// Higgins' I² in [0, 1].
    pub i_squared: f64,
    /// Inverse-variance weighted pooled effect.
    pub pooled_effect: f64,
}

/// Cochran's Q test across `subgroups`.
///
/// Requires at least two subgroups, each with a positive finite standard error.
pub fn cochran_q(subgroups: &[SubgroupEffect]) -> Result<Heterogeneity, ComputationError> {
    if subgroups.len() < 2 {
        return Err(ComputationError::TooFewSubgroups(subgroups.len()));
    }
    for s in subgroups {
        if !(s.standard_error.is_finite() && s.standard_error > 0.0 && s.effect.is_finite()) {
            return Err(ComputationError::NonFinite("subgroup effect or standard error"));
        }
    }

    let weights: Vec<f64> = subgroups
        .iter()
        .map(|s| 1.0 / (s.standard_error * s.standard_error))
        .collect();
    let total_weight: f64 = weights.iter().sum();
    let pooled = subgroups
        .iter()
        .zip(&weights)
        .map(|(s, w)| w * s.effect)
        .sum::<f64>()
        / total_weight;
    let q: f64 = subgroups
        .iter()
        .zip(&weights)
        .map(|(s, w)| w * (s.effect - pooled).powi(2))
        .sum();

    let dof = subgroups.len() - 1;
    let p_value = chi_squared_sf(q, dof as f64)?;
    let i_squared = if q > 0.0 {
        ((q - dof as f64) / q).max(0.0)
    } else {
        0.0
    };

    Ok(Heterogeneity {
        q,
        degrees_of_freedom: dof,
        p_value,
        i_squared,
        pooled_effect: pooled,
    })
}
