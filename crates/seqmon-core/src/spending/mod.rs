//! Group-sequential stopping boundaries.
//!
//! A [`SpendingFamily`] together with the information fractions of the looks
//! and the overall two-sided significance level determines a
//! [`BoundarySet`]: one critical value per look such that the probability of
//! ever crossing under H0 equals α.
//!
//! - Classic O'Brien-Fleming (`z_k = C/√t_k`) and Pocock (`z_k = C`) shapes
//!   have their constant `C` calibrated so the exact crossing probability
//!   across all looks is α.
//! - Lan-DeMets designs spend `α(t_k) − α(t_{k−1})` at each look, which
//!   supports irregular and unplanned look times.
//!
//! All crossing probabilities come from [`recursion`], which integrates the
//! Brownian-motion score process over the continuation regions.

pub mod functions;
pub mod recursion;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{SPENDING_TOLERANCE, Z_CAP};
use crate::error::ComputationError;
use crate::math::{bisect, normal_quantile, two_sided_critical, two_sided_p};

pub use functions::SpendingFunction;
pub use recursion::{ExitProbabilities, Stage};

/// Boundary family selected at design time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SpendingFamily {
    /// Classic O'Brien-Fleming: `z_k = C·√(K/k)`, very conservative early.
    ObrienFleming,
    /// Classic Pocock: the same critical value at every look.
    Pocock,
    /// Lan-DeMets alpha spending with the given spending function.
    #[serde(rename = "lan_demets")]
    LanDeMets {
        /// Cumulative spending curve.
        spending: SpendingFunction,
    },
}

impl SpendingFamily {
    /// Lan-DeMets with O'Brien-Fleming-type spending.
    pub fn lan_demets_obrien_fleming() -> Self {
        SpendingFamily::LanDeMets {
            spending: SpendingFunction::ObrienFlemingType,
        }
    }

    /// Lan-DeMets with Pocock-type spending.
    pub fn lan_demets_pocock() -> Self {
        SpendingFamily::LanDeMets {
            spending: SpendingFunction::PocockType,
        }
    }

    /// Check the family's parameters.
    pub fn validate(&self) -> Result<(), ComputationError> {
        match self {
            SpendingFamily::LanDeMets { spending } => spending.validate(),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SpendingFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpendingFamily::ObrienFleming => write!(f, "O'Brien-Fleming"),
            SpendingFamily::Pocock => write!(f, "Pocock"),
            SpendingFamily::LanDeMets { spending } => {
                write!(f, "Lan-DeMets ({})", spending.name())
            }
        }
    }
}

/// Boundary at a single look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryValue {
    /// Look index (1-based).
    pub look: usize,
    /// Total planned looks K.
    pub total_looks: usize,
    /// Information fraction t_k.
    pub information_fraction: f64,
    /// Family the boundary belongs to.
    pub family: SpendingFamily,
    /// Two-sided Type-I error spent through this look.
    pub cumulative_alpha: f64,
    /// Type-I error spent at this look alone.
    pub incremental_alpha: f64,
    /// Critical |z|; crossing it stops for superiority.
    pub critical_z: f64,
    /// Two-sided nominal p-value threshold equivalent to `critical_z`.
    pub p_threshold: f64,
    /// Continue while conditional power is at least this value.
    ///
    /// `None` when futility monitoring isn't registered, and always `None` at
    /// the final look.
    pub futility_threshold: Option<f64>,
}

impl BoundaryValue {
    /// Whether this is the final planned look.
    pub fn is_final(&self) -> bool {
        self.look == self.total_looks
    }
}

/// Boundaries for every look of a design, solved once up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySet {
    family: SpendingFamily,
    alpha: f64,
    fractions: Vec<f64>,
    boundaries: Vec<BoundaryValue>,
}

impl BoundarySet {
    /// Solve the boundaries of `family` at `fractions` for overall level `alpha`.
    pub fn solve(
        family: &SpendingFamily,
        fractions: &[f64],
        alpha: f64,
    ) -> Result<Self, ComputationError> {
        validate_alpha(alpha)?;
        validate_fractions(fractions)?;
        family.validate()?;

        let (critical, incremental, cumulative) = match family {
            SpendingFamily::ObrienFleming => {
                let shape: Vec<f64> = fractions.iter().map(|t| 1.0 / t.sqrt()).collect();
                solve_constant(&shape, fractions, alpha)
            }
            SpendingFamily::Pocock => {
                let shape = vec![1.0; fractions.len()];
                solve_constant(&shape, fractions, alpha)
            }
            SpendingFamily::LanDeMets { spending } => solve_spending(spending, fractions, alpha),
        };

        let total = fractions.len();
        let boundaries = (0..total)
            .map(|i| BoundaryValue {
                look: i + 1,
                total_looks: total,
                information_fraction: fractions[i],
                family: family.clone(),
                cumulative_alpha: cumulative[i],
                incremental_alpha: incremental[i],
                critical_z: critical[i],
                p_threshold: two_sided_p(critical[i]),
                futility_threshold: None,
            })
            .collect();

        Ok(Self {
            family: family.clone(),
            alpha,
            fractions: fractions.to_vec(),
            boundaries,
        })
    }

    /// Solve for `total_looks` equally spaced looks.
    pub fn equally_spaced(
        family: &SpendingFamily,
        total_looks: usize,
        alpha: f64,
    ) -> Result<Self, ComputationError> {
        Self::solve(family, &equally_spaced(total_looks)?, alpha)
    }

    /// Register a conditional-power futility threshold at every look but the last.
    pub fn with_futility(mut self, threshold: f64) -> Self {
        for b in &mut self.boundaries {
            b.futility_threshold = if b.is_final() { None } else { Some(threshold) };
        }
        self
    }

    /// Boundary at look `k` (1-based).
    pub fn at(&self, k: usize) -> Result<&BoundaryValue, ComputationError> {
        if k == 0 || k > self.boundaries.len() {
            return Err(ComputationError::LookOutOfRange {
                look: k,
                total: self.boundaries.len(),
            });
        }
        Ok(&self.boundaries[k - 1])
    }

    /// All boundaries in look order.
    pub fn iter(&self) -> impl Iterator<Item = &BoundaryValue> {
        self.boundaries.iter()
    }

    /// Total planned looks K.
    pub fn total_looks(&self) -> usize {
        self.boundaries.len()
    }

    /// Overall significance level.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Family the set was solved for.
    pub fn family(&self) -> &SpendingFamily {
        &self.family
    }

    /// Information fractions of the looks.
    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    /// Critical |z| values in look order.
    pub fn critical_values(&self) -> Vec<f64> {
        self.boundaries.iter().map(|b| b.critical_z).collect()
    }

    /// Exit probabilities at every look under drift θ (units of √(full information)).
    pub fn exit_probabilities(&self, theta: f64) -> Vec<ExitProbabilities> {
        recursion::exit_probabilities(&self.fractions, &self.critical_values(), theta)
    }

    /// Probability of stopping for superiority in the positive direction under drift θ.
    pub fn power(&self, theta: f64) -> f64 {
        self.exit_probabilities(theta).iter().map(|e| e.upper).sum()
    }

    /// Drift at which the design reaches `power`.
    pub fn drift_for_power(&self, power: f64) -> Result<f64, ComputationError> {
        if !(power > 0.0 && power < 1.0) {
            return Err(ComputationError::InvalidProbability {
                name: "power",
                value: power,
            });
        }
        let fixed = two_sided_critical(self.alpha) + normal_quantile(power);
        let hi = 2.0 * fixed.abs() + 10.0;
        Ok(bisect(|theta| self.power(theta), 0.0, hi, power, true))
    }

    /// Ratio of maximum sequential information to fixed-horizon information
    /// at equal power.
    pub fn inflation_factor(&self, power: f64) -> Result<f64, ComputationError> {
        let theta = self.drift_for_power(power)?;
        let fixed = two_sided_critical(self.alpha) + normal_quantile(power);
        Ok((theta / fixed).powi(2))
    }
}

/// Boundary at look `k` of `total_looks` equally spaced looks (`t_k = k/K`).
pub fn boundary(
    family: &SpendingFamily,
    total_looks: usize,
    k: usize,
    alpha: f64,
) -> Result<BoundaryValue, ComputationError> {
    let fractions = equally_spaced(total_looks)?;
    boundary_at(family, &fractions, k, alpha)
}

/// Boundary at look `k` for looks at arbitrary information `fractions`.
pub fn boundary_at(
    family: &SpendingFamily,
    fractions: &[f64],
    k: usize,
    alpha: f64,
) -> Result<BoundaryValue, ComputationError> {
    if k == 0 || k > fractions.len() {
        return Err(ComputationError::LookOutOfRange {
            look: k,
            total: fractions.len(),
        });
    }
    let set = BoundarySet::solve(family, fractions, alpha)?;
    set.at(k).cloned()
}

/// Information fractions `k/K` for `k = 1..=K`.
pub fn equally_spaced(total_looks: usize) -> Result<Vec<f64>, ComputationError> {
    if total_looks == 0 {
        return Err(ComputationError::NoLooks(total_looks));
    }
    let k = total_looks as f64;
    Ok((1..=total_looks).map(|i| i as f64 / k).collect())
}

/// Fractions must be non-empty, strictly increasing within (0, 1] and end at 1.
pub fn validate_fractions(fractions: &[f64]) -> Result<(), ComputationError> {
    let Some(&last) = fractions.last() else {
        return Err(ComputationError::NoLooks(0));
    };
    let mut prev = 0.0;
    for &t in fractions {
        if !t.is_finite() || t <= prev || t > 1.0 + SPENDING_TOLERANCE {
            return Err(ComputationError::InvalidFractions(format!(
                "{fractions:?} is not strictly increasing within (0, 1]"
            )));
        }
        prev = t;
    }
    if (last - 1.0).abs() > SPENDING_TOLERANCE {
        return Err(ComputationError::InvalidFractions(format!(
            "last look must be at full information, got {last}"
        )));
    }
    Ok(())
}

fn validate_alpha(alpha: f64) -> Result<(), ComputationError> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(ComputationError::InvalidAlpha(alpha))
    }
}

type Solved = (Vec<f64>, Vec<f64>, Vec<f64>);

/// Boundaries `z_k = C·shape_k` with `C` chosen so the total crossing
/// probability under H0 is α.
fn solve_constant(shape: &[f64], fractions: &[f64], alpha: f64) -> Solved {
    let critical_for = |c: f64| -> Vec<f64> { shape.iter().map(|s| (c * s).min(Z_CAP)).collect() };
    let total_for = |c: f64| -> f64 {
        recursion::exit_probabilities(fractions, &critical_for(c), 0.0)
            .iter()
            .map(ExitProbabilities::total)
            .sum()
    };

    let c = bisect(total_for, 0.0, Z_CAP, alpha, false);
    let critical = critical_for(c);
    let incremental: Vec<f64> = recursion::exit_probabilities(fractions, &critical, 0.0)
        .iter()
        .map(ExitProbabilities::total)
        .collect();
    let cumulative = running_total(&incremental, alpha);
    (critical, incremental, cumulative)
}

/// Lan-DeMets: at each look find the critical value that spends exactly the
/// increment of the spending curve.
fn solve_spending(spending: &SpendingFunction, fractions: &[f64], alpha: f64) -> Solved {
    let mut critical = Vec::with_capacity(fractions.len());
    let mut incremental = Vec::with_capacity(fractions.len());
    let mut cumulative = Vec::with_capacity(fractions.len());
    let mut stage: Option<Stage> = None;
    let mut spent_before = 0.0;

    for &t in fractions {
        let spent = spending.cumulative(t, alpha).max(spent_before);
        let target = spent - spent_before;
        let prev = stage.as_ref();

        let c = if target <= recursion::crossing(prev, t, Z_CAP, 0.0) {
            Z_CAP
        } else {
            bisect(|c| recursion::crossing(prev, t, c, 0.0), 0.0, Z_CAP, target, false)
        };

        critical.push(c);
        incremental.push(target);
        cumulative.push(spent);
        stage = Some(Stage::advance(prev, t, c * t.sqrt(), 0.0));
        spent_before = spent;
    }
    (critical, incremental, cumulative)
}

fn running_total(incremental: &[f64], cap: f64) -> Vec<f64> {
    let mut acc = 0.0;
    incremental
        .iter()
        .map(|x| {
            acc += x;
            acc.min(cap)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALPHA: f64 = 0.05;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_classic_obrien_fleming_four_looks() {
        let set = BoundarySet::equally_spaced(&SpendingFamily::ObrienFleming, 4, ALPHA).unwrap();
        let z = set.critical_values();
        let expected = [4.04859, 2.86279, 2.33746, 2.02430];
        for (got, want) in z.iter().zip(expected) {
            assert!(close(*got, want, 1e-3), "got {got}, want {want}");
        }
        let last = set.at(4).unwrap();
        assert!(close(last.cumulative_alpha, ALPHA, 1e-6));
        assert!(close(set.at(1).unwrap().p_threshold, 0.000_052, 2e-6));
    }

    #[test]
    fn test_classic_pocock_four_looks() {
        let set = BoundarySet::equally_spaced(&SpendingFamily::Pocock, 4, ALPHA).unwrap();
        for b in set.iter() {
            assert!(close(b.critical_z, 2.36130, 1e-3), "look {}: {}", b.look, b.critical_z);
        }
        assert!(close(set.at(4).unwrap().cumulative_alpha, ALPHA, 1e-6));
    }

    #[test]
    fn test_lan_demets_obrien_fleming_type() {
        let set =
            BoundarySet::equally_spaced(&SpendingFamily::lan_demets_obrien_fleming(), 4, ALPHA)
                .unwrap();
        let expected = [3.91993, 2.77395, 2.29824, 2.04264];
        for (got, want) in set.critical_values().iter().zip(expected) {
            assert!(close(*got, want, 1e-3), "got {got}, want {want}");
        }
        assert!(close(set.at(4).unwrap().cumulative_alpha, ALPHA, 1e-12));
    }

    #[test]
    fn test_lan_demets_pocock_type() {
        let set =
            BoundarySet::equally_spaced(&SpendingFamily::lan_demets_pocock(), 4, ALPHA).unwrap();
        let expected = [2.36833, 2.36752, 2.35817, 2.35003];
        for (got, want) in set.critical_values().iter().zip(expected) {
            assert!(close(*got, want, 1e-3), "got {got}, want {want}");
        }
    }

    #[test]
    fn test_irregular_looks() {
        let b = boundary_at(&SpendingFamily::lan_demets_obrien_fleming(), &[0.3, 0.55, 1.0], 2, ALPHA)
            .unwrap();
        assert!(close(b.critical_z, 2.64857, 1e-3));
        assert!(close(b.information_fraction, 0.55, 1e-15));
    }

    #[test]
    fn test_single_look_is_fixed_horizon() {
        for family in [
            SpendingFamily::ObrienFleming,
            SpendingFamily::Pocock,
            SpendingFamily::lan_demets_obrien_fleming(),
        ] {
            let b = boundary(&family, 1, 1, ALPHA).unwrap();
            assert!(close(b.critical_z, 1.959_96, 1e-4), "{family}: {}", b.critical_z);
        }
    }

    #[test]
    fn test_obrien_fleming_spends_less_than_pocock_before_final_look() {
        let obf = BoundarySet::equally_spaced(&SpendingFamily::ObrienFleming, 4, ALPHA).unwrap();
        let poc = BoundarySet::equally_spaced(&SpendingFamily::Pocock, 4, ALPHA).unwrap();
        for k in 1..4 {
            assert!(obf.at(k).unwrap().cumulative_alpha < poc.at(k).unwrap().cumulative_alpha);
        }
        // Early looks are strictly tighter
        for k in 1..=2 {
            assert!(obf.at(k).unwrap().p_threshold < poc.at(k).unwrap().p_threshold);
        }
        // Thresholds relax over time
        let p: Vec<f64> = obf.iter().map(|b| b.p_threshold).collect();
        assert!(p.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_inflation_factors() {
        let obf = BoundarySet::equally_spaced(&SpendingFamily::ObrienFleming, 4, ALPHA).unwrap();
        let poc = BoundarySet::equally_spaced(&SpendingFamily::Pocock, 4, ALPHA).unwrap();
        assert!(close(obf.inflation_factor(0.8).unwrap(), 1.02384, 2e-3));
        assert!(close(poc.inflation_factor(0.8).unwrap(), 1.20233, 2e-3));
    }

    #[test]
    fn test_futility_threshold_not_set_at_final_look() {
        let set = BoundarySet::equally_spaced(&SpendingFamily::ObrienFleming, 3, ALPHA)
            .unwrap()
            .with_futility(0.2);
        assert_eq!(set.at(1).unwrap().futility_threshold, Some(0.2));
        assert_eq!(set.at(3).unwrap().futility_threshold, None);
    }

    #[test]
    fn test_invalid_inputs() {
        let f = SpendingFamily::ObrienFleming;
        assert_eq!(boundary(&f, 0, 1, ALPHA), Err(ComputationError::NoLooks(0)));
        assert!(matches!(
            boundary(&f, 4, 5, ALPHA),
            Err(ComputationError::LookOutOfRange { look: 5, total: 4 })
        ));
        assert!(matches!(
            boundary(&f, 4, 0, ALPHA),
            Err(ComputationError::LookOutOfRange { .. })
        ));
        assert_eq!(boundary(&f, 4, 1, 1.0), Err(ComputationError::InvalidAlpha(1.0)));
        assert!(boundary_at(&f, &[0.5, 0.4, 1.0], 1, ALPHA).is_err());
        assert!(boundary_at(&f, &[0.5, 0.9], 1, ALPHA).is_err());
        let bad = SpendingFamily::LanDeMets {
            spending: SpendingFunction::Power { rho: -1.0 },
        };
        assert!(matches!(
            boundary(&bad, 3, 1, ALPHA),
            Err(ComputationError::InvalidSpending(_))
        ));
    }

    #[test]
    fn test_family_serde_tag() {
        let json = serde_json::to_string(&SpendingFamily::lan_demets_pocock()).unwrap();
        assert_eq!(json, r#"{"method":"lan_demets","spending":{"kind":"pocock_type"}}"#);
        let parsed: SpendingFamily =
            serde_json::from_str(r#"{"method":"obrien_fleming"}"#).unwrap();
        assert_eq!(parsed, SpendingFamily::ObrienFleming);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn cumulative_alpha_is_monotone_and_reaches_alpha(
            looks in 1usize..7,
            alpha in 0.01f64..0.2,
            family_idx in 0usize..4,
        ) {
            let family = match family_idx {
                0 => SpendingFamily::ObrienFleming,
                1 => SpendingFamily::Pocock,
                2 => SpendingFamily::lan_demets_obrien_fleming(),
                _ => SpendingFamily::LanDeMets { spending: SpendingFunction::Power { rho: 2.0 } },
            };
            let set = BoundarySet::equally_spaced(&family, looks, alpha).unwrap();
            let mut prev = 0.0;
            for b in set.iter() {
                prop_assert!(b.cumulative_alpha + 1e-12 >= prev);
                prop_assert!(b.cumulative_alpha <= alpha + 1e-12);
                prop_assert!(b.critical_z > 0.0 && b.critical_z <= Z_CAP);
                prev = b.cumulative_alpha;
            }
            prop_assert!((prev - alpha).abs() < 1e-6);
        }
    }
}
