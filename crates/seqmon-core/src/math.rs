//! Scalar math helpers shared across the crate.
//!
//! Normal tail probabilities are computed through `erfc` rather than
//! `1 - cdf` so that the extreme early-look thresholds of an
//! O'Brien-Fleming design (p ~ 1e-5 and below) keep full relative precision.

use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use statrs::function::erf::{erfc, erfc_inv};

use crate::error::ComputationError;

/// Standard normal CDF: Φ(x).
#[inline]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * core::f64::consts::FRAC_1_SQRT_2)
}

/// Upper normal tail: 1 - Φ(x), accurate for large x.
#[inline]
pub fn normal_sf(x: f64) -> f64 {
    0.5 * erfc(x * core::f64::consts::FRAC_1_SQRT_2)
}

/// Standard normal density φ(x).
#[inline]
pub fn normal_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Inverse normal CDF (probit): Φ⁻¹(p).
///
/// Returns ±∞ at the closed ends of the unit interval.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -core::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

/// Two-sided p-value of a standard normal statistic.
#[inline]
pub fn two_sided_p(z: f64) -> f64 {
    (2.0 * normal_sf(z.abs())).min(1.0)
}

/// Critical value `z` with two-sided tail probability `p`.
#[inline]
pub fn two_sided_critical(p: f64) -> f64 {
    normal_quantile(1.0 - p / 2.0)
}

/// Two-sided p-value of a Student-t statistic with `df` degrees of freedom.
pub fn student_t_two_sided_p(t: f64, df: f64) -> Result<f64, ComputationError> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|_| ComputationError::Distribution {
        name: "Student-t",
        detail: format!("degrees of freedom {df}"),
    })?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

/// Upper tail of a chi-squared distribution: P(X ≥ x).
pub fn chi_squared_sf(x: f64, dof: f64) -> Result<f64, ComputationError> {
    let dist = ChiSquared::new(dof).map_err(|_| ComputationError::Distribution {
        name: "chi-squared",
        detail: format!("degrees of freedom {dof}"),
    })?;
    Ok(dist.sf(x.max(0.0)))
}

/// Bisection root finder for a monotone function.
///
/// Finds `x` in `[lo, hi]` with `f(x) ≈ target`. `increasing` states the
/// direction of monotonicity. The bracket is assumed to contain the root;
/// if it doesn't, the nearer end is returned.
pub fn bisect<F>(mut f: F, mut lo: f64, mut hi: f64, target: f64, increasing: bool) -> f64
where
    F: FnMut(f64) -> f64,
{
    for _ in 0..crate::constants::BISECTION_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let below = f(mid) < target;
        if below == increasing {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < crate::constants::BISECTION_TOLERANCE {
            break;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_known_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-15);
        assert!((normal_cdf(1.959_963_984_540_054) - 0.975).abs() < 1e-12);
        assert!((normal_sf(4.0) - 3.167_124_183_311_998e-5).abs() < 1e-15);
    }

    #[test]
    fn test_quantile_inverts_cdf() {
        for &p in &[1e-8, 0.001, 0.025, 0.3, 0.5, 0.8, 0.975, 0.999_999] {
            let z = normal_quantile(p);
            assert!(
                (normal_cdf(z) - p).abs() < 1e-12 * p.max(1e-3),
                "round trip failed at p={p}"
            );
        }
        assert_eq!(normal_quantile(0.0), f64::NEG_INFINITY);
        assert_eq!(normal_quantile(1.0), f64::INFINITY);
    }

    #[test]
    fn test_two_sided_p_symmetry() {
        assert!((two_sided_p(1.96) - two_sided_p(-1.96)).abs() < 1e-15);
        assert!((two_sided_p(1.959_963_984_540_054) - 0.05).abs() < 1e-12);
        assert!((two_sided_critical(0.05) - 1.959_963_984_540_054).abs() < 1e-9);
    }

    #[test]
    fn test_student_t_approaches_normal() {
        let p_t = student_t_two_sided_p(2.0, 1e6).unwrap();
        assert!((p_t - two_sided_p(2.0)).abs() < 1e-5);

        // Heavier tails at small df
        let p_small = student_t_two_sided_p(2.0, 5.0).unwrap();
        assert!(p_small > p_t);
        assert!(student_t_two_sided_p(2.0, 0.0).is_err());
    }

    #[test]
    fn test_chi_squared_sf() {
        // 95th percentile of chi-squared(1) is 3.841
        let p = chi_squared_sf(3.841_458_820_694_124, 1.0).unwrap();
        assert!((p - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_bisect_finds_root() {
        let root = bisect(|x| x * x, 0.0, 10.0, 2.0, true);
        assert!((root - 2f64.sqrt()).abs() < 1e-9);
        let root = bisect(|x| -x, -5.0, 5.0, 1.5, false);
        assert!((root + 1.5).abs() < 1e-9);
    }
}
