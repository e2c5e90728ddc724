//! Recursive numerical integration of the Brownian-motion score process.
//!
//! Under the canonical joint distribution the score process `B(t) = Z(t)·√t`
//! is Brownian motion with drift θ observed at the information fractions of
//! the looks. Crossing probabilities are obtained by carrying the sub-density
//! of paths that have not yet stopped from one look to the next
//! (Armitage, McPherson & Rowe 1969):
//!
//! ```text
//! f₁(b)   = φ((b − θt₁) / √t₁) / √t₁
//! f_k(b)  = ∫_{C_{k−1}} f_{k−1}(u) · φ((b − u − θΔ) / √Δ) / √Δ du,   Δ = t_k − t_{k−1}
//! ```
//!
//! where `C_k = [−c_k√t_k, c_k√t_k]` is the continuation region on the
//! B scale. Integrals use composite Simpson's rule on a grid that is refined
//! in proportion to the standard deviation of the increment.

use crate::constants::{GRID_POINTS_PER_SD, MAX_GRID_POINTS, MIN_GRID_POINTS};
use crate::math::{normal_cdf, normal_pdf, normal_sf};

/// Sub-density of not-yet-stopped paths over the continuation region at one look.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Information fraction of this look.
    pub t: f64,
    points: Vec<f64>,
    weights: Vec<f64>,
    density: Vec<f64>,
}

impl Stage {
    /// Start a stage over `[−half_width, half_width]` on the B scale.
    ///
    /// With `prev = None` this is the first look and the density is the
    /// unconditional normal of `B(t)`.
    pub fn advance(prev: Option<&Stage>, t: f64, half_width: f64, theta: f64) -> Stage {
        let (t_prev, sd) = increment(prev, t);
        let drift = theta * (t - t_prev);

        let (points, weights) = simpson_grid(-half_width, half_width, sd);
        let density = points
            .iter()
            .map(|&b| match prev {
                None => normal_pdf((b - drift) / sd) / sd,
                Some(stage) => stage.integrate(|u| normal_pdf((b - u - drift) / sd) / sd),
            })
            .collect();

        Stage {
            t,
            points,
            weights,
            density,
        }
    }

    /// Total probability mass of the stage (probability of continuing past it).
    pub fn mass(&self) -> f64 {
        self.integrate(|_| 1.0)
    }

    /// Number of grid points used.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the grid is empty (never true for a constructed stage).
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn integrate<F: Fn(f64) -> f64>(&self, g: F) -> f64 {
        self.points
            .iter()
            .zip(&self.weights)
            .zip(&self.density)
            .map(|((&u, &w), &f)| w * f * g(u))
            .sum()
    }
}

/// Probability that a path continues to the look at `t` and has `B(t) ≥ level`.
pub fn upper_exit(prev: Option<&Stage>, t: f64, level: f64, theta: f64) -> f64 {
    let (t_prev, sd) = increment(prev, t);
    let drift = theta * (t - t_prev);
    match prev {
        None => normal_sf((level - drift) / sd),
        Some(stage) => stage.integrate(|u| normal_sf((level - u - drift) / sd)),
    }
}

/// Probability that a path continues to the look at `t` and has `B(t) ≤ level`.
pub fn lower_exit(prev: Option<&Stage>, t: f64, level: f64, theta: f64) -> f64 {
    let (t_prev, sd) = increment(prev, t);
    let drift = theta * (t - t_prev);
    match prev {
        None => normal_cdf((level - drift) / sd),
        Some(stage) => stage.integrate(|u| normal_cdf((level - u - drift) / sd)),
    }
}

/// Two-sided crossing probability at the look at `t` for critical value `c`
/// (on the Z scale).
pub fn crossing(prev: Option<&Stage>, t: f64, c: f64, theta: f64) -> f64 {
    let level = c * t.sqrt();
    upper_exit(prev, t, level, theta) + lower_exit(prev, t, -level, theta)
}

/// Per-look exit probabilities of a two-sided design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitProbabilities {
    /// P(stop at this look with Z ≥ c).
    pub upper: f64,
    /// P(stop at this look with Z ≤ −c).
    pub lower: f64,
}

impl ExitProbabilities {
    /// Total crossing probability at this look.
    pub fn total(&self) -> f64 {
        self.upper + self.lower
    }
}

/// Exit probabilities at each look for the symmetric boundaries `critical`
/// (Z scale) at `fractions` under drift θ.
pub fn exit_probabilities(fractions: &[f64], critical: &[f64], theta: f64) -> Vec<ExitProbabilities> {
    let mut out = Vec::with_capacity(fractions.len());
    let mut stage: Option<Stage> = None;
    for (&t, &c) in fractions.iter().zip(critical) {
        let level = c * t.sqrt();
        out.push(ExitProbabilities {
            upper: upper_exit(stage.as_ref(), t, level, theta),
            lower: lower_exit(stage.as_ref(), t, -level, theta),
        });
        stage = Some(Stage::advance(stage.as_ref(), t, level, theta));
    }
    out
}

/// Stages for every look (continuation densities), used by estimators that
/// need the density at an arbitrary look.
pub fn stages(fractions: &[f64], critical: &[f64], theta: f64) -> Vec<Stage> {
    let mut out: Vec<Stage> = Vec::with_capacity(fractions.len());
    for (&t, &c) in fractions.iter().zip(critical) {
        let next = Stage::advance(out.last(), t, c * t.sqrt(), theta);
        out.push(next);
    }
    out
}

fn increment(prev: Option<&Stage>, t: f64) -> (f64, f64) {
    let t_prev = prev.map_or(0.0, |s| s.t);
    let var = (t - t_prev).max(f64::MIN_POSITIVE);
    (t_prev, var.sqrt())
}

/// Odd-sized composite Simpson grid over `[lo, hi]` with spacing at most
/// `sd / GRID_POINTS_PER_SD` (subject to the point caps).
fn simpson_grid(lo: f64, hi: f64, sd: f64) -> (Vec<f64>, Vec<f64>) {
    let width = (hi - lo).max(0.0);
    let wanted = (width / (sd / GRID_POINTS_PER_SD)).ceil() as usize + 1;
    let mut n = wanted.clamp(MIN_GRID_POINTS, MAX_GRID_POINTS);
    if n % 2 == 0 {
        n += 1;
    }

    let h = width / (n - 1) as f64;
    let points = (0..n).map(|i| lo + h * i as f64).collect();
    let weights = (0..n)
        .map(|i| {
            let m = if i == 0 || i == n - 1 {
                1.0
            } else if i % 2 == 1 {
                4.0
            } else {
                2.0
            };
            m * h / 3.0
        })
        .collect();
    (points, weights)
}
