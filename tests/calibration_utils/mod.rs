//! Shared utilities for calibration tests.
//!
//! - Deterministic RNG with logged seeds for reproducibility
//! - Simulated experiments accruing per-arm aggregates look by look
//! - Statistical helpers (Wilson CI)

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::SeedableRng;
use rand_distr::{Binomial, Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use seqmon::InterimStatistics;
use seqmon_core::{ArmStatistics, MetricStatistics};

/// Default seed; override with `CALIBRATION_SEED`.
const DEFAULT_SEED: u64 = 0x5EC0_0001;

/// Seeded RNG, logging the seed so failures can be replayed.
pub fn rng(test_name: &str) -> Xoshiro256PlusPlus {
    let seed = std::env::var("CALIBRATION_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SEED);
    eprintln!("[{test_name}] seed = {seed}");
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

/// Trial count; override with `CALIBRATION_TRIALS`.
pub fn trials(default: usize) -> usize {
    std::env::var("CALIBRATION_TRIALS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Snapshot timestamp of look `k`, one week apart.
pub fn look_timestamp(k: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::weeks(k as i64)
}

/// A binary-metric experiment accruing `per_look` units per arm per look.
pub struct ProportionExperiment {
    control_rate: f64,
    treatment_rate: f64,
    per_look: u64,
    control: ArmStatistics,
    treatment: ArmStatistics,
}

impl ProportionExperiment {
    pub fn new(control_rate: f64, treatment_rate: f64, per_look: u64) -> Self {
        Self {
            control_rate,
            treatment_rate,
            per_look,
            control: ArmStatistics::default(),
            treatment: ArmStatistics::default(),
        }
    }

    /// Accrue one more look of data and return the cumulative snapshot.
    pub fn next_look(
        &mut self,
        metric: &str,
        k: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> InterimStatistics {
        let c = Binomial::new(self.per_look, self.control_rate).unwrap().sample(rng);
        let t = Binomial::new(self.per_look, self.treatment_rate).unwrap().sample(rng);
        self.control
            .merge(&ArmStatistics::from_successes(self.per_look, c));
        self.treatment
            .merge(&ArmStatistics::from_successes(self.per_look, t));
        InterimStatistics::new(look_timestamp(k))
            .with_metric(metric, MetricStatistics::new(self.control, self.treatment))
    }
}

/// A continuous-metric experiment with normal outcomes.
pub struct ContinuousExperiment {
    control: Normal<f64>,
    treatment: Normal<f64>,
    per_look: u64,
    control_stats: ArmStatistics,
    treatment_stats: ArmStatistics,
}

impl ContinuousExperiment {
    pub fn new(control_mean: f64, treatment_mean: f64, sd: f64, per_look: u64) -> Self {
        Self {
            control: Normal::new(control_mean, sd).unwrap(),
            treatment: Normal::new(treatment_mean, sd).unwrap(),
            per_look,
            control_stats: ArmStatistics::default(),
            treatment_stats: ArmStatistics::default(),
        }
    }

    pub fn next_look(
        &mut self,
        metric: &str,
        k: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> InterimStatistics {
        for _ in 0..self.per_look {
            self.control_stats.push(self.control.sample(rng));
            self.treatment_stats.push(self.treatment.sample(rng));
        }
        InterimStatistics::new(look_timestamp(k)).with_metric(
            metric,
            MetricStatistics::new(self.control_stats, self.treatment_stats),
        )
    }
}

/// Wilson score interval (95%) for a binomial proportion.
pub fn wilson_ci(successes: usize, trials: usize) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 1.0);
    }
    let n = trials as f64;
    let p_hat = successes as f64 / n;
    let z = 1.96;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p_hat + z2 / (2.0 * n)) / denom;
    let half = z * (p_hat * (1.0 - p_hat) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    ((center - half).max(0.0), (center + half).min(1.0))
}
