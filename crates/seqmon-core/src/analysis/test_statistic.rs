//! Two-sample test statistics selected by the declared metric type.

use serde::{Deserialize, Serialize};

use crate::error::InsufficientData;
use crate::math::{normal_quantile, student_t_two_sided_p, two_sided_p};
use crate::statistics::MetricStatistics;
use crate::types::{Arm, MetricType};

/// Result of a two-sample comparison at one look.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestStatistic {
    /// Test that produced the statistic.
    pub metric_type: MetricType,
    /// Raw statistic (z, or Welch t for continuous metrics).
    pub statistic: f64,
    /// Welch–Satterthwaite degrees of freedom (continuous metrics only).
    pub degrees_of_freedom: Option<f64>,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Standard-normal statistic with the same two-sided p-value and sign.
    ///
    /// Equal to `statistic` for the z-tests. Boundaries, conditional power
    /// and estimators work on this scale.
    pub z: f64,
    /// Treatment mean minus control mean.
    pub effect: f64,
    /// Standard error used in the statistic's denominator.
    pub standard_error: f64,
}

impl TestStatistic {
    /// Compute the test for `metric_type` from per-arm aggregates.
    pub fn compute(
        metric_type: MetricType,
        stats: &MetricStatistics,
    ) -> Result<Self, InsufficientData> {
        stats.control.validate(Arm::Control, metric_type)?;
        stats.treatment.validate(Arm::Treatment, metric_type)?;
        match metric_type {
            MetricType::Proportion => two_proportion_z(stats),
            MetricType::Continuous => welch_t(stats),
            MetricType::Count => poisson_rate_z(stats),
        }
    }

    /// Whether the p-value falls below `threshold`.
    pub fn is_significant(&self, threshold: f64) -> bool {
        self.p_value < threshold
    }
}

/// Pooled two-proportion z-test.
fn two_proportion_z(stats: &MetricStatistics) -> Result<TestStatistic, InsufficientData> {
    let (c, t) = (&stats.control, &stats.treatment);
    let (nc, nt) = (c.count as f64, t.count as f64);
    let pooled = (c.sum + t.sum) / (nc + nt);
    let var = pooled * (1.0 - pooled) * (1.0 / nc + 1.0 / nt);
    if var <= 0.0 {
        return Err(InsufficientData::DegenerateVariance(
            "pooled proportion is 0 or 1",
        ));
    }
    Ok(from_z(MetricType::Proportion, stats.difference(), var.sqrt()))
}

/// Welch's unequal-variance t-test.
fn welch_t(stats: &MetricStatistics) -> Result<TestStatistic, InsufficientData> {
    let (c, t) = (&stats.control, &stats.treatment);
    let (nc, nt) = (c.count as f64, t.count as f64);
    let (vc, vt) = (c.variance() / nc, t.variance() / nt);
    let var = vc + vt;
    if var <= 0.0 {
        return Err(InsufficientData::DegenerateVariance(
            "both arms have zero sample variance",
        ));
    }
    let se = var.sqrt();
    let effect = stats.difference();
    let statistic = effect / se;
    let df = var * var / (vc * vc / (nc - 1.0) + vt * vt / (nt - 1.0));

    let p_value = student_t_two_sided_p(statistic, df)
        .map_err(|e| InsufficientData::Inconsistent(e.to_string()))?;
    let z = -statistic.signum() * normal_quantile(p_value / 2.0);

    Ok(TestStatistic {
        metric_type: MetricType::Continuous,
        statistic,
        degrees_of_freedom: Some(df),
        p_value,
        z: if z.is_finite() { z } else { statistic },
        effect,
        standard_error: se,
    })
}

/// Pooled Poisson rate z-test.
fn poisson_rate_z(stats: &MetricStatistics) -> Result<TestStatistic, InsufficientData> {
    let (c, t) = (&stats.control, &stats.treatment);
    let (nc, nt) = (c.count as f64, t.count as f64);
    let pooled_rate = (c.sum + t.sum) / (nc + nt);
    let var = pooled_rate * (1.0 / nc + 1.0 / nt);
    if var <= 0.0 {
        return Err(InsufficientData::DegenerateVariance("no events in either arm"));
    }
    Ok(from_z(MetricType::Count, stats.difference(), var.sqrt()))
}

fn from_z(metric_type: MetricType, effect: f64, se: f64) -> TestStatistic {
    let z = effect / se;
    TestStatistic {
        metric_type,
        statistic: z,
        degrees_of_freedom: None,
        p_value: two_sided_p(z),
        z,
        effect,
        standard_error: se,
    }
}
