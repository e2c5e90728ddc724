//! Per-arm aggregate sufficient statistics.

use serde::{Deserialize, Serialize};

use crate::error::InsufficientData;
use crate::types::{Arm, MetricType};

/// Aggregate sufficient statistics for one arm of one metric.
///
/// For proportions `sum` is the number of successes and `sum_squares`
/// equals `sum` (each observation is 0 or 1).
///
/// # Example
///
/// ```
/// use seqmon_core::statistics::ArmStatistics;
///
/// let mut stats = ArmStatistics::default();
/// for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
///     stats.push(x);
/// }
/// assert!((stats.mean() - 3.0).abs() < 1e-10);
/// assert!((stats.variance() - 2.5).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmStatistics {
    /// Number of units observed.
    pub count: u64,
    /// Sum of the per-unit outcome.
    pub sum: f64,
    /// Sum of squared per-unit outcomes.
    pub sum_squares: f64,
}

impl ArmStatistics {
    /// Aggregates from raw totals.
    pub fn new(count: u64, sum: f64, sum_squares: f64) -> Self {
        Self {
            count,
            sum,
            sum_squares,
        }
    }

    /// Aggregates of a binary metric with `successes` out of `count` units.
    pub fn from_successes(count: u64, successes: u64) -> Self {
        let s = successes as f64;
        Self::new(count, s, s)
    }

    /// Add one observation.
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_squares += x * x;
    }

    /// Combine with aggregates from a disjoint set of units.
    pub fn merge(&mut self, other: &ArmStatistics) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
    }

    /// Sample mean (0 when empty).
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Sample variance with the n−1 denominator (0 when fewer than two units).
    ///
    /// Clamped at zero: the textbook formula can go slightly negative through
    /// cancellation when all observations are nearly equal.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let centered = self.sum_squares - self.sum * self.sum / n;
        (centered / (n - 1.0)).max(0.0)
    }

    /// Check the aggregates are usable for `metric_type`.
    pub fn validate(&self, arm: Arm, metric_type: MetricType) -> Result<(), InsufficientData> {
        let minimum = match metric_type {
            MetricType::Continuous => 2,
            MetricType::Proportion | MetricType::Count => 1,
        };
        if self.count < minimum {
            return Err(InsufficientData::TooFewObservations {
                arm,
                count: self.count,
                minimum,
            });
        }
        if !(self.sum.is_finite() && self.sum_squares.is_finite()) {
            return Err(InsufficientData::Inconsistent(format!(
                "{arm} arm has non-finite totals"
            )));
        }
        match metric_type {
            MetricType::Proportion if self.sum < 0.0 || self.sum > self.count as f64 => {
                Err(InsufficientData::Inconsistent(format!(
                    "{arm} arm has {} successes out of {} units",
                    self.sum, self.count
                )))
            }
            MetricType::Count if self.sum < 0.0 => Err(InsufficientData::Inconsistent(format!(
                "{arm} arm has a negative event total"
            ))),
            _ => Ok(()),
        }
    }
}

/// Control and treatment aggregates for one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    /// Control arm.
    pub control: ArmStatistics,
    /// Treatment arm.
    pub treatment: ArmStatistics,
}

impl MetricStatistics {
    /// Pair up control and treatment aggregates.
    pub fn new(control: ArmStatistics, treatment: ArmStatistics) -> Self {
        Self { control, treatment }
    }

    /// Aggregates for the given arm.
    pub fn arm(&self, arm: Arm) -> &ArmStatistics {
        match arm {
            Arm::Control => &self.control,
            Arm::Treatment => &self.treatment,
        }
    }

    /// Treatment mean minus control mean.
    pub fn difference(&self) -> f64 {
        self.treatment.mean() - self.control.mean()
    }

    /// Total units across both arms.
    pub fn total_count(&self) -> u64 {
        self.control.count + self.treatment.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_matches_new() {
        let mut pushed = ArmStatistics::default();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            pushed.push(x);
        }
        assert_eq!(pushed, ArmStatistics::new(8, 40.0, 232.0));
        assert!((pushed.mean() - 5.0).abs() < 1e-12);
        assert!((pushed.variance() - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_is_additive() {
        let mut a = ArmStatistics::new(3, 6.0, 14.0);
        a.merge(&ArmStatistics::new(2, 9.0, 41.0));
        assert_eq!(a, ArmStatistics::new(5, 15.0, 55.0));
    }

    #[test]
    fn test_binary_variance_is_bernoulli() {
        let s = ArmStatistics::from_successes(1000, 100);
        // n/(n-1) · p(1-p)
        assert!((s.variance() - 0.09 * 1000.0 / 999.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_and_singleton() {
        let empty = ArmStatistics::default();
        assert_eq!(empty.mean(), 0.0);
        assert_eq!(empty.variance(), 0.0);
        assert!(matches!(
            empty.validate(Arm::Control, MetricType::Proportion),
            Err(InsufficientData::TooFewObservations { arm: Arm::Control, count: 0, minimum: 1 })
        ));
        let one = ArmStatistics::new(1, 3.0, 9.0);
        assert!(one.validate(Arm::Treatment, MetricType::Continuous).is_err());
        assert!(one.validate(Arm::Treatment, MetricType::Count).is_ok());
    }

    #[test]
    fn test_inconsistent_proportion_rejected() {
        let s = ArmStatistics::from_successes(10, 11);
        assert!(matches!(
            s.validate(Arm::Treatment, MetricType::Proportion),
            Err(InsufficientData::Inconsistent(_))
        ));
    }

    #[test]
    fn test_difference() {
        let m = MetricStatistics::new(
            ArmStatistics::from_successes(100, 10),
            ArmStatistics::from_successes(100, 15),
        );
        assert!((m.difference() - 0.05).abs() < 1e-12);
        assert_eq!(m.arm(Arm::Treatment).count, 100);
        assert_eq!(m.total_count(), 200);
    }
}
