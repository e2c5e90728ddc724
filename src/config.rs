//! Configuration for the planner, the monitor and the decision engine.
//!
//! Builder methods assert their invariants and panic with an explicit
//! message on invalid values. Configurations loaded through serde are
//! checked again where they are used.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use seqmon_core::constants::DEFAULT_CONFIDENCE_LEVEL;
use seqmon_core::EffectEstimator;

use crate::planner::BlackoutPeriod;

/// Monitor behaviour that is not part of the registered design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Estimator reported with terminal data-driven decisions.
    ///
    /// Default: median-unbiased.
    #[serde(default)]
    pub estimator: EffectEstimator,

    /// Confidence level of reported effect intervals.
    ///
    /// Default: 0.95.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            estimator: EffectEstimator::default(),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

impl MonitorConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the effect estimator.
    pub fn estimator(mut self, estimator: EffectEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Set the confidence level of effect intervals.
    pub fn confidence_level(mut self, level: f64) -> Self {
        assert!(
            level > 0.0 && level < 1.0,
            "confidence_level must be in (0, 1)"
        );
        self.confidence_level = level;
        self
    }
}

/// Linear ramp-up of eligible traffic at the start of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficRamp {
    /// Days until full traffic is reached.
    pub days: u32,
    /// Share of full traffic on the first day.
    pub initial_fraction: f64,
}

impl TrafficRamp {
    /// Share of full traffic on (1-based) day `day`.
    pub fn share(&self, day: u32) -> f64 {
        if self.days <= 1 || day >= self.days {
            return 1.0;
        }
        let progress = (day.saturating_sub(1)) as f64 / (self.days - 1) as f64;
        self.initial_fraction + (1.0 - self.initial_fraction) * progress
    }
}

/// Traffic, duration and calendar assumptions for the power planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    // =========================================================================
    // Traffic
    // =========================================================================
    /// Eligible units per day across both arms at full traffic.
    pub daily_traffic: f64,

    /// Optional ramp-up. Default: none (full traffic from day one).
    #[serde(default)]
    pub traffic_ramp: Option<TrafficRamp>,

    /// Coefficient of variation of daily traffic.
    ///
    /// Duration is inflated by `1 + variability / 2`. Default: 0.2.
    #[serde(default = "default_variability")]
    pub traffic_variability: f64,

    // =========================================================================
    // Sample size
    // =========================================================================
    /// Multiplier on the required sample for exclusions and data loss.
    ///
    /// Default: 1.1.
    #[serde(default = "default_safety_buffer")]
    pub safety_buffer: f64,

    /// Use the pooled standard error under H0 for proportions.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub pooled_variance: bool,

    // =========================================================================
    // Duration
    // =========================================================================
    /// Minimum run length covering weekly cycles. Default: 14 days.
    #[serde(default = "default_min_days")]
    pub min_duration_days: u32,

    /// Longest acceptable run. Default: 90 days.
    #[serde(default = "default_max_days")]
    pub max_duration_days: u32,

    // =========================================================================
    // Calendar
    // =========================================================================
    /// Planned start date; enables look dates.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Calendar day offsets (1-based, from the start date) of each look.
    ///
    /// When given, information fractions are derived from the expected
    /// accrual on those days instead of being equally spaced.
    #[serde(default)]
    pub look_days: Option<Vec<u32>>,

    /// Periods an experiment window should not overlap.
    #[serde(default)]
    pub blackout_periods: Vec<BlackoutPeriod>,

    /// Reference date from which start dates are suggested.
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,

    /// How many start dates to suggest. Default: 3.
    #[serde(default = "default_suggestions")]
    pub start_date_suggestions: usize,
}

fn default_variability() -> f64 {
    0.2
}

fn default_safety_buffer() -> f64 {
    1.1
}

fn default_true() -> bool {
    true
}

fn default_min_days() -> u32 {
    14
}

fn default_max_days() -> u32 {
    90
}

fn default_suggestions() -> usize {
    3
}

impl PlannerConfig {
    /// Planner configuration for `daily_traffic` eligible units per day.
    pub fn new(daily_traffic: f64) -> Self {
        assert!(
            daily_traffic.is_finite() && daily_traffic > 0.0,
            "daily_traffic must be positive"
        );
        Self {
            daily_traffic,
            traffic_ramp: None,
            traffic_variability: default_variability(),
            safety_buffer: default_safety_buffer(),
            pooled_variance: true,
            min_duration_days: default_min_days(),
            max_duration_days: default_max_days(),
            start_date: None,
            look_days: None,
            blackout_periods: Vec::new(),
            reference_date: None,
            start_date_suggestions: default_suggestions(),
        }
    }

    /// Set a linear traffic ramp.
    pub fn traffic_ramp(mut self, days: u32, initial_fraction: f64) -> Self {
        assert!(days > 0, "ramp days must be > 0");
        assert!(
            initial_fraction > 0.0 && initial_fraction <= 1.0,
            "initial_fraction must be in (0, 1]"
        );
        self.traffic_ramp = Some(TrafficRamp {
            days,
            initial_fraction,
        });
        self
    }

    /// Set the coefficient of variation of daily traffic.
    pub fn traffic_variability(mut self, cv: f64) -> Self {
        assert!(cv.is_finite() && cv >= 0.0, "traffic_variability must be >= 0");
        self.traffic_variability = cv;
        self
    }

    /// Set the safety buffer multiplier.
    pub fn safety_buffer(mut self, buffer: f64) -> Self {
        assert!(buffer.is_finite() && buffer >= 1.0, "safety_buffer must be >= 1");
        self.safety_buffer = buffer;
        self
    }

    /// Choose pooled (true) or unpooled standard errors for proportions.
    pub fn pooled_variance(mut self, pooled: bool) -> Self {
        self.pooled_variance = pooled;
        self
    }

    /// Set the minimum duration in days.
    pub fn min_duration_days(mut self, days: u32) -> Self {
        assert!(days > 0, "min_duration_days must be > 0");
        self.min_duration_days = days;
        self
    }

    /// Set the maximum duration in days.
    pub fn max_duration_days(mut self, days: u32) -> Self {
        assert!(days > 0, "max_duration_days must be > 0");
        self.max_duration_days = days;
        self
    }

    /// Set the planned start date.
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Set calendar look days (1-based offsets from the start date).
    pub fn look_days(mut self, days: Vec<u32>) -> Self {
        assert!(!days.is_empty(), "look_days must not be empty");
        assert!(
            days.windows(2).all(|w| w[0] < w[1]) && days[0] > 0,
            "look_days must be strictly increasing and positive"
        );
        self.look_days = Some(days);
        self
    }

    /// Add a blackout period.
    pub fn blackout(mut self, period: BlackoutPeriod) -> Self {
        self.blackout_periods.push(period);
        self
    }

    /// Suggest start dates on or after this reference date.
    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Set how many start dates to suggest.
    pub fn start_date_suggestions(mut self, n: usize) -> Self {
        self.start_date_suggestions = n;
        self
    }

    /// Units per day across both arms on (1-based) experiment day `day`.
    pub fn traffic_on_day(&self, day: u32) -> f64 {
        let share = self.traffic_ramp.map_or(1.0, |r| r.share(day));
        self.daily_traffic * share
    }
}

/// Pre-registered launch criteria for the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionCriteria {
    /// Minimum business-relevant improvement, in metric units.
    ///
    /// The effect interval must lie entirely above `max(0, threshold)` to
    /// launch. Default: 0.
    #[serde(default)]
    pub practical_threshold: f64,

    /// Cochran's Q p-value below which subgroups may be heterogeneous.
    ///
    /// Default: 0.05.
    #[serde(default = "default_heterogeneity_p")]
    pub heterogeneity_p_value: f64,

    /// I² above which heterogeneity is material. Default: 0.5.
    #[serde(default = "default_max_i_squared")]
    pub max_i_squared: f64,
}

fn default_heterogeneity_p() -> f64 {
    0.05
}

fn default_max_i_squared() -> f64 {
    0.5
}

impl Default for DecisionCriteria {
    fn default() -> Self {
        Self {
            practical_threshold: 0.0,
            heterogeneity_p_value: default_heterogeneity_p(),
            max_i_squared: default_max_i_squared(),
        }
    }
}

impl DecisionCriteria {
    /// Default criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the practical-significance threshold.
    pub fn practical_threshold(mut self, threshold: f64) -> Self {
        assert!(
            threshold.is_finite() && threshold >= 0.0,
            "practical_threshold must be non-negative"
        );
        self.practical_threshold = threshold;
        self
    }

    /// Set the heterogeneity p-value cutoff.
    pub fn heterogeneity_p_value(mut self, p: f64) -> Self {
        assert!(p > 0.0 && p < 1.0, "heterogeneity_p_value must be in (0, 1)");
        self.heterogeneity_p_value = p;
        self
    }

    /// Set the I² cutoff.
    pub fn max_i_squared(mut self, i_squared: f64) -> Self {
        assert!(
            (0.0..1.0).contains(&i_squared),
            "max_i_squared must be in [0, 1)"
        );
        self.max_i_squared = i_squared;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_share() {
        let ramp = TrafficRamp {
            days: 5,
            initial_fraction: 0.2,
        };
        assert!((ramp.share(1) - 0.2).abs() < 1e-12);
        assert!((ramp.share(3) - 0.6).abs() < 1e-12);
        assert_eq!(ramp.share(5), 1.0);
        assert_eq!(ramp.share(40), 1.0);
    }

    #[test]
    fn test_traffic_on_day() {
        let cfg = PlannerConfig::new(1000.0).traffic_ramp(3, 0.5);
        assert!((cfg.traffic_on_day(1) - 500.0).abs() < 1e-9);
        assert!((cfg.traffic_on_day(2) - 750.0).abs() < 1e-9);
        assert!((cfg.traffic_on_day(10) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_planner_defaults_deserialize() {
        let cfg: PlannerConfig = serde_json::from_str(r#"{"daily_traffic": 5000}"#).unwrap();
        assert_eq!(cfg, PlannerConfig::new(5000.0));
    }
}
