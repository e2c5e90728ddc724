//! Tests for configuration validation.
//!
//! Builder methods reject invalid values with a panic naming the field.
//! Designs are checked by `validate` and fail with a typed error instead.

use seqmon::{
    DecisionCriteria, DesignError, Error, ExperimentDesign, FutilityRule, MinimumDetectableEffect,
    MonitorConfig, PlannerConfig, SequentialMonitor, SequentialPlan,
};
use seqmon_core::{BoundarySet, ComputationError, ConditionalPowerTrend, MetricType, SpendingFamily};

// =============================================================================
// PLANNER
// =============================================================================

#[test]
#[should_panic(expected = "daily_traffic must be positive")]
fn zero_traffic_panics() {
    let _ = PlannerConfig::new(0.0);
}

#[test]
#[should_panic(expected = "daily_traffic must be positive")]
fn nan_traffic_panics() {
    let _ = PlannerConfig::new(f64::NAN);
}

#[test]
#[should_panic(expected = "initial_fraction must be in (0, 1]")]
fn ramp_fraction_zero_panics() {
    let _ = PlannerConfig::new(1000.0).traffic_ramp(7, 0.0);
}

#[test]
#[should_panic(expected = "safety_buffer must be >= 1")]
fn safety_buffer_below_one_panics() {
    let _ = PlannerConfig::new(1000.0).safety_buffer(0.9);
}

#[test]
#[should_panic(expected = "look_days must be strictly increasing and positive")]
fn unordered_look_days_panic() {
    let _ = PlannerConfig::new(1000.0).look_days(vec![7, 7, 21]);
}

#[test]
fn planner_builder_keeps_values() {
    let cfg = PlannerConfig::new(2500.0)
        .traffic_variability(0.0)
        .safety_buffer(1.0)
        .min_duration_days(7)
        .max_duration_days(30);
    assert_eq!(cfg.daily_traffic, 2500.0);
    assert_eq!(cfg.traffic_variability, 0.0);
    assert_eq!(cfg.safety_buffer, 1.0);
    assert_eq!((cfg.min_duration_days, cfg.max_duration_days), (7, 30));
}

// =============================================================================
// MONITOR
// =============================================================================

#[test]
#[should_panic(expected = "confidence_level must be in (0, 1)")]
fn confidence_level_one_panics() {
    let _ = MonitorConfig::new().confidence_level(1.0);
}

#[test]
fn confidence_level_valid() {
    assert_eq!(MonitorConfig::new().confidence_level(0.9).confidence_level, 0.9);
}

#[test]
fn deserialized_confidence_level_is_checked() {
    let config: MonitorConfig = serde_json::from_str(r#"{"confidence_level": 1.5}"#).unwrap();
    let err = SequentialMonitor::new(design(), config).unwrap_err();
    assert!(matches!(err, Error::Computation(_)));
}

// =============================================================================
// DECISION CRITERIA
// =============================================================================

#[test]
#[should_panic(expected = "practical_threshold must be non-negative")]
fn negative_practical_threshold_panics() {
    let _ = DecisionCriteria::new().practical_threshold(-0.01);
}

#[test]
#[should_panic(expected = "max_i_squared must be in [0, 1)")]
fn i_squared_one_panics() {
    let _ = DecisionCriteria::new().max_i_squared(1.0);
}

#[test]
fn decision_criteria_defaults() {
    let c = DecisionCriteria::default();
    assert_eq!(c.practical_threshold, 0.0);
    assert_eq!(c.heterogeneity_p_value, 0.05);
    assert_eq!(c.max_i_squared, 0.5);
}

// =============================================================================
// DESIGN
// =============================================================================

fn design() -> ExperimentDesign {
    ExperimentDesign::new(
        "checkout",
        "conversion",
        MetricType::Proportion,
        0.10,
        MinimumDetectableEffect::Relative(0.1),
        SequentialPlan::new(SpendingFamily::ObrienFleming, 4),
    )
}

#[test]
fn design_rejects_bad_alpha() {
    let err = design().with_alpha(0.0).validate().unwrap_err();
    assert!(matches!(
        err,
        Error::Computation(ComputationError::InvalidAlpha(_))
    ));
}

#[test]
fn design_rejects_bad_power() {
    let err = design().with_power(1.0).validate().unwrap_err();
    assert!(matches!(err, Error::Design(DesignError::InvalidPower(_))));
}

#[test]
fn design_rejects_zero_looks() {
    let mut d = design();
    d.sequential.planned_looks = 0;
    assert!(matches!(
        d.validate().unwrap_err(),
        Error::Computation(ComputationError::NoLooks(0))
    ));
}

#[test]
fn design_rejects_schedule_not_ending_at_one() {
    let mut d = design();
    d.sequential = d.sequential.with_schedule(vec![0.2, 0.5, 0.7, 0.9]);
    assert!(matches!(
        d.validate().unwrap_err(),
        Error::Computation(ComputationError::InvalidFractions(_))
    ));
}

#[test]
fn design_rejects_futility_threshold_of_one() {
    let mut d = design();
    d.sequential.futility =
        Some(FutilityRule::new(ConditionalPowerTrend::CurrentTrend).with_threshold(1.0));
    assert!(matches!(
        d.validate().unwrap_err(),
        Error::Design(DesignError::InvalidFutilityThreshold(_))
    ));
}

#[test]
fn design_json_requires_futility_trend() {
    // A futility rule without an explicit trend is rejected at parse time
    let json = r#"{
        "name": "checkout",
        "primary_metric": "conversion",
        "metric_type": "proportion",
        "baseline_mean": 0.1,
        "minimum_detectable_effect": {"relative": 0.1},
        "sequential": {
            "method": "obrien_fleming",
            "planned_looks": 4,
            "futility": {"threshold": 0.2}
        }
    }"#;
    assert!(matches!(
        ExperimentDesign::from_json(json).unwrap_err(),
        Error::Json(_)
    ));
}

#[test]
fn mismatched_boundaries_rejected() {
    let pocock = BoundarySet::equally_spaced(&SpendingFamily::Pocock, 4, 0.05).unwrap();
    let err = SequentialMonitor::with_boundaries(design(), MonitorConfig::default(), pocock)
        .unwrap_err();
    assert!(matches!(err, Error::Design(DesignError::BoundaryMismatch(_))));

    let three_looks =
        BoundarySet::equally_spaced(&SpendingFamily::ObrienFleming, 3, 0.05).unwrap();
    assert!(
        SequentialMonitor::with_boundaries(design(), MonitorConfig::default(), three_looks)
            .is_err()
    );
}
