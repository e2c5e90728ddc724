//! # seqmon
//!
//! Sequential monitoring of controlled experiments (A/B tests) with
//! statistically valid early stopping.
//!
//! The crate covers three stages, in the order data flows through them:
//! - [`planner`]: sample size, sequential inflation, duration and the look
//!   schedule for an [`ExperimentDesign`]
//! - [`monitor`]: a per-experiment state machine that evaluates interim
//!   looks against group-sequential boundaries, guardrails and futility
//! - [`decision`]: launch / no-launch / hold from a terminal decision
//!
//! Boundaries, test statistics and estimators live in `seqmon_core`.
//!
//! ## Quick Start
//!
//! ```
//! use seqmon::{
//!     plan, ExperimentDesign, MinimumDetectableEffect, PlannerConfig, SequentialPlan,
//! };
//! use seqmon_core::{MetricType, SpendingFamily};
//!
//! let design = ExperimentDesign::new(
//!     "checkout_button",
//!     "conversion",
//!     MetricType::Proportion,
//!     0.10,
//!     MinimumDetectableEffect::Relative(0.1),
//!     SequentialPlan::new(SpendingFamily::ObrienFleming, 4),
//! );
//! let plan = plan(&design, &PlannerConfig::new(5000.0)).unwrap();
//! assert_eq!(plan.schedule.len(), 4);
//! assert!(plan.inflation_factor > 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod design;
mod error;
mod schedule;

// Functional modules
pub mod decision;
pub mod interim;
pub mod monitor;
pub mod output;
pub mod planner;

// Re-exports for public API
pub use config::{DecisionCriteria, MonitorConfig, PlannerConfig, TrafficRamp};
pub use decision::{recommend, Recommendation, RecommendationRecord};
pub use design::{ExperimentDesign, FutilityRule, MinimumDetectableEffect, SequentialPlan};
pub use error::{
    DataQualityError, DecisionError, DesignError, Error, InfeasibleDesignError, Result,
    SequenceOrderError,
};
pub use interim::{InterimSource, InterimStatistics, RecordedInterims, ReplayEntry};
pub use monitor::{
    evaluate_fleet, evaluate_guardrails, DecisionKind, GuardrailDefinition, GuardrailDirection,
    GuardrailMeasure, GuardrailStatus, LookRecord, MonitorState, SequentialMonitor,
    StoppingDecision,
};
pub use planner::{plan, BlackoutPeriod, Feasibility, PowerPlan};
pub use schedule::{LookSchedule, PlannedLook};
