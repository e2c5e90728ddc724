//! Core statistics for sequential monitoring of controlled experiments.
//!
//! This crate is pure computation: no I/O, no logging, no clocks. It
//! provides
//!
//! - alpha-spending functions and group-sequential boundaries solved by
//!   recursive integration of the Brownian-motion score process
//!   ([`spending`]),
//! - per-arm sufficient statistics ([`statistics`]),
//! - two-sample test statistics, conditional power, the median-unbiased
//!   estimator and subgroup heterogeneity ([`analysis`]).
//!
//! It is typically used through the `seqmon` crate, which adds experiment
//! designs, planning, the monitor state machine and output.
//!
//! ```
//! use seqmon_core::spending::{boundary, SpendingFamily};
//!
//! let b = boundary(&SpendingFamily::ObrienFleming, 4, 1, 0.05).unwrap();
//! assert!(b.p_threshold < 1e-4);
//! ```

pub mod analysis;
pub mod constants;
pub mod error;
pub mod math;
pub mod spending;
pub mod statistics;
pub mod types;

pub use analysis::{ConditionalPowerTrend, EffectEstimate, EffectEstimator, TestStatistic};
pub use error::{ComputationError, InsufficientData};
pub use spending::{boundary, boundary_at, BoundarySet, BoundaryValue, SpendingFamily, SpendingFunction};
pub use statistics::{ArmStatistics, MetricStatistics};
pub use types::{Arm, ImprovementDirection, MetricType};
