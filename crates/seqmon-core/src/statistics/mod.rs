//! Sufficient statistics for two-arm comparisons.
//!
//! Interim data arrives as per-arm aggregates (count, sum, sum of squares),
//! which is all the supported tests need.

mod sufficient;

pub use sufficient::{ArmStatistics, MetricStatistics};
