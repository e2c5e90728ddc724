//! Common types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Treatment arm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    /// Reference experience the treatment is compared against.
    Control,
    /// The variant under test.
    Treatment,
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::Control => write!(f, "control"),
            Arm::Treatment => write!(f, "treatment"),
        }
    }
}

/// Declared type of a metric, which selects the test applied to it.
///
/// Selection is always driven by this declaration, never by inspecting the
/// data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Rates and conversions. Per-arm `sum` is the number of successes.
    ///
    /// Tested with the pooled two-proportion z-test.
    Proportion,

    /// Real-valued per-unit outcomes (order value, session length).
    ///
    /// Tested with Welch's two-sample t-test.
    Continuous,

    /// Event counts per unit (items per order, page views per session).
    ///
    /// Tested with the pooled Poisson rate z-test.
    Count,
}

impl MetricType {
    /// Name of the test applied to this metric type.
    pub fn test_name(&self) -> &'static str {
        match self {
            MetricType::Proportion => "two-proportion z-test",
            MetricType::Continuous => "Welch two-sample t-test",
            MetricType::Count => "Poisson rate z-test",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::Proportion => write!(f, "proportion"),
            MetricType::Continuous => write!(f, "continuous"),
            MetricType::Count => write!(f, "count"),
        }
    }
}

/// Which direction of change counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementDirection {
    /// Larger treatment values are better (conversion, revenue).
    #[default]
    HigherIsBetter,
    /// Smaller treatment values are better (latency, churn).
    LowerIsBetter,
}

impl ImprovementDirection {
    /// Multiplier that turns a raw treatment-minus-control difference into
    /// an improvement (positive = better).
    pub fn sign(&self) -> f64 {
        match self {
            ImprovementDirection::HigherIsBetter => 1.0,
            ImprovementDirection::LowerIsBetter => -1.0,
        }
    }
}
