//! Error types.
//!
//! Each concern has its own enum. [`Error`] wraps them all for callers that
//! just want `?`.

use thiserror::Error;

use seqmon_core::{ComputationError, InsufficientData};

use crate::monitor::DecisionKind;

/// The design cannot be run as specified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InfeasibleDesignError {
    /// Baseline variance of the primary metric is zero or negative.
    #[error("baseline variance must be positive, got {0}")]
    NonPositiveVariance(f64),

    /// A proportion baseline outside (0, 1), or an alternative pushed outside it.
    #[error("{name} proportion must be in (0, 1), got {value}")]
    ProportionOutOfRange {
        /// Which proportion.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Required duration exceeds the configured horizon.
    #[error("required duration of {required_days} days exceeds the maximum of {max_days} days")]
    ExceedsHorizon {
        /// Days needed to reach the target sample.
        required_days: u32,
        /// Maximum allowed.
        max_days: u32,
    },

    /// No traffic at all.
    #[error("daily traffic must be positive, got {0}")]
    NoTraffic(f64),

    /// Calendar look days don't fit the expected experiment window.
    #[error("calendar look days are invalid: {0}")]
    InvalidCalendar(String),
}

/// Malformed design fields, rejected at validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DesignError {
    /// Required text field is empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Target power outside (0, 1).
    #[error("power must be in (0, 1), got {0}")]
    InvalidPower(f64),

    /// Treatment allocation outside (0, 1).
    #[error("allocation ratio must be in (0, 1), got {0}")]
    InvalidAllocation(f64),

    /// Minimum detectable effect is zero, negative, or not finite.
    #[error("minimum detectable effect must be positive and finite, got {0}")]
    InvalidEffect(f64),

    /// Baseline mean isn't a finite number.
    #[error("baseline mean must be finite, got {0}")]
    InvalidBaseline(f64),

    /// Continuous metrics need an explicit baseline variance.
    #[error("metric type {0} requires a baseline variance")]
    MissingVariance(seqmon_core::MetricType),

    /// A guardrail definition is unusable.
    #[error("guardrail '{name}': {reason}")]
    InvalidGuardrail {
        /// Guardrail name.
        name: String,
        /// What's wrong.
        reason: String,
    },

    /// Two guardrails share a name.
    #[error("duplicate guardrail name '{0}'")]
    DuplicateGuardrail(String),

    /// Futility rule threshold outside (0, 1).
    #[error("futility threshold must be in (0, 1), got {0}")]
    InvalidFutilityThreshold(f64),

    /// Pre-solved boundaries were solved for a different plan.
    #[error("boundary set does not match the design: {0}")]
    BoundaryMismatch(String),
}

/// A look was submitted out of sequence.
///
/// The monitor's state is unchanged and nothing is recorded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequenceOrderError {
    /// Look index isn't the next one due.
    #[error("look {got} submitted but look {expected} is next")]
    OutOfOrder {
        /// Next look the monitor expects.
        expected: usize,
        /// Look index submitted.
        got: usize,
    },

    /// Look index beyond the planned number of looks.
    #[error("look {got} exceeds the {planned} planned looks")]
    BeyondPlan {
        /// Look index submitted.
        got: usize,
        /// Planned looks K.
        planned: usize,
    },

    /// The monitor has already reached a terminal decision.
    #[error("monitor is terminal ({kind}) after look {look}")]
    AlreadyTerminal {
        /// Terminal decision.
        kind: DecisionKind,
        /// Look at which it was reached (0 for an override before any look).
        look: usize,
    },
}

/// Interim data can't support the requested computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataQualityError {
    /// The snapshot has no statistics for a required metric.
    #[error("no interim statistics for metric '{0}'")]
    MissingMetric(String),

    /// The primary metric's data can't produce a test statistic.
    #[error("metric '{metric}': {source}")]
    Insufficient {
        /// Metric id.
        metric: String,
        /// Underlying problem.
        #[source]
        source: InsufficientData,
    },

    /// A registered guardrail has no status or no observed value.
    #[error("guardrail '{0}' has no observed value")]
    MissingGuardrail(String),

    /// The data source has nothing for this look yet.
    #[error("no interim statistics for experiment '{experiment}' look {look}")]
    Unavailable {
        /// Experiment name.
        experiment: String,
        /// Requested look.
        look: usize,
    },
}

/// The decision engine was called with unusable input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionError {
    /// Only terminal stopping decisions can be turned into recommendations.
    #[error("decision kind {0} is not terminal")]
    NotTerminal(DecisionKind),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid boundary or statistic computation.
    #[error(transparent)]
    Computation(#[from] ComputationError),

    /// The planner refused the design.
    #[error(transparent)]
    InfeasibleDesign(#[from] InfeasibleDesignError),

    /// Malformed design.
    #[error(transparent)]
    Design(#[from] DesignError),

    /// Look submitted out of order.
    #[error(transparent)]
    SequenceOrder(#[from] SequenceOrderError),

    /// Interim data problem.
    #[error(transparent)]
    DataQuality(#[from] DataQualityError),

    /// Decision engine misuse.
    #[error(transparent)]
    Decision(#[from] DecisionError),

    /// Reading input or writing the decision log failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input or output JSON was malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying with better data can succeed.
    ///
    /// Only data-quality conditions are recoverable; everything else
    /// indicates a programming or configuration mistake.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DataQuality(_))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
