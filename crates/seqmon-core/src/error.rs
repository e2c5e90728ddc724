//! Error type for the statistics core.

use thiserror::Error;

/// Invalid input to a boundary, test-statistic or estimator computation.
///
/// These indicate programming or configuration mistakes. No degenerate
/// boundary is ever returned in their place.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    /// Total planned looks must be at least one.
    #[error("total planned looks must be >= 1, got {0}")]
    NoLooks(usize),

    /// Look index outside `1..=total`.
    #[error("look index {look} is outside 1..={total}")]
    LookOutOfRange {
        /// Requested look (1-based).
        look: usize,
        /// Total planned looks.
        total: usize,
    },

    /// Significance level outside the open unit interval.
    #[error("alpha must be in (0, 1), got {0}")]
    InvalidAlpha(f64),

    /// A probability-valued parameter outside the open unit interval.
    #[error("{name} must be in (0, 1), got {value}")]
    InvalidProbability {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Information fractions must be strictly increasing in (0, 1] and end at 1.
    #[error("invalid information fractions: {0}")]
    InvalidFractions(String),

    /// Spending function parameters don't describe a monotone curve ending at α.
    #[error("invalid spending function: {0}")]
    InvalidSpending(String),

    /// A distribution could not be constructed.
    #[error("{name} distribution rejected its parameters ({detail})")]
    Distribution {
        /// Distribution name.
        name: &'static str,
        /// Parameter description.
        detail: String,
    },

    /// Heterogeneity statistics need at least two subgroups.
    #[error("heterogeneity needs at least two subgroups, got {0}")]
    TooFewSubgroups(usize),

    /// A non-finite value appeared where a finite one is required.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),

    /// No bracket around the root was found within the search limit.
    #[error("could not bracket {name} = {target} (searched drift in [{lo}, {hi}])")]
    RootNotBracketed {
        /// Quantity being solved for.
        name: &'static str,
        /// Target value of the monotone function.
        target: f64,
        /// Lower end of the widest bracket tried.
        lo: f64,
        /// Upper end of the widest bracket tried.
        hi: f64,
    },
}

/// The interim data cannot support a test statistic.
///
/// This is a recoverable condition: the caller defers the look and retries
/// once more data has accrued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsufficientData {
    /// One of the arms has fewer observations than required.
    #[error("{arm} arm has {count} observations, need at least {minimum}")]
    TooFewObservations {
        /// Which arm.
        arm: crate::types::Arm,
        /// Observations present.
        count: u64,
        /// Minimum required.
        minimum: u64,
    },

    /// The pooled variance is zero, so the statistic is undefined.
    #[error("pooled variance is zero ({0})")]
    DegenerateVariance(&'static str),

    /// Aggregates are internally inconsistent (e.g. successes > trials).
    #[error("inconsistent sufficient statistics: {0}")]
    Inconsistent(String),
}
