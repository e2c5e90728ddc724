//! Numerical constants and defaults used throughout the crate.

/// Default two-sided significance level α.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Default target power (1 - β).
pub const DEFAULT_POWER: f64 = 0.80;

/// Conventional conditional-power futility threshold.
pub const DEFAULT_FUTILITY_THRESHOLD: f64 = 0.20;

/// Default confidence level for reported effect intervals.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Largest critical value a boundary may take.
///
/// A look that is allotted (numerically) no alpha gets this boundary, which
/// corresponds to a two-sided nominal p-value of about 4e-33.
pub const Z_CAP: f64 = 12.0;

/// Minimum number of grid points per stage of the recursive integration.
pub const MIN_GRID_POINTS: usize = 65;

/// Maximum number of grid points per stage of the recursive integration.
pub const MAX_GRID_POINTS: usize = 2001;

/// Grid points per standard deviation of the increment between two looks.
pub const GRID_POINTS_PER_SD: f64 = 8.0;

/// Iteration cap for bisection searches.
pub const BISECTION_ITERATIONS: usize = 100;

/// Bracket width at which bisection stops.
pub const BISECTION_TOLERANCE: f64 = 1e-12;

/// Tolerance used when checking that a spending curve ends at α.
pub const SPENDING_TOLERANCE: f64 = 1e-9;

/// Initial half-width (in drift units) of the search bracket for estimators.
pub const DRIFT_SEARCH_HALF_WIDTH: f64 = 15.0;

/// Times an estimator bracket may double before the search gives up.
pub const DRIFT_SEARCH_MAX_DOUBLINGS: usize = 8;
