//! Power and sample-size planning.
//!
//! [`plan`] turns an [`ExperimentDesign`] and traffic assumptions into a
//! [`PowerPlan`]: the fixed-horizon sample size, its sequential inflation,
//! how long the experiment runs and when each look happens.

mod duration;
mod sample_size;

pub use duration::{
    cumulative_traffic, date_of_day, day_for_fraction, estimate_duration, fractions_for_days,
    suggest_start_dates, BlackoutPeriod, DurationEstimate, StartDateSuggestion,
};
pub use sample_size::{fixed_horizon, FixedHorizonSize};

use serde::{Deserialize, Serialize};

use seqmon_core::BoundarySet;

use crate::config::PlannerConfig;
use crate::design::ExperimentDesign;
use crate::error::{InfeasibleDesignError, Result};
use crate::schedule::LookSchedule;

/// Daily traffic below which a plan is marginal.
const LOW_TRAFFIC_THRESHOLD: f64 = 100.0;

/// Whether a plan can be run as computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    /// All checks passed.
    Feasible,
    /// Runnable, but an assumption or traffic check failed. See the plan's
    /// reasons.
    Marginal,
}

impl std::fmt::Display for Feasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feasibility::Feasible => write!(f, "feasible"),
            Feasibility::Marginal => write!(f, "marginal"),
        }
    }
}

/// Output of [`plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerPlan {
    /// Experiment name.
    pub experiment: String,
    /// Single-look sample size at the design's α and power.
    pub fixed_horizon: FixedHorizonSize,
    /// Maximum sequential sample size over the fixed-horizon size.
    pub inflation_factor: f64,
    /// Control-arm units needed by the sequential design.
    pub required_control: u64,
    /// Treatment-arm units needed by the sequential design.
    pub required_treatment: u64,
    /// Control-arm target including the safety buffer.
    pub target_control: u64,
    /// Treatment-arm target including the safety buffer.
    pub target_treatment: u64,
    /// Expected run length.
    pub duration: DurationEstimate,
    /// Planned looks with their information fractions and, when a start
    /// date is known, their dates.
    pub schedule: LookSchedule,
    /// Overall feasibility.
    pub feasibility: Feasibility,
    /// Why the plan is marginal. Empty when feasible.
    pub reasons: Vec<String>,
    /// Caveats that don't affect feasibility.
    pub warnings: Vec<String>,
    /// Conflict-free start dates, when a reference date was given.
    pub suggested_start_dates: Vec<StartDateSuggestion>,
}

impl PowerPlan {
    /// Target units across both arms.
    pub fn target_total(&self) -> u64 {
        self.target_control + self.target_treatment
    }

    /// Whether the plan passed every check.
    pub fn is_feasible(&self) -> bool {
        self.feasibility == Feasibility::Feasible
    }
}

/// Plan sample size, duration and look schedule for `design`.
///
/// Information fractions come from the planner's calendar look days when
/// given, else from the design. The inflation factor is computed for the
/// fractions actually scheduled.
pub fn plan(design: &ExperimentDesign, config: &PlannerConfig) -> Result<PowerPlan> {
    design.validate()?;

    let looks = design.planned_looks();
    let fractions = match &config.look_days {
        Some(days) => {
            if days.len() != looks {
                return Err(InfeasibleDesignError::InvalidCalendar(format!(
                    "{} look days given for {} planned looks",
                    days.len(),
                    looks
                ))
                .into());
            }
            fractions_for_days(config, days, 0)?
        }
        None => design.information_fractions()?,
    };

    let fixed = fixed_horizon(design, config.pooled_variance)?;
    let boundaries = BoundarySet::solve(&design.sequential.family, &fractions, design.alpha)?;
    let inflation_factor = boundaries.inflation_factor(design.power)?;

    let required_control = (fixed.control as f64 * inflation_factor).ceil() as u64;
    let required_treatment = (fixed.treatment as f64 * inflation_factor).ceil() as u64;
    let target_control = (required_control as f64 * config.safety_buffer).ceil() as u64;
    let target_treatment = (required_treatment as f64 * config.safety_buffer).ceil() as u64;

    let f = design.allocation_ratio;
    let duration = estimate_duration(
        config,
        &[(1.0 - f, target_control), (f, target_treatment)],
    )?;

    let mut schedule = LookSchedule::from_fractions(&fractions)?;
    if let Some(days) = &config.look_days {
        // Re-checked now that the run length is known.
        fractions_for_days(config, days, duration.planned_days)?;
    }
    if let Some(start) = config.start_date {
        let dates: Vec<_> = match &config.look_days {
            Some(days) => days.iter().map(|&d| date_of_day(start, d)).collect(),
            None => fractions
                .iter()
                .map(|&t| date_of_day(start, day_for_fraction(config, t, duration.planned_days)))
                .collect(),
        };
        schedule = schedule.with_dates(&dates)?;
    }
    schedule = schedule.with_target(target_control);

    let mut reasons = Vec::new();
    if config.daily_traffic < LOW_TRAFFIC_THRESHOLD {
        reasons.push(format!(
            "daily traffic of {:.0} is below {:.0}",
            config.daily_traffic, LOW_TRAFFIC_THRESHOLD
        ));
    }
    if !fixed.assumptions_met {
        reasons.extend(fixed.warnings.iter().cloned());
    }
    let feasibility = if reasons.is_empty() {
        Feasibility::Feasible
    } else {
        Feasibility::Marginal
    };

    let mut warnings = Vec::new();
    if duration.extended_to_minimum {
        warnings.push(format!(
            "duration extended from {} to the minimum of {} days to cover weekly cycles",
            duration.adjusted_days, duration.planned_days
        ));
    }

    let suggested_start_dates = match config.reference_date {
        Some(reference) => suggest_start_dates(
            reference,
            duration.planned_days,
            &config.blackout_periods,
            config.start_date_suggestions,
        ),
        None => Vec::new(),
    };

    if feasibility == Feasibility::Marginal {
        tracing::warn!(
            experiment = %design.name,
            reasons = ?reasons,
            "plan is marginal"
        );
    }
    tracing::info!(
        experiment = %design.name,
        fixed_per_arm = fixed.control,
        inflation_factor,
        target_total = target_control + target_treatment,
        days = duration.planned_days,
        looks,
        "planned experiment"
    );

    Ok(PowerPlan {
        experiment: design.name.clone(),
        fixed_horizon: fixed,
        inflation_factor,
        required_control,
        required_treatment,
        target_control,
        target_treatment,
        duration,
        schedule,
        feasibility,
        reasons,
        warnings,
        suggested_start_dates,
    })
}

/// Copy of `design` whose look schedule is the one planned.
///
/// Use this to register calendar-derived information fractions before
/// monitoring begins.
pub fn design_with_schedule(design: &ExperimentDesign, plan: &PowerPlan) -> ExperimentDesign {
    let mut scheduled = design.clone();
    scheduled.sequential.planned_looks = plan.schedule.len();
    scheduled.sequential.look_schedule = Some(plan.schedule.fractions());
    scheduled
}
