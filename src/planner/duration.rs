//! Experiment duration, calendar look placement and start-date suggestions.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::error::{InfeasibleDesignError, Result};

/// Weeks ahead searched for start dates.
const SUGGESTION_SEARCH_WEEKS: i64 = 52;

/// How long the experiment must run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationEstimate {
    /// Days to accrue the target sample in every arm at expected traffic.
    pub base_days: u32,
    /// After the traffic-variability buffer.
    pub adjusted_days: u32,
    /// Planned run length (at least the configured minimum).
    pub planned_days: u32,
    /// Whether the minimum duration extended the run.
    pub extended_to_minimum: bool,
}

impl DurationEstimate {
    /// Planned length in weeks, rounded to one decimal.
    pub fn weeks(&self) -> f64 {
        (self.planned_days as f64 / 7.0 * 10.0).round() / 10.0
    }
}

/// Units accrued across both arms by the end of (1-based) day `day`.
pub fn cumulative_traffic(config: &PlannerConfig, day: u32) -> f64 {
    (1..=day).map(|d| config.traffic_on_day(d)).sum()
}

/// Days until every arm reaches its target.
///
/// `arm_targets` pairs each arm's traffic share with its target units.
pub fn estimate_duration(
    config: &PlannerConfig,
    arm_targets: &[(f64, u64)],
) -> Result<DurationEstimate> {
    if !(config.daily_traffic.is_finite() && config.daily_traffic > 0.0) {
        return Err(InfeasibleDesignError::NoTraffic(config.daily_traffic).into());
    }
    // Total accrual the slowest arm needs.
    let needed = arm_targets
        .iter()
        .map(|&(share, target)| target as f64 / share)
        .fold(0.0_f64, f64::max);

    let max_days = config.max_duration_days;
    let mut accrued = 0.0;
    let mut base_days = None;
    for day in 1..=max_days {
        accrued += config.traffic_on_day(day);
        if accrued >= needed {
            base_days = Some(day);
            break;
        }
    }
    let Some(base_days) = base_days else {
        let remaining = (needed - accrued).max(0.0);
        let extra = (remaining / config.daily_traffic).ceil() as u32;
        return Err(InfeasibleDesignError::ExceedsHorizon {
            required_days: max_days.saturating_add(extra),
            max_days,
        }
        .into());
    };

    let variability_buffer = 1.0 + 0.5 * config.traffic_variability;
    let adjusted_days = (base_days as f64 * variability_buffer).ceil() as u32;
    if adjusted_days > max_days {
        return Err(InfeasibleDesignError::ExceedsHorizon {
            required_days: adjusted_days,
            max_days,
        }
        .into());
    }
    let planned_days = adjusted_days.max(config.min_duration_days);
    if planned_days > max_days {
        return Err(InfeasibleDesignError::ExceedsHorizon {
            required_days: planned_days,
            max_days,
        }
        .into());
    }

    Ok(DurationEstimate {
        base_days,
        adjusted_days,
        planned_days,
        extended_to_minimum: planned_days > adjusted_days,
    })
}

/// Information fractions of looks on calendar days `look_days`, relative to
/// the accrual at the last look.
///
/// The last look must not come before `required_days`.
pub fn fractions_for_days(
    config: &PlannerConfig,
    look_days: &[u32],
    required_days: u32,
) -> Result<Vec<f64>> {
    let Some(&last) = look_days.last() else {
        return Err(InfeasibleDesignError::InvalidCalendar("no look days given".into()).into());
    };
    if look_days.windows(2).any(|w| w[0] >= w[1]) || look_days[0] == 0 {
        return Err(InfeasibleDesignError::InvalidCalendar(format!(
            "look days {look_days:?} must be strictly increasing and positive"
        ))
        .into());
    }
    if last < required_days {
        return Err(InfeasibleDesignError::InvalidCalendar(format!(
            "final look on day {last} comes before the required {required_days} days"
        ))
        .into());
    }
    let total = cumulative_traffic(config, last);
    let mut fractions: Vec<f64> = look_days
        .iter()
        .map(|&d| cumulative_traffic(config, d) / total)
        .collect();
    if let Some(f) = fractions.last_mut() {
        *f = 1.0;
    }
    Ok(fractions)
}

/// Earliest day by which accrual reaches fraction `t` of the accrual on
/// `final_day`.
pub fn day_for_fraction(config: &PlannerConfig, t: f64, final_day: u32) -> u32 {
    let target = t * cumulative_traffic(config, final_day);
    let mut accrued = 0.0;
    for day in 1..=final_day {
        accrued += config.traffic_on_day(day);
        // Small tolerance so t = k/K lands on its exact day
        if accrued + 1e-9 * target.max(1.0) >= target {
            return day;
        }
    }
    final_day
}

/// Calendar date of (1-based) experiment day `day`.
pub fn date_of_day(start: NaiveDate, day: u32) -> NaiveDate {
    start + Duration::days(i64::from(day.saturating_sub(1)))
}

/// A period an experiment window should avoid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    /// Label shown in reports.
    pub name: String,
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
}

impl BlackoutPeriod {
    /// Construct a blackout period.
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Whether `[start, end]` overlaps this period.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }

    /// Retail calendar periods with atypical shopping behaviour around the
    /// year of `reference`.
    ///
    /// The previous year is included so that a January reference still
    /// sees the Christmas period it falls in.
    pub fn retail_calendar(reference: NaiveDate) -> Vec<BlackoutPeriod> {
        let y = reference.year();
        let mut periods = Vec::new();
        for year in [y - 1, y, y + 1] {
            let spans = [
                ("Holiday shopping season", (year, 11, 20), (year, 12, 5)),
                ("Christmas and New Year", (year, 12, 10), (year + 1, 1, 10)),
                ("Valentine's Day", (year, 2, 8), (year, 2, 18)),
                ("Easter", (year, 3, 20), (year, 4, 10)),
                ("Summer vacation", (year, 6, 15), (year, 8, 15)),
                ("Back to school", (year, 8, 15), (year, 9, 15)),
            ];
            for (name, (sy, sm, sd), (ey, em, ed)) in spans {
                if let (Some(start), Some(end)) = (
                    NaiveDate::from_ymd_opt(sy, sm, sd),
                    NaiveDate::from_ymd_opt(ey, em, ed),
                ) {
                    periods.push(BlackoutPeriod::new(name, start, end));
                }
            }
        }
        periods
    }
}

/// A suggested start date whose window avoids every blackout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDateSuggestion {
    /// First day of the experiment (a Monday).
    pub start: NaiveDate,
    /// Day after the planned last day.
    pub end: NaiveDate,
    /// Why this slot is suggested.
    pub reason: String,
}

/// Up to `count` Mondays after `reference` whose `duration_days` window
/// avoids `blackouts`, searching one year ahead.
pub fn suggest_start_dates(
    reference: NaiveDate,
    duration_days: u32,
    blackouts: &[BlackoutPeriod],
    count: usize,
) -> Vec<StartDateSuggestion> {
    let until_monday = match reference.weekday().num_days_from_monday() {
        0 => 7,
        n => 7 - i64::from(n),
    };
    let first = reference + Duration::days(until_monday);

    let mut out = Vec::with_capacity(count);
    for week in 0..SUGGESTION_SEARCH_WEEKS {
        if out.len() >= count {
            break;
        }
        let start = first + Duration::weeks(week);
        let end = start + Duration::days(i64::from(duration_days));
        if blackouts.iter().any(|b| b.overlaps(start, end)) {
            continue;
        }
        let reason = suggestion_reason(start, out.is_empty());
        out.push(StartDateSuggestion { start, end, reason });
    }
    debug_assert!(out.iter().all(|s| s.start.weekday() == Weekday::Mon));
    if out.len() < count {
        tracing::warn!(
            found = out.len(),
            wanted = count,
            "few conflict-free start dates within a year"
        );
    }
    out
}

fn suggestion_reason(start: NaiveDate, earliest: bool) -> String {
    let season = match start.month() {
        12 | 1 | 2 => "winter",
        3..=5 => "spring",
        6..=8 => "summer",
        _ => "fall",
    };
    if earliest {
        return format!("earliest available slot ({season})");
    }
    match start.month() {
        1..=3 => format!("Q1 stable period ({season})"),
        4..=6 => format!("Q2 stable period ({season})"),
        9 | 10 => format!("fall stable period ({season})"),
        _ => format!("available slot ({season})"),
    }
}
