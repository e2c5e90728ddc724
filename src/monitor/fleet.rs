//! Parallel evaluation of independent experiments.

use rayon::prelude::*;

use super::{SequentialMonitor, StoppingDecision};
use crate::error::Result;
use crate::interim::InterimSource;

/// Evaluate the next look of every monitor in parallel.
///
/// Monitors share no state; each one still evaluates its own looks in
/// order. Results are returned in the order of `monitors`.
pub fn evaluate_fleet<S: InterimSource + ?Sized>(
    monitors: &mut [SequentialMonitor],
    source: &S,
) -> Vec<Result<StoppingDecision>> {
    monitors
        .par_iter_mut()
        .map(|monitor| monitor.evaluate_next(source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::design::{ExperimentDesign, MinimumDetectableEffect, SequentialPlan};
    use crate::interim::{InterimStatistics, RecordedInterims};
    use crate::monitor::DecisionKind;
    use chrono::{TimeZone, Utc};
    use seqmon_core::{ArmStatistics, MetricStatistics, MetricType, SpendingFamily};

    #[test]
    fn test_fleet_evaluates_each_monitor() {
        let names = ["a", "b", "c"];
        let mut monitors: Vec<_> = names
            .iter()
            .map(|name| {
                let design = ExperimentDesign::new(
                    *name,
                    "conversion",
                    MetricType::Proportion,
                    0.10,
                    MinimumDetectableEffect::Relative(0.1),
                    SequentialPlan::new(SpendingFamily::Pocock, 2),
                );
                SequentialMonitor::new(design, MonitorConfig::default()).unwrap()
            })
            .collect();

        let mut source = RecordedInterims::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        for (name, treatment) in [("a", 500), ("b", 650)] {
            source.insert(
                name,
                1,
                InterimStatistics::new(at).with_metric(
                    "conversion",
                    MetricStatistics::new(
                        ArmStatistics::from_successes(5000, 500),
                        ArmStatistics::from_successes(5000, treatment),
                    ),
                ),
            );
        }

        let results = evaluate_fleet(&mut monitors, &source);
        assert_eq!(results[0].as_ref().unwrap().kind, DecisionKind::Continue);
        assert_eq!(results[1].as_ref().unwrap().kind, DecisionKind::StopSuperiority);
        // No data for "c": nothing recorded, look still due
        assert!(results[2].as_ref().unwrap_err().is_recoverable());
        assert_eq!(monitors[2].next_look(), Some(1));
    }
}
