//! Sequential monitor: one state machine per experiment.
//!
//! The monitor solves every boundary when it is created and then evaluates
//! looks strictly in order. Each look checks, in this order:
//!
//! 1. look order (rejected without touching state),
//! 2. guardrails (a breach or missing guardrail data stops for safety),
//! 3. the primary metric's test statistic (insufficient data defers the look),
//! 4. the superiority boundary,
//! 5. conditional-power futility (not at the final look),
//! 6. whether this was the final look.
//!
//! Once a terminal decision is recorded the monitor rejects every further
//! evaluation or override.

mod decision;
mod fleet;
mod guardrails;
mod state;

pub use decision::{DecisionKind, EffectDirection, LookRecord, StoppingDecision};
pub use fleet::evaluate_fleet;
pub use guardrails::{
    evaluate_guardrails, GuardrailDefinition, GuardrailDirection, GuardrailMeasure, GuardrailStatus,
};
pub use state::MonitorState;

use chrono::{DateTime, Utc};

use seqmon_core::analysis::{conditional_power, drift_for_effect, estimate, naive};
use seqmon_core::{BoundarySet, BoundaryValue, ComputationError, TestStatistic};

use crate::config::MonitorConfig;
use crate::design::ExperimentDesign;
use crate::error::{DataQualityError, DesignError, Result, SequenceOrderError};
use crate::interim::{InterimSource, InterimStatistics};

/// Group-sequential monitor for one experiment.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use seqmon::{
///     DecisionKind, ExperimentDesign, InterimStatistics, MinimumDetectableEffect,
///     MonitorConfig, SequentialMonitor, SequentialPlan,
/// };
/// use seqmon_core::{ArmStatistics, MetricStatistics, MetricType, SpendingFamily};
///
/// let design = ExperimentDesign::new(
///     "checkout",
///     "conversion",
///     MetricType::Proportion,
///     0.10,
///     MinimumDetectableEffect::Relative(0.1),
///     SequentialPlan::new(SpendingFamily::ObrienFleming, 4),
/// );
/// let mut monitor = SequentialMonitor::new(design, MonitorConfig::default()).unwrap();
///
/// let interim = InterimStatistics::new(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap())
///     .with_metric(
///         "conversion",
///         MetricStatistics::new(
///             ArmStatistics::from_successes(4000, 400),
///             ArmStatistics::from_successes(4000, 420),
///         ),
///     );
/// let decision = monitor.evaluate_look(1, &interim, &[]).unwrap();
/// assert_eq!(decision.kind, DecisionKind::Continue);
/// assert_eq!(monitor.next_look(), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct SequentialMonitor {
    design: ExperimentDesign,
    config: MonitorConfig,
    boundaries: BoundarySet,
    state: MonitorState,
    last_look: usize,
    last_timestamp: Option<DateTime<Utc>>,
    history: Vec<LookRecord>,
    terminal: Option<StoppingDecision>,
}

impl SequentialMonitor {
    /// Validate `design` and solve its boundaries.
    pub fn new(design: ExperimentDesign, config: MonitorConfig) -> Result<Self> {
        design.validate()?;
        let boundaries = design.boundaries()?;
        Self::with_boundaries(design, config, boundaries)
    }

    /// Monitor using boundaries already solved for this design.
    ///
    /// The set must match the design's family, fractions and α.
    pub fn with_boundaries(
        design: ExperimentDesign,
        config: MonitorConfig,
        boundaries: BoundarySet,
    ) -> Result<Self> {
        design.validate()?;
        if !(config.confidence_level > 0.0 && config.confidence_level < 1.0) {
            return Err(ComputationError::InvalidProbability {
                name: "confidence level",
                value: config.confidence_level,
            }
            .into());
        }
        let fractions = design.information_fractions()?;
        if boundaries.family() != &design.sequential.family
            || boundaries.fractions() != fractions.as_slice()
            || boundaries.alpha() != design.alpha
        {
            return Err(DesignError::BoundaryMismatch(format!(
                "solved for {} at {:?} with alpha {}",
                boundaries.family(),
                boundaries.fractions(),
                boundaries.alpha()
            ))
            .into());
        }
        // Futility thresholds come from the design, not from the caller's set.
        let boundaries = match &design.sequential.futility {
            Some(rule) => boundaries.with_futility(rule.threshold),
            None => boundaries,
        };

        tracing::info!(
            experiment = %design.name,
            family = %design.sequential.family,
            looks = boundaries.total_looks(),
            alpha = design.alpha,
            "monitor created"
        );

        Ok(Self {
            design,
            config,
            boundaries,
            state: MonitorState::Planned,
            last_look: 0,
            last_timestamp: None,
            history: Vec::new(),
            terminal: None,
        })
    }

    /// Evaluate look `k` against `interim` with the caller's guardrail
    /// statuses.
    ///
    /// Registered guardrails without a status count as missing data and
    /// stop the experiment for safety. Returns a [`SequenceOrderError`] for
    /// an out-of-order look and a [`DataQualityError`] when the primary
    /// metric can't be tested; in the latter case the look is recorded as
    /// deferred and may be resubmitted.
    pub fn evaluate_look(
        &mut self,
        k: usize,
        interim: &InterimStatistics,
        guardrail_statuses: &[GuardrailStatus],
    ) -> Result<StoppingDecision> {
        self.check_order(k)?;

        let boundary = self.boundaries.at(k)?.clone();
        let guardrails = self.collect_guardrails(guardrail_statuses);
        let primary = interim
            .metric(&self.design.primary_metric)
            .and_then(|stats| {
                TestStatistic::compute(self.design.metric_type, stats).map_err(|source| {
                    DataQualityError::Insufficient {
                        metric: self.design.primary_metric.clone(),
                        source,
                    }
                })
            });

        if guardrails.iter().any(|g| g.violated) {
            let decision = self.safety_stop(k, boundary, primary.ok(), guardrails, interim.timestamp);
            return Ok(self.record(decision));
        }

        let statistic = match primary {
            Ok(s) => s,
            Err(err) => {
                self.defer(k, Some(interim.timestamp), &err);
                return Err(err.into());
            }
        };

        tracing::debug!(
            experiment = %self.design.name,
            look = k,
            z = statistic.z,
            p_value = statistic.p_value,
            p_threshold = boundary.p_threshold,
            "evaluating look"
        );

        let mut decision = StoppingDecision {
            experiment: self.design.name.clone(),
            kind: DecisionKind::Continue,
            look: k,
            boundary: None,
            statistic: Some(statistic),
            effect_direction: Some(EffectDirection::of(statistic.effect)),
            conditional_power: None,
            naive_estimate: None,
            adjusted_estimate: None,
            guardrails,
            timestamp: Some(interim.timestamp),
            justification: String::new(),
        };

        if statistic.p_value < boundary.p_threshold {
            decision.kind = DecisionKind::StopSuperiority;
            decision.justification = format!(
                "p = {:.3e} crossed the look-{} threshold {:.3e} (|z| = {:.3} ≥ {:.3})",
                statistic.p_value,
                k,
                boundary.p_threshold,
                statistic.z.abs(),
                boundary.critical_z
            );
        } else if let Some((cp, threshold)) = self.futility(&boundary, &statistic)? {
            decision.conditional_power = Some(cp);
            if cp < threshold {
                decision.kind = DecisionKind::StopFutility;
                decision.justification = format!(
                    "conditional power {cp:.3} is below the futility threshold {threshold:.2}"
                );
            }
        }

        if decision.kind == DecisionKind::Continue {
            if boundary.is_final() {
                decision.kind = DecisionKind::CompletedMaxDuration;
                decision.justification = format!(
                    "final look reached; p = {:.3e} did not cross {:.3e}",
                    statistic.p_value, boundary.p_threshold
                );
            } else {
                decision.justification = format!(
                    "p = {:.3e} above the look-{} threshold {:.3e}",
                    statistic.p_value, k, boundary.p_threshold
                );
            }
        }

        if decision.kind.is_terminal() {
            let level = self.config.confidence_level;
            decision.naive_estimate =
                Some(naive(statistic.effect, statistic.standard_error, level)?);
            decision.adjusted_estimate = Some(estimate(
                self.config.estimator,
                &self.boundaries,
                k,
                &statistic,
                level,
            )?);
        }
        decision.boundary = Some(boundary);
        Ok(self.record(decision))
    }

    /// Fetch the next look from `source`, check guardrails and evaluate it.
    ///
    /// A failed fetch is recorded as a deferral of the due look, the same
    /// as untestable data passed to [`evaluate_look`](Self::evaluate_look).
    pub fn evaluate_next<S: InterimSource + ?Sized>(&mut self, source: &S) -> Result<StoppingDecision> {
        let k = self.next_look().ok_or_else(|| self.terminal_error())?;
        let interim = match source.fetch(&self.design.name, k) {
            Ok(interim) => interim,
            Err(err) => {
                self.defer(k, None, &err);
                return Err(err.into());
            }
        };
        let statuses = evaluate_guardrails(&self.design, &interim);
        self.evaluate_look(k, &interim, &statuses)
    }

    /// Operator override: stop for safety with `note` as justification.
    pub fn force_terminate(&mut self, note: &str) -> Result<StoppingDecision> {
        if self.state.is_terminal() {
            return Err(self.terminal_error().into());
        }
        tracing::warn!(experiment = %self.design.name, note, "manual override");
        let decision = StoppingDecision {
            experiment: self.design.name.clone(),
            kind: DecisionKind::StopSafety,
            look: self.last_look,
            boundary: None,
            statistic: None,
            effect_direction: None,
            conditional_power: None,
            naive_estimate: None,
            adjusted_estimate: None,
            guardrails: Vec::new(),
            timestamp: self.last_timestamp,
            justification: if note.trim().is_empty() {
                "manual override".to_string()
            } else {
                format!("manual override: {note}")
            },
        };
        Ok(self.record(decision))
    }

    /// Audit trail of every evaluated or deferred look, oldest first.
    pub fn history(&self) -> &[LookRecord] {
        &self.history
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Next look due, or `None` once terminal.
    pub fn next_look(&self) -> Option<usize> {
        if self.state.is_terminal() {
            None
        } else {
            Some(self.last_look + 1)
        }
    }

    /// The terminal decision, once reached.
    pub fn terminal_decision(&self) -> Option<&StoppingDecision> {
        self.terminal.as_ref()
    }

    /// The monitored design.
    pub fn design(&self) -> &ExperimentDesign {
        &self.design
    }

    /// Boundaries solved at construction.
    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }

    /// Monitor configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn check_order(&self, k: usize) -> std::result::Result<(), SequenceOrderError> {
        if self.state.is_terminal() {
            return Err(self.terminal_error());
        }
        let planned = self.boundaries.total_looks();
        if k > planned {
            return Err(SequenceOrderError::BeyondPlan { got: k, planned });
        }
        let expected = self.last_look + 1;
        if k != expected {
            return Err(SequenceOrderError::OutOfOrder { expected, got: k });
        }
        Ok(())
    }

    fn terminal_error(&self) -> SequenceOrderError {
        match &self.terminal {
            Some(d) => SequenceOrderError::AlreadyTerminal {
                kind: d.kind,
                look: d.look,
            },
            // Unreachable while state and terminal are updated together.
            None => SequenceOrderError::OutOfOrder {
                expected: self.last_look + 1,
                got: self.last_look + 1,
            },
        }
    }

    /// Registered guardrails in design order, filling in missing statuses,
    /// followed by any unregistered statuses the caller supplied.
    fn collect_guardrails(&self, supplied: &[GuardrailStatus]) -> Vec<GuardrailStatus> {
        let mut out: Vec<GuardrailStatus> = self
            .design
            .guardrails
            .iter()
            .map(|g| {
                supplied
                    .iter()
                    .find(|s| s.name == g.name)
                    .cloned()
                    .unwrap_or_else(|| g.evaluate(None))
            })
            .collect();
        out.extend(
            supplied
                .iter()
                .filter(|s| self.design.guardrail(&s.name).is_none())
                .cloned(),
        );
        out
    }

    fn safety_stop(
        &self,
        k: usize,
        boundary: BoundaryValue,
        statistic: Option<TestStatistic>,
        guardrails: Vec<GuardrailStatus>,
        timestamp: DateTime<Utc>,
    ) -> StoppingDecision {
        let reasons: Vec<String> = guardrails
            .iter()
            .filter(|g| g.violated)
            .map(|g| match g.observed {
                Some(x) => format!("{} = {:.4} breached {:.4}", g.name, x, g.threshold),
                None => DataQualityError::MissingGuardrail(g.name.clone()).to_string(),
            })
            .collect();
        tracing::warn!(
            experiment = %self.design.name,
            look = k,
            guardrails = ?reasons,
            "safety stop"
        );
        StoppingDecision {
            experiment: self.design.name.clone(),
            kind: DecisionKind::StopSafety,
            look: k,
            boundary: Some(boundary),
            statistic,
            effect_direction: statistic.map(|s| EffectDirection::of(s.effect)),
            conditional_power: None,
            naive_estimate: None,
            adjusted_estimate: None,
            guardrails,
            timestamp: Some(timestamp),
            justification: format!("guardrail: {}", reasons.join("; ")),
        }
    }

    /// Conditional power and its threshold, when futility applies at this look.
    fn futility(
        &self,
        boundary: &BoundaryValue,
        statistic: &TestStatistic,
    ) -> Result<Option<(f64, f64)>> {
        let (Some(threshold), Some(rule)) =
            (boundary.futility_threshold, &self.design.sequential.futility)
        else {
            return Ok(None);
        };
        let t = boundary.information_fraction;
        let final_critical = self.boundaries.at(self.boundaries.total_looks())?.critical_z;
        let design_drift = drift_for_effect(self.design.signed_effect(), statistic.standard_error, t);
        let theta = rule.trend.drift(statistic.z, t, design_drift);
        let cp = conditional_power(statistic.z, t, final_critical, theta)?;
        Ok(Some((cp, threshold)))
    }

    fn defer(&mut self, k: usize, timestamp: Option<DateTime<Utc>>, err: &DataQualityError) {
        tracing::warn!(
            experiment = %self.design.name,
            look = k,
            error = %err,
            "look deferred"
        );
        self.state = MonitorState::Monitoring;
        self.history.push(LookRecord::Deferred {
            look: k,
            timestamp,
            reason: err.to_string(),
        });
    }

    fn record(&mut self, decision: StoppingDecision) -> StoppingDecision {
        self.state = self.state.after(decision.kind);
        self.last_look = decision.look;
        if decision.timestamp.is_some() {
            self.last_timestamp = decision.timestamp;
        }
        if decision.kind.is_terminal() {
            tracing::info!(
                experiment = %decision.experiment,
                look = decision.look,
                kind = %decision.kind,
                justification = %decision.justification,
                "terminal decision"
            );
            self.terminal = Some(decision.clone());
        }
        self.history.push(LookRecord::Decision(decision.clone()));
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{FutilityRule, MinimumDetectableEffect, SequentialPlan};
    use crate::error::Error;
    use chrono::TimeZone;
    use seqmon_core::{ArmStatistics, ConditionalPowerTrend, MetricStatistics, MetricType, SpendingFamily};

    fn design() -> ExperimentDesign {
        ExperimentDesign::new(
            "checkout",
            "conversion",
            MetricType::Proportion,
            0.10,
            MinimumDetectableEffect::Relative(0.1),
            SequentialPlan::new(SpendingFamily::ObrienFleming, 4),
        )
    }

    fn snapshot(day: u32, control: u64, treatment: u64) -> InterimStatistics {
        InterimStatistics::new(Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()).with_metric(
            "conversion",
            MetricStatistics::new(
                ArmStatistics::from_successes(5000, control),
                ArmStatistics::from_successes(5000, treatment),
            ),
        )
    }

    #[test]
    fn test_continue_then_complete() {
        let mut m = SequentialMonitor::new(design(), MonitorConfig::default()).unwrap();
        assert_eq!(m.state(), MonitorState::Planned);
        for k in 1..=3 {
            let d = m.evaluate_look(k, &snapshot(k as u32, 500, 510), &[]).unwrap();
            assert_eq!(d.kind, DecisionKind::Continue);
            assert!(d.naive_estimate.is_none());
        }
        assert_eq!(m.state(), MonitorState::Monitoring);
        let d = m.evaluate_look(4, &snapshot(4, 500, 510), &[]).unwrap();
        assert_eq!(d.kind, DecisionKind::CompletedMaxDuration);
        assert!(d.adjusted_estimate.is_some());
        assert_eq!(m.next_look(), None);
        assert_eq!(m.history().len(), 4);
        assert_eq!(m.terminal_decision().unwrap().look, 4);
    }

    #[test]
    fn test_out_of_order_leaves_state_untouched() {
        let mut m = SequentialMonitor::new(design(), MonitorConfig::default()).unwrap();
        let err = m.evaluate_look(2, &snapshot(2, 500, 510), &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceOrder(SequenceOrderError::OutOfOrder { expected: 1, got: 2 })
        ));
        assert!(m.history().is_empty());
        assert_eq!(m.state(), MonitorState::Planned);

        assert!(matches!(
            m.evaluate_look(5, &snapshot(2, 500, 510), &[]),
            Err(Error::SequenceOrder(SequenceOrderError::BeyondPlan { .. }))
        ));
    }

    #[test]
    fn test_deferral_does_not_consume_look() {
        let mut m = SequentialMonitor::new(design(), MonitorConfig::default()).unwrap();
        let empty = InterimStatistics::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let err = m.evaluate_look(1, &empty, &[]).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(m.next_look(), Some(1));
        assert_eq!(m.state(), MonitorState::Monitoring);
        assert!(matches!(
            m.history()[0],
            LookRecord::Deferred { look: 1, timestamp: Some(_), .. }
        ));

        m.evaluate_look(1, &snapshot(2, 500, 510), &[]).unwrap();
        assert_eq!(m.next_look(), Some(2));
    }

    #[test]
    fn test_force_terminate() {
        let mut m = SequentialMonitor::new(design(), MonitorConfig::default()).unwrap();
        m.evaluate_look(1, &snapshot(1, 500, 510), &[]).unwrap();
        let d = m.force_terminate("payment outage").unwrap();
        assert_eq!(d.kind, DecisionKind::StopSafety);
        assert_eq!(d.justification, "manual override: payment outage");
        assert_eq!(d.timestamp, Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert!(matches!(
            m.force_terminate("again"),
            Err(Error::SequenceOrder(SequenceOrderError::AlreadyTerminal {
                kind: DecisionKind::StopSafety,
                look: 1
            }))
        ));
        assert!(m.evaluate_look(2, &snapshot(2, 500, 510), &[]).is_err());
    }

    #[test]
    fn test_missing_guardrail_status_stops_for_safety() {
        let g = GuardrailDefinition::new(
            "errors",
            "error_rate",
            0.01,
            GuardrailDirection::Maximum,
            GuardrailMeasure::AbsoluteDifference,
        );
        let mut m =
            SequentialMonitor::new(design().with_guardrail(g), MonitorConfig::default()).unwrap();
        let d = m.evaluate_look(1, &snapshot(1, 500, 510), &[]).unwrap();
        assert_eq!(d.kind, DecisionKind::StopSafety);
        assert!(d.guardrails[0].is_missing());
        assert!(d.justification.contains("errors"));
    }

    #[test]
    fn test_futility_with_null_trend() {
        let mut d = design();
        d.sequential.futility = Some(FutilityRule::new(ConditionalPowerTrend::Null));
        let mut m = SequentialMonitor::new(d, MonitorConfig::default()).unwrap();
        // No difference at all: under the null trend CP ≈ 0.05 < 0.2
        let d = m.evaluate_look(1, &snapshot(1, 500, 500), &[]).unwrap();
        assert_eq!(d.kind, DecisionKind::StopFutility);
        assert!(d.conditional_power.unwrap() < 0.1);
        assert!(d.naive_estimate.is_some());
    }

    #[test]
    fn test_mismatched_boundaries_rejected() {
        let pocock = BoundarySet::equally_spaced(&SpendingFamily::Pocock, 4, 0.05).unwrap();
        assert!(matches!(
            SequentialMonitor::with_boundaries(design(), MonitorConfig::default(), pocock),
            Err(Error::Design(DesignError::BoundaryMismatch(_)))
        ));
    }
}
