//! Planned look schedule.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use seqmon_core::spending::{equally_spaced, validate_fractions};
use seqmon_core::ComputationError;

/// One planned interim (or final) analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedLook {
    /// Look index (1-based).
    pub look: usize,
    /// Information fraction t_k in (0, 1].
    pub information_fraction: f64,
    /// Calendar date of the look, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Expected units per arm accrued by this look, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_per_arm: Option<u64>,
}

/// Ordered planned looks with strictly increasing fractions ending at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookSchedule {
    looks: Vec<PlannedLook>,
}

impl LookSchedule {
    /// Schedule at the given information fractions.
    pub fn from_fractions(fractions: &[f64]) -> Result<Self, ComputationError> {
        validate_fractions(fractions)?;
        let looks = fractions
            .iter()
            .enumerate()
            .map(|(i, &t)| PlannedLook {
                look: i + 1,
                information_fraction: t,
                date: None,
                expected_per_arm: None,
            })
            .collect();
        Ok(Self { looks })
    }

    /// `total_looks` equally spaced looks.
    pub fn equally_spaced(total_looks: usize) -> Result<Self, ComputationError> {
        Self::from_fractions(&equally_spaced(total_looks)?)
    }

    /// Attach calendar dates, one per look.
    ///
    /// Dates must be non-decreasing.
    pub fn with_dates(mut self, dates: &[NaiveDate]) -> Result<Self, ComputationError> {
        if dates.len() != self.looks.len() {
            return Err(ComputationError::InvalidFractions(format!(
                "{} dates given for {} looks",
                dates.len(),
                self.looks.len()
            )));
        }
        if dates.windows(2).any(|w| w[1] < w[0]) {
            return Err(ComputationError::InvalidFractions(
                "look dates must be non-decreasing".into(),
            ));
        }
        for (look, &date) in self.looks.iter_mut().zip(dates) {
            look.date = Some(date);
        }
        Ok(self)
    }

    /// Attach the expected per-arm sample at each look, scaled from the
    /// final target.
    pub fn with_target(mut self, target_per_arm: u64) -> Self {
        for look in &mut self.looks {
            look.expected_per_arm =
                Some((look.information_fraction * target_per_arm as f64).ceil() as u64);
        }
        self
    }

    /// Information fractions in look order.
    pub fn fractions(&self) -> Vec<f64> {
        self.looks.iter().map(|l| l.information_fraction).collect()
    }

    /// Planned look `k` (1-based).
    pub fn get(&self, k: usize) -> Option<&PlannedLook> {
        k.checked_sub(1).and_then(|i| self.looks.get(i))
    }

    /// All looks.
    pub fn iter(&self) -> impl Iterator<Item = &PlannedLook> {
        self.looks.iter()
    }

    /// Number of planned looks K.
    pub fn len(&self) -> usize {
        self.looks.len()
    }

    /// Always false for a constructed schedule.
    pub fn is_empty(&self) -> bool {
        self.looks.is_empty()
    }
}
