//! Interim snapshots and the data collaborator that supplies them.
//!
//! The engine never reads raw events. At each look a collaborator hands
//! over per-arm aggregates (count, sum, sum of squares) for every metric.

use std::collections::BTreeMap;
use std::io::BufRead;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use seqmon_core::MetricStatistics;

use crate::error::{DataQualityError, Result};

/// Immutable snapshot of every metric's aggregates at one look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterimStatistics {
    /// When the snapshot was taken. Decisions carry this timestamp.
    pub timestamp: DateTime<Utc>,
    /// Aggregates keyed by metric id.
    pub metrics: BTreeMap<String, MetricStatistics>,
}

impl InterimStatistics {
    /// Empty snapshot at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            metrics: BTreeMap::new(),
        }
    }

    /// Add a metric's aggregates.
    pub fn with_metric(mut self, metric: impl Into<String>, stats: MetricStatistics) -> Self {
        self.metrics.insert(metric.into(), stats);
        self
    }

    /// Aggregates of `metric`.
    pub fn metric(&self, metric: &str) -> std::result::Result<&MetricStatistics, DataQualityError> {
        self.metrics
            .get(metric)
            .ok_or_else(|| DataQualityError::MissingMetric(metric.to_string()))
    }
}

/// One line of a replay file: the look index and its snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEntry {
    /// Look index (1-based).
    pub look: usize,
    /// Snapshot for that look.
    #[serde(flatten)]
    pub statistics: InterimStatistics,
}

/// Parse a JSON Lines replay stream, skipping blank lines.
pub fn read_replay<R: BufRead>(reader: R) -> Result<Vec<ReplayEntry>> {
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

/// Supplies interim statistics on request.
///
/// `fetch` is the only place the engine may block. Implementations are
/// shared across worker threads by fleet evaluation.
pub trait InterimSource: Sync {
    /// Snapshot for `look` of `experiment`.
    fn fetch(
        &self,
        experiment: &str,
        look: usize,
    ) -> std::result::Result<InterimStatistics, DataQualityError>;
}

/// In-memory snapshots, keyed by experiment and look.
#[derive(Debug, Clone, Default)]
pub struct RecordedInterims {
    snapshots: BTreeMap<(String, usize), InterimStatistics>,
}

impl RecordedInterims {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the snapshot of `look` for `experiment`.
    pub fn insert(&mut self, experiment: impl Into<String>, look: usize, stats: InterimStatistics) {
        self.snapshots.insert((experiment.into(), look), stats);
    }

    /// Store every replay entry under `experiment`.
    pub fn from_replay(experiment: &str, entries: Vec<ReplayEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            store.insert(experiment, entry.look, entry.statistics);
        }
        store
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl InterimSource for RecordedInterims {
    fn fetch(
        &self,
        experiment: &str,
        look: usize,
    ) -> std::result::Result<InterimStatistics, DataQualityError> {
        self.snapshots
            .get(&(experiment.to_string(), look))
            .cloned()
            .ok_or_else(|| DataQualityError::Unavailable {
                experiment: experiment.to_string(),
                look,
            })
    }
}
