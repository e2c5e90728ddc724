//! Monitor lifecycle.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::decision::DecisionKind;

/// Where a monitor is in its lifecycle.
///
/// `Planned → Monitoring → Terminal`. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum MonitorState {
    /// No look evaluated yet.
    Planned,
    /// At least one look submitted (evaluated as Continue or deferred).
    Monitoring,
    /// Stopped with the given decision.
    Terminal(DecisionKind),
}

impl MonitorState {
    /// Whether the monitor accepts no further looks.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Terminal(_))
    }

    /// State after recording a decision of `kind`.
    pub(crate) fn after(self, kind: DecisionKind) -> Self {
        if kind.is_terminal() {
            MonitorState::Terminal(kind)
        } else {
            MonitorState::Monitoring
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Planned => write!(f, "planned"),
            MonitorState::Monitoring => write!(f, "monitoring"),
            MonitorState::Terminal(kind) => write!(f, "terminal ({kind})"),
        }
    }
}
