//! Output formatting for plans, boundaries and decisions.
//!
//! - Terminal: human-readable output with colors and box drawing
//! - JSON: machine-readable serialization and the JSON Lines decision log

mod json;
mod terminal;

pub use json::{to_json, to_json_pretty, DecisionSink, JsonlDecisionLog};
pub use terminal::{format_boundaries, format_decision, format_plan, format_recommendation};
