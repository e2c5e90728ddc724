//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use seqmon_core::BoundarySet;

use crate::decision::{Recommendation, RecommendationRecord};
use crate::monitor::{DecisionKind, StoppingDecision};
use crate::planner::{Feasibility, PowerPlan};

/// Format a power plan for human-readable terminal output.
pub fn format_plan(plan: &PowerPlan) -> String {
    let header = match plan.feasibility {
        Feasibility::Feasible => badge("\u{2713}", "FEASIBLE", Tone::Good),
        Feasibility::Marginal => badge("\u{26A0}", "MARGINAL", Tone::Warn),
    };
    let fixed = &plan.fixed_horizon;

    let mut panel = Panel::new(header);
    panel
        .row(format!("Experiment: {}", plan.experiment))
        .section()
        .row(format!(
            "Fixed horizon: {} control / {} treatment",
            fixed.control, fixed.treatment
        ))
        .row(format!("Inflation factor: {:.3}", plan.inflation_factor))
        .row(format!(
            "Target: {} control / {} treatment",
            plan.target_control, plan.target_treatment
        ))
        .row(format!(
            "Duration: {} days ({:.1} weeks)",
            plan.duration.planned_days,
            plan.duration.weeks()
        ))
        .section()
        .row("Looks:".bold().to_string());
    for look in plan.schedule.iter() {
        let mut line = format!("  {}  t = {:.3}", look.look, look.information_fraction);
        if let Some(n) = look.expected_per_arm {
            line.push_str(&format!("  n \u{2248} {n}"));
        }
        if let Some(date) = look.date {
            line.push_str(&format!("  {date}"));
        }
        panel.row(line);
    }

    if !plan.suggested_start_dates.is_empty() {
        panel.section().row("Suggested start dates:".bold().to_string());
        for s in &plan.suggested_start_dates {
            panel.row(format!("  {}  {}", s.start, s.reason));
        }
    }

    let mut output = panel.render();
    for reason in &plan.reasons {
        output.push_str(&format!("{} {}\n", "\u{26A0}".yellow(), reason.yellow()));
    }
    for warning in plan.warnings.iter().chain(&fixed.warnings) {
        output.push_str(&format!("{}\n", warning.dimmed().italic()));
    }
    output
}

/// Format a boundary table.
pub fn format_boundaries(set: &BoundarySet) -> String {
    let title = format!("{} boundaries, \u{03B1} = {}", set.family(), set.alpha());
    let mut panel = Panel::new(title.bold().to_string());
    panel
        .section()
        .row("look     t    cum \u{03B1}       z      p-threshold");
    for b in set.iter() {
        panel.row(format!(
            "{:>4}  {:.3}  {:.6}  {:>6.3}  {:.3e}",
            b.look, b.information_fraction, b.cumulative_alpha, b.critical_z, b.p_threshold
        ));
    }
    panel.render()
}

/// Format one stopping decision.
pub fn format_decision(decision: &StoppingDecision) -> String {
    let mut panel = Panel::new(format!(
        "Look {}: {}",
        decision.look,
        format_kind(decision.kind)
    ));
    panel.section();

    if let Some(s) = &decision.statistic {
        panel.row(format!(
            "Effect: {:+.5} (z = {:.3}, p = {:.3e})",
            s.effect, s.z, s.p_value
        ));
    }
    if let Some(b) = &decision.boundary {
        panel.row(format!(
            "Boundary: |z| \u{2265} {:.3} (p < {:.3e})",
            b.critical_z, b.p_threshold
        ));
    }
    if let Some(cp) = decision.conditional_power {
        panel.row(format!("Conditional power: {:.1}%", cp * 100.0));
    }
    if let Some(e) = decision.effect_estimate() {
        panel
            .row(format!("{} estimate: {:+.5}", e.estimator, e.effect))
            .row(format!(
                "  {:.0}% CI: [{:+.5}, {:+.5}]",
                e.level * 100.0,
                e.lower,
                e.upper
            ));
    }
    for g in decision.guardrails.iter().filter(|g| g.violated) {
        let line = match g.observed {
            Some(x) => format!("Guardrail {}: {:.4} (limit {:.4})", g.name, x, g.threshold),
            None => format!("Guardrail {}: no data", g.name),
        };
        panel.row(line.red().to_string());
    }

    let mut output = panel.render();
    output.push_str(&format!("{}\n", decision.justification.dimmed().italic()));
    output
}

/// Format the final recommendation.
pub fn format_recommendation(record: &RecommendationRecord) -> String {
    let verdict = match record.recommendation {
        Recommendation::Launch => badge("\u{2713}", "LAUNCH", Tone::Good),
        Recommendation::NoLaunch => badge("\u{2717}", "NO LAUNCH", Tone::Bad),
        Recommendation::Hold => badge("\u{26A0}", "HOLD", Tone::Warn),
    };
    let mut panel = Panel::new(verdict);
    panel.section();
    for reason in &record.reasons {
        panel.row(format!("\u{2022} {reason}"));
    }
    panel.render()
}

fn format_kind(kind: DecisionKind) -> String {
    let text = kind.to_string();
    match kind {
        DecisionKind::Continue => text.normal().to_string(),
        DecisionKind::StopSuperiority => text.green().bold().to_string(),
        DecisionKind::StopFutility | DecisionKind::CompletedMaxDuration => {
            text.yellow().to_string()
        }
        DecisionKind::StopSafety => text.red().bold().to_string(),
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Good,
    Warn,
    Bad,
}

/// Symbol plus label in the tone's color, used as a panel header.
fn badge(symbol: &str, label: &str, tone: Tone) -> String {
    let paint = |s: &str| match tone {
        Tone::Good => s.green().bold(),
        Tone::Warn => s.yellow().bold(),
        Tone::Bad => s.red().bold(),
    };
    format!("{} {}", paint(symbol), paint(label))
}

/// Panels never render narrower than this many visible columns.
const MIN_PANEL_WIDTH: usize = 48;

/// A boxed report: a header section followed by sections split by rules.
///
/// The box grows to fit its widest row, so long experiment names or
/// reasons are never cut off.
struct Panel {
    sections: Vec<Vec<String>>,
}

impl Panel {
    fn new(header: String) -> Self {
        Self {
            sections: vec![vec![header]],
        }
    }

    /// Start a new section; empty sections are skipped when rendering.
    fn section(&mut self) -> &mut Self {
        self.sections.push(Vec::new());
        self
    }

    fn row(&mut self, line: impl Into<String>) -> &mut Self {
        if let Some(current) = self.sections.last_mut() {
            current.push(line.into());
        }
        self
    }

    fn render(&self) -> String {
        let width = self
            .sections
            .iter()
            .flatten()
            .map(|line| visible_width(line))
            .max()
            .unwrap_or(0)
            .max(MIN_PANEL_WIDTH);
        let rule = "\u{2500}".repeat(width + 2);

        let mut out = format!("\u{256D}{rule}\u{256E}\n");
        let filled = self.sections.iter().filter(|s| !s.is_empty());
        for (i, section) in filled.enumerate() {
            if i > 0 {
                out.push_str(&format!("\u{251C}{rule}\u{2524}\n"));
            }
            for line in section {
                let pad = width - visible_width(line);
                out.push_str(&format!("\u{2502} {line}{} \u{2502}\n", " ".repeat(pad)));
            }
        }
        out.push_str(&format!("\u{2570}{rule}\u{256F}\n"));
        out
    }
}

/// Printed width of `s`, skipping ANSI SGR/CSI escape sequences.
fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in s.chars() {
        match (in_escape, c) {
            (false, '\x1b') => in_escape = true,
            (false, _) => width += 1,
            // CSI sequences end at the first byte in '@'..='~' after the '['
            (true, '[') => {}
            (true, '@'..='~') => in_escape = false,
            (true, _) => {}
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqmon_core::SpendingFamily;

    #[test]
    fn test_format_boundaries() {
        let set = BoundarySet::equally_spaced(&SpendingFamily::ObrienFleming, 4, 0.05).unwrap();
        let output = format_boundaries(&set);
        assert!(output.contains("4.049"));
        assert!(output.contains("2.024"));
    }

    #[test]
    fn test_format_recommendation() {
        let record = RecommendationRecord {
            experiment: "checkout".into(),
            recommendation: Recommendation::Hold,
            decision_kind: DecisionKind::StopSuperiority,
            effect_interval: None,
            heterogeneity: None,
            reasons: vec!["subgroup 'mobile' shows an effect in the opposite direction".into()],
        };
        let output = format_recommendation(&record);
        assert!(output.contains("HOLD"));
        assert!(output.contains("mobile"));
    }

    #[test]
    fn test_panel_rows_share_one_width() {
        let long = "x".repeat(MIN_PANEL_WIDTH + 20);
        let mut panel = Panel::new("short".green().to_string());
        panel.section().row(long.clone()).section().section().row("tail");
        let rendered = panel.render();

        let widths: Vec<usize> = rendered.lines().map(visible_width).collect();
        assert!(widths.iter().all(|&w| w == MIN_PANEL_WIDTH + 24), "{widths:?}");
        // Header, long row, tail, two rules, one separator per non-empty section
        assert_eq!(rendered.lines().count(), 7);
        assert!(rendered.contains(&long));
    }

    #[test]
    fn test_visible_width_skips_escapes() {
        assert_eq!(visible_width("\x1b[32mgreen\x1b[0m"), 5);
        assert_eq!(visible_width("\x1b[1;31mNO LAUNCH\x1b[0m"), 9);
        assert_eq!(visible_width("\u{03B1} = 0.05"), 8);
    }
}
