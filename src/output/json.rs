//! JSON serialization and the JSON Lines decision log.

use std::io::Write;

use serde::Serialize;

use crate::decision::RecommendationRecord;
use crate::error::Result;
use crate::monitor::LookRecord;

/// Serialize any record to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for the
/// crate's record types).
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Serialize any record to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for the
/// crate's record types).
pub fn to_json_pretty<T: Serialize + ?Sized>(
    value: &T,
) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Destination for the audit trail of an experiment.
pub trait DecisionSink {
    /// Append one look record (decision or deferral).
    fn record_look(&mut self, record: &LookRecord) -> Result<()>;

    /// Append the final recommendation.
    fn record_recommendation(&mut self, recommendation: &RecommendationRecord) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum LogLine<'a> {
    Recommendation(&'a RecommendationRecord),
}

/// Appends one JSON object per line to a writer.
///
/// Look records are tagged `"record": "decision"` or `"record": "deferred"`,
/// the recommendation `"record": "recommendation"`.
#[derive(Debug)]
pub struct JsonlDecisionLog<W: Write> {
    writer: W,
    lines: usize,
}

impl<W: Write> JsonlDecisionLog<W> {
    /// Log writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Lines written so far.
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    /// Flush and return the writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl<W: Write> DecisionSink for JsonlDecisionLog<W> {
    fn record_look(&mut self, record: &LookRecord) -> Result<()> {
        self.write_line(record)
    }

    fn record_recommendation(&mut self, recommendation: &RecommendationRecord) -> Result<()> {
        self.write_line(&LogLine::Recommendation(recommendation))?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Recommendation;
    use crate::monitor::DecisionKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_jsonl_lines_are_tagged() {
        let mut log = JsonlDecisionLog::new(Vec::new());
        log.record_look(&LookRecord::Deferred {
            look: 1,
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()),
            reason: "control arm has 0 observations".into(),
        })
        .unwrap();
        log.record_recommendation(&RecommendationRecord {
            experiment: "checkout".into(),
            recommendation: Recommendation::NoLaunch,
            decision_kind: DecisionKind::StopFutility,
            effect_interval: None,
            heterogeneity: None,
            reasons: vec!["stopped for futility".into()],
        })
        .unwrap();
        assert_eq!(log.lines_written(), 2);

        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["record"], "deferred");
        assert_eq!(lines[0]["look"], 1);
        assert_eq!(lines[1]["record"], "recommendation");
        assert_eq!(lines[1]["recommendation"], "no_launch");
    }

    #[test]
    fn test_deferred_round_trip() {
        let record = LookRecord::Deferred {
            look: 2,
            timestamp: None,
            reason: "missing".into(),
        };
        let json = to_json(&record).unwrap();
        assert!(!json.contains("timestamp"));
        let back: LookRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(to_json_pretty(&record).unwrap().contains('\n'));
    }
}
