//! JSON output format for profiling reports (`--format json`)

use crate::profiler::ProfileReport;
use serde::{Deserialize, Serialize};

/// Timing of one reported source line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonLine {
    /// Row number after boundary markers are removed
    pub line: usize,
    pub text: String,
    /// Mean elapsed milliseconds (absent when no run produced a sample)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_ms: Option<f64>,
    /// Sample standard deviation (absent below two samples)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_ms: Option<f64>,
    /// Number of runs that reached this line
    pub samples: usize,
}

/// Whole-call durations across runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JsonTotals {
    pub runs_ms: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_ms: Option<f64>,
    /// Population standard deviation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_ms: Option<f64>,
}

/// Complete JSON document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub function: String,
    pub iterations: usize,
    pub totals: JsonTotals,
    pub lines: Vec<JsonLine>,
    /// Printable form of the last run's return value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<String>,
}

impl JsonOutput {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "codpulse-json-v1".to_string(),
            function: function.into(),
            iterations: 0,
            totals: JsonTotals::default(),
            lines: Vec::new(),
            returned: None,
        }
    }

    pub fn from_report(report: &ProfileReport) -> Self {
        let mut output = Self::new(report.function.clone());
        output.iterations = report.iterations;
        output.totals = JsonTotals {
            runs_ms: report.totals_ms.clone(),
            mean_ms: report.total_mean_ms().ok(),
            std_ms: report.total_std_ms().ok(),
        };
        output.lines = report
            .rows()
            .iter()
            .map(|row| JsonLine {
                line: row.line,
                text: row.text.clone(),
                mean_ms: row.mean_ms,
                std_ms: row.std_ms,
                samples: row.samples,
            })
            .collect();
        output.returned = Some(report.returned.repr());
        output
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregatedReport, ReportRow};
    use crate::script::Value;

    fn report() -> ProfileReport {
        ProfileReport {
            function: "work".to_string(),
            iterations: 2,
            totals_ms: vec![1.0, 3.0],
            aggregated: AggregatedReport {
                rows: vec![ReportRow {
                    line: 0,
                    ordinal: 0,
                    text: "return 'ok'".to_string(),
                    mean_ms: Some(0.5),
                    std_ms: None,
                    samples: 1,
                }],
            },
            returned: Value::str("ok"),
        }
    }

    #[test]
    fn test_json_output_creation() {
        let output = JsonOutput::new("f");
        assert_eq!(output.format, "codpulse-json-v1");
        assert_eq!(output.version, env!("CARGO_PKG_VERSION"));
        assert!(output.lines.is_empty());
    }

    #[test]
    fn test_from_report() {
        let output = JsonOutput::from_report(&report());
        assert_eq!(output.function, "work");
        assert_eq!(output.iterations, 2);
        assert_eq!(output.totals.mean_ms, Some(2.0));
        assert_eq!(output.totals.std_ms, Some(1.0));
        assert_eq!(output.lines.len(), 1);
        assert_eq!(output.returned.as_deref(), Some("'ok'"));
    }

    #[test]
    fn test_json_serialization() {
        let json = JsonOutput::from_report(&report()).to_json().unwrap();
        assert!(json.contains("\"format\": \"codpulse-json-v1\""));
        assert!(json.contains("\"text\": \"return 'ok'\""));
        assert!(json.contains("\"samples\": 1"));

        let parsed: JsonOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, JsonOutput::from_report(&report()));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let line = JsonLine {
            line: 0,
            text: "x = 1".to_string(),
            mean_ms: None,
            std_ms: None,
            samples: 0,
        };
        let json = serde_json::to_string(&line).unwrap();
        assert!(!json.contains("mean_ms"));
        assert!(!json.contains("std_ms"));
    }
}
