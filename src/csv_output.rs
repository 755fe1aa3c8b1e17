//! CSV output format for profiling reports (`--format csv`)
//!
//! One row per reported source line. Undefined statistics are left empty.

use crate::profiler::ProfileReport;

/// CSV record for one reported line
#[derive(Debug, Clone, PartialEq)]
pub struct CsvLine {
    pub line: usize,
    pub text: String,
    pub mean_ms: Option<f64>,
    pub std_ms: Option<f64>,
    pub samples: usize,
}

/// CSV output formatter
#[derive(Debug, Default)]
pub struct CsvOutput {
    lines: Vec<CsvLine>,
    include_samples: bool,
}

impl CsvOutput {
    pub fn new(include_samples: bool) -> Self {
        Self {
            lines: Vec::new(),
            include_samples,
        }
    }

    pub fn from_report(report: &ProfileReport, include_samples: bool) -> Self {
        let mut output = Self::new(include_samples);
        for row in report.rows() {
            output.add_line(CsvLine {
                line: row.line,
                text: row.text.clone(),
                mean_ms: row.mean_ms,
                std_ms: row.std_ms,
                samples: row.samples,
            });
        }
        output
    }

    pub fn add_line(&mut self, line: CsvLine) {
        self.lines.push(line);
    }

    fn header(&self) -> String {
        let mut headers = vec!["line_no", "line", "mean_time_ms", "std_time_ms"];
        if self.include_samples {
            headers.push("samples");
        }
        headers.join(",")
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_line(&self, line: &CsvLine) -> String {
        let stat = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
        let mut fields = vec![
            line.line.to_string(),
            Self::escape_field(&line.text),
            stat(line.mean_ms),
            stat(line.std_ms),
        ];
        if self.include_samples {
            fields.push(line.samples.to_string());
        }
        fields.join(",")
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(&self.header());
        output.push('\n');

        for line in &self.lines {
            output.push_str(&self.format_line(line));
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, mean_ms: Option<f64>, std_ms: Option<f64>) -> CsvLine {
        CsvLine {
            line: 0,
            text: text.to_string(),
            mean_ms,
            std_ms,
            samples: 2,
        }
    }

    #[test]
    fn test_csv_basic_header() {
        let output = CsvOutput::new(false);
        assert_eq!(output.header(), "line_no,line,mean_time_ms,std_time_ms");
    }

    #[test]
    fn test_csv_header_with_samples() {
        let output = CsvOutput::new(true);
        assert_eq!(output.header(), "line_no,line,mean_time_ms,std_time_ms,samples");
    }

    #[test]
    fn test_csv_escape_field() {
        assert_eq!(CsvOutput::escape_field("x = 1"), "x = 1");
        assert_eq!(CsvOutput::escape_field("f(a, b)"), "\"f(a, b)\"");
        assert_eq!(CsvOutput::escape_field("say(\"hi\")"), "\"say(\"\"hi\"\")\"");
    }

    #[test]
    fn test_csv_undefined_statistics_empty() {
        let mut output = CsvOutput::new(true);
        output.add_line(line("return 42", Some(0.25), None));
        assert_eq!(
            output.to_csv(),
            "line_no,line,mean_time_ms,std_time_ms,samples\n0,return 42,0.25,,2\n"
        );
    }

    #[test]
    fn test_csv_multiple_lines() {
        let mut output = CsvOutput::new(false);
        output.add_line(line("a = min(1, 2)", Some(1.5), Some(0.5)));
        output.add_line(CsvLine {
            line: 1,
            ..line("return a", Some(2.0), Some(0.0))
        });
        let csv = output.to_csv();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], "0,\"a = min(1, 2)\",1.5,0.5");
        assert_eq!(rows[2], "1,return a,2,0");
    }
}
