//! Fixed-width console table for a [`ProfileReport`]
//!
//! ```text
//!   =====================================================================
//!   |> Function Name: work, #iter: 3, mean_time(in ms): 0.41, std_time(in_ms): 0.02
//!   =====================================================================
//!   | LineNo     | line                     | mean_time(in ms)     | std_time(in ms) |
//!   =====================================================================
//!   | 0          | total = 0                | 0.003                | 0.001
//!   ...
//!   ---------------------------------------------------------------------
//! ```
//!
//! Column widths are the widest printed cell of each column, header
//! included, plus a fixed padding. Statistics that are undefined (a single
//! sample) print as `n/a`.

use crate::profiler::ProfileReport;
use crate::script::value::format_float;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

const HEADERS: [&str; 4] = ["LineNo", "line", "mean_time(in ms)", "std_time(in ms)"];
const UNDEFINED: &str = "n/a";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayOptions {
    /// Spaces added to every column beyond its widest cell
    pub padding: usize,
    /// Indentation of the whole table
    pub left_padding: usize,
    /// Decimal places statistics are rounded to
    pub precision: u32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            padding: 5,
            left_padding: 2,
            precision: 3,
        }
    }
}

impl DisplayOptions {
    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.precision as i32);
        (value * scale).round() / scale
    }

    pub fn format_stat(&self, value: Option<f64>) -> String {
        match value {
            Some(v) => format_float(self.round(v)),
            None => UNDEFINED.to_string(),
        }
    }
}

fn width(text: &str) -> usize {
    text.chars().count()
}

fn cells(report: &ProfileReport, options: &DisplayOptions) -> Vec<[String; 4]> {
    report
        .rows()
        .iter()
        .map(|row| {
            [
                row.line.to_string(),
                row.text.clone(),
                options.format_stat(row.mean_ms),
                options.format_stat(row.std_ms),
            ]
        })
        .collect()
}

fn column_widths(rows: &[[String; 4]], padding: usize) -> [usize; 4] {
    let mut widths = HEADERS.map(width);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(width(cell));
        }
    }
    widths.map(|w| w + padding)
}

fn pad(text: &str, to: usize) -> String {
    format!("{}{}", text, " ".repeat(to.saturating_sub(width(text))))
}

/// Write the table for `report` to `out`
pub fn render<W: Write>(report: &ProfileReport, options: &DisplayOptions, out: &mut W) -> io::Result<()> {
    let rows = cells(report, options);
    let widths = column_widths(&rows, options.padding);
    let left = " ".repeat(options.left_padding);

    let heading = format!(
        "{left}| {}| {}| {}| {} |",
        pad(HEADERS[0], widths[0]),
        pad(HEADERS[1], widths[1]),
        pad(HEADERS[2], widths[2]),
        HEADERS[3],
    );
    let rule_len = width(&heading) - options.left_padding;
    let double_rule = format!("{left}{}", "=".repeat(rule_len));

    let total_mean = options.format_stat(report.total_mean_ms().ok());
    let total_std = options.format_stat(report.total_std_ms().ok());

    writeln!(out)?;
    writeln!(out, "{double_rule}")?;
    writeln!(
        out,
        "{left}|> Function Name: {}, #iter: {}, mean_time(in ms): {}, std_time(in_ms): {}",
        report.function, report.iterations, total_mean, total_std
    )?;
    writeln!(out, "{double_rule}")?;
    writeln!(out, "{heading}")?;
    writeln!(out, "{double_rule}")?;
    for row in &rows {
        let mut line = left.clone();
        for (cell, w) in row.iter().zip(widths) {
            line.push_str("| ");
            line.push_str(&pad(cell, w));
        }
        writeln!(out, "{line}")?;
    }
    writeln!(out, "{left}{}", "-".repeat(rule_len))?;
    Ok(())
}

pub fn render_to_string(report: &ProfileReport, options: &DisplayOptions) -> String {
    let mut buffer = Vec::new();
    // writing into a Vec cannot fail
    let _ = render(report, options, &mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}
