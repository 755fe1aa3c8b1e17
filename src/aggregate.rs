//! Aggregator: folds N traces into the per-line report
//!
//! The span recorded at point `k` measures the line *before* it, so every
//! run's samples are shifted back by one present ordinal before the
//! statistics are taken. Ordinals a run never reached contribute nothing
//! (missing is not zero).

use crate::executor::Trace;
use crate::preprocess::{BOUNDARY_MARKER, END_OF_TRACE};
use crate::profiler::{ProfileError, Result};
use crate::stats::Summary;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Degrees of freedom used for per-row deviations (sample deviation)
pub const ROW_DDOF: usize = 1;

/// One line of the aggregated report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Contiguous row number after markers are dropped
    pub line: usize,
    /// Position in the cleaned line sequence
    pub ordinal: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_ms: Option<f64>,
    /// Runs that produced a sample for this line
    pub samples: usize,
}

/// Cell of the trace table: what one run recorded at one ordinal
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    /// Milliseconds attributed to this ordinal after the shift, if any
    pub elapsed_ms: Option<f64>,
}

/// Sparse ordinal × run table built from all traces
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceTable {
    runs: usize,
    rows: BTreeMap<usize, Vec<Option<Cell>>>,
}

impl TraceTable {
    pub fn from_traces(traces: &[Trace]) -> Self {
        let runs = traces.len();
        let mut rows: BTreeMap<usize, Vec<Option<Cell>>> = BTreeMap::new();
        for (run, trace) in traces.iter().enumerate() {
            for (idx, entry) in trace.entries.iter().enumerate() {
                let elapsed_ms = trace.entries.get(idx + 1).map(|next| next.span * 1000.0);
                let row = rows.entry(entry.ordinal).or_insert_with(|| vec![None; runs]);
                row[run] = Some(Cell {
                    text: entry.text.clone(),
                    elapsed_ms,
                });
            }
        }
        Self { runs, rows }
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn ordinals(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.keys().copied()
    }

    pub fn cell(&self, ordinal: usize, run: usize) -> Option<&Cell> {
        self.rows.get(&ordinal)?.get(run)?.as_ref()
    }

    /// First non-blank text for `ordinal`, scanning runs in order
    pub fn canonical_text(&self, ordinal: usize) -> Result<String> {
        self.rows
            .get(&ordinal)
            .into_iter()
            .flatten()
            .flatten()
            .map(|cell| cell.text.trim_end())
            .find(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or(ProfileError::Resolution { ordinal })
    }

    /// Present samples for `ordinal`, in run order
    pub fn samples(&self, ordinal: usize) -> Vec<f64> {
        self.rows
            .get(&ordinal)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|cell| cell.elapsed_ms)
            .collect()
    }
}

/// Final per-line table
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AggregatedReport {
    pub rows: Vec<ReportRow>,
}

impl AggregatedReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn is_synthetic(text: &str) -> bool {
    let text = text.trim_start();
    text == BOUNDARY_MARKER || text == END_OF_TRACE
}

pub fn aggregate(traces: &[Trace]) -> Result<AggregatedReport> {
    let table = TraceTable::from_traces(traces);
    let mut rows = Vec::new();
    for ordinal in table.ordinals() {
        let text = table.canonical_text(ordinal)?;
        if is_synthetic(&text) {
            continue;
        }
        let summary = Summary::of(&table.samples(ordinal), ROW_DDOF);
        rows.push(ReportRow {
            line: rows.len(),
            ordinal,
            text,
            mean_ms: summary.mean,
            std_ms: summary.std,
            samples: summary.count,
        });
    }
    debug!(runs = table.runs(), rows = rows.len(), "aggregated traces");
    Ok(AggregatedReport { rows })
}
