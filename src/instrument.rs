//! Instrumenter: rewrites a cleaned function body into timed source text
//!
//! Every timed line is preceded by two statements:
//!
//! ```text
//! __tw_3 = perf_counter()
//! __mw_3 = max(__mw_3, 0.0 if __tw_2 is None else __tw_3 - __tw_2)
//! ```
//!
//! `__tw_k` holds the latest timestamp at point `k`, `__mw_k` the largest gap
//! observed between point `k` and its textual predecessor within one call.
//! `elif`/`else` headers cannot take a statement in front of them; they get a
//! tracker with a constant `0` timestamp and a `0.0` span instead.
//! Each `return` is rewritten to hand back the trackers alongside the value:
//!
//! ```text
//! __rv_4 = <value>
//! <end-of-trace point>
//! return __rv_4, ((0, 'm = 1', __tw_0, __mw_0), ..., )
//! ```

use crate::preprocess::{CleanedLines, LineKind, END_OF_TRACE};
use crate::script::lexer::quote_literal;
use crate::script::CLOCK_BUILTIN;
use tracing::debug;

/// Indentation used when the body is empty
const FALLBACK_INDENT: usize = 4;

/// Timestamp literal of an untimed branch-header tracker
const BRANCH_TIMESTAMP: &str = "0";

/// Static description of one instrumentation point
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerMeta {
    pub ordinal: usize,
    pub text: String,
    pub timestamp_var: String,
    pub span_var: String,
    /// False for branch headers, which report a zero span
    pub timed: bool,
}

impl TrackerMeta {
    fn new(ordinal: usize, text: &str) -> Self {
        Self {
            ordinal,
            text: text.to_string(),
            timestamp_var: timestamp_var(ordinal),
            span_var: span_var(ordinal),
            timed: true,
        }
    }

    fn branch(ordinal: usize, text: &str) -> Self {
        Self {
            timed: false,
            ..Self::new(ordinal, text)
        }
    }

    /// Tuple literal placed in the returned trace
    fn literal(&self) -> String {
        if !self.timed {
            return format!(
                "({}, {}, {}, 0.0)",
                self.ordinal,
                quote_literal(&self.text),
                BRANCH_TIMESTAMP
            );
        }
        format!(
            "({}, {}, {}, {})",
            self.ordinal,
            quote_literal(&self.text),
            self.timestamp_var,
            self.span_var
        )
    }
}

/// Rewritten function text plus its tracker metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Instrumented {
    pub source: String,
    /// Body trackers in ordinal order (the end-of-trace point excluded)
    pub trackers: Vec<TrackerMeta>,
    pub end_ordinal: usize,
    /// Number of rewritten `return` statements
    pub returns: usize,
}

impl Instrumented {
    pub fn point_count(&self) -> usize {
        self.trackers.len() + 1
    }
}

pub fn timestamp_var(ordinal: usize) -> String {
    format!("__tw_{}", ordinal)
}

pub fn span_var(ordinal: usize) -> String {
    format!("__mw_{}", ordinal)
}

fn return_var(ordinal: usize) -> String {
    format!("__rv_{}", ordinal)
}

struct Emitter {
    body: Vec<String>,
    trackers: Vec<TrackerMeta>,
    end: TrackerMeta,
    /// Expression for the timestamp of the textually previous point
    prev: String,
}

impl Emitter {
    fn point(&mut self, ordinal: usize, indent: usize, prev: &str) {
        let pad = " ".repeat(indent);
        let tw = timestamp_var(ordinal);
        let mw = span_var(ordinal);
        self.body.push(format!("{}{} = {}()", pad, tw, CLOCK_BUILTIN));
        self.body.push(format!(
            "{pad}{mw} = max({mw}, 0.0 if {prev} is None else {tw} - {prev})",
            pad = pad,
            mw = mw,
            tw = tw,
            prev = prev
        ));
    }

    /// Tuple of every tracker emitted so far plus the end point
    fn trace_tuple(&self) -> String {
        let mut parts: Vec<String> = self.trackers.iter().map(TrackerMeta::literal).collect();
        parts.push(self.end.literal());
        format!("({}, )", parts.join(", "))
    }
}

pub fn instrument(cleaned: &CleanedLines) -> Instrumented {
    let base = if cleaned.is_empty() {
        FALLBACK_INDENT
    } else {
        cleaned.initial_indent
    };
    let end_ordinal = cleaned.end_ordinal();
    let mut emitter = Emitter {
        body: Vec::with_capacity(cleaned.lines.len() * 3 + 3),
        trackers: Vec::with_capacity(cleaned.lines.len()),
        end: TrackerMeta::new(end_ordinal, END_OF_TRACE),
        prev: format!("{}()", CLOCK_BUILTIN),
    };
    let mut skip_below: Option<usize> = None;
    let mut returns = 0;
    let mut returned_at_base = false;

    for line in &cleaned.lines {
        if let Some(depth) = skip_below {
            if line.indent >= depth {
                // unreachable after a return in the same block
                continue;
            }
            skip_below = None;
        }
        let pad = " ".repeat(line.indent);

        if line.kind == LineKind::BranchHeader {
            emitter.body.push(format!("{}{}", pad, line.code));
            emitter
                .trackers
                .push(TrackerMeta::branch(line.ordinal, &line.display));
            continue;
        }
        if !line.kind.is_timed() {
            emitter.body.push(format!("{}{}", pad, line.code));
            continue;
        }

        let prev = std::mem::replace(&mut emitter.prev, timestamp_var(line.ordinal));
        emitter.point(line.ordinal, line.indent, &prev);
        emitter
            .trackers
            .push(TrackerMeta::new(line.ordinal, &line.display));

        if line.kind == LineKind::Return {
            let value = return_value(&line.code);
            let rv = return_var(line.ordinal);
            emitter.body.push(format!("{}{} = {}", pad, rv, value));
            let tw = timestamp_var(line.ordinal);
            emitter.point(end_ordinal, line.indent, &tw);
            let tuple = emitter.trace_tuple();
            emitter
                .body
                .push(format!("{}return {}, {}", pad, rv, tuple));
            returns += 1;
            skip_below = Some(line.indent);
            if line.indent <= base {
                returned_at_base = true;
            }
        } else {
            emitter.body.push(format!("{}{}", pad, line.code));
        }
    }

    if !returned_at_base {
        let prev = emitter.prev.clone();
        emitter.point(end_ordinal, base, &prev);
        let tuple = emitter.trace_tuple();
        emitter
            .body
            .push(format!("{}return 1, {}", " ".repeat(base), tuple));
    }

    let pad = " ".repeat(base);
    let mut source = cleaned.signature.clone();
    let timed: Vec<&TrackerMeta> = emitter
        .trackers
        .iter()
        .chain(std::iter::once(&emitter.end))
        .filter(|t| t.timed)
        .collect();
    for tracker in &timed {
        source.push_str(&format!("\n{}{} = None", pad, tracker.timestamp_var));
    }
    for tracker in &timed {
        source.push_str(&format!("\n{}{} = 0.0", pad, tracker.span_var));
    }
    for line in &emitter.body {
        source.push('\n');
        source.push_str(line);
    }
    source.push('\n');

    debug!(
        points = emitter.trackers.len() + 1,
        returns,
        bytes = source.len(),
        "instrumented function"
    );

    Instrumented {
        source,
        trackers: emitter.trackers,
        end_ordinal,
        returns,
    }
}

/// Expression returned by a `return` line (`None` when bare)
fn return_value(code: &str) -> &str {
    let value = code.strip_prefix("return").unwrap_or(code).trim();
    if value.is_empty() || value.starts_with('#') {
        "None"
    } else {
        value
    }
}
