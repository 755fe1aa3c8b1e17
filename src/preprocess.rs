//! Preprocessor: turns a function body into the cleaned line sequence
//!
//! Blank lines and full-line comments are dropped, bracket continuations are
//! joined into one logical line, and inline suites (`if x: return 1`) are
//! split so every statement gets its own instrumentation point. Whenever
//! indentation decreases a boundary marker is inserted at the depth that was
//! just left; it closes the timing span of the block's last line and is
//! discarded again before reporting.

use crate::source::{bracket_delta, indentation, split_inline_suite, FunctionSource};
use regex::Regex;
use tracing::debug;

/// Text of a synthetic span-closing line
pub const BOUNDARY_MARKER: &str = "#boundary";

/// Text of the end-of-trace instrumentation point
pub const END_OF_TRACE: &str = "#end_of_trace";

/// Pattern for statements that are never timed, unless configured otherwise
pub const DEFAULT_PASSTHROUGH: &str = r"^print\(";

/// Indentation added when an inline suite is split onto its own line
const SUITE_INDENT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Ordinary statement; gets an instrumentation point
    Statement,
    /// `return` statement
    Return,
    /// `elif`/`else` header; cannot be preceded by a statement at its depth
    BranchHeader,
    /// Matches a pass-through pattern
    PassThrough,
    /// Body of a nested `def`; runs in another frame
    Nested,
    /// Synthetic marker closing the block that was just exited
    Boundary,
}

impl LineKind {
    /// Whether the instrumenter places a timer before this line
    pub fn is_timed(self) -> bool {
        matches!(self, LineKind::Statement | LineKind::Return | LineKind::Boundary)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedLine {
    /// Position in the cleaned sequence
    pub ordinal: usize,
    pub indent: usize,
    pub kind: LineKind,
    /// Code to re-emit after the indentation; continuation lines keep their
    /// own newlines
    pub code: String,
    /// Single-line rendering, indented relative to the body
    pub display: String,
}

/// Output of the preprocessor
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedLines {
    pub signature: String,
    /// Indentation of the first retained body line (0 for an empty body)
    pub initial_indent: usize,
    pub lines: Vec<CleanedLine>,
}

impl CleanedLines {
    /// Ordinal of the end-of-trace point: one past the last cleaned line
    pub fn end_ordinal(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn boundary_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Boundary)
            .count()
    }
}

/// A logical line before indentation bookkeeping
struct Logical {
    indent: usize,
    code: String,
    display: String,
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    passthrough: Vec<Regex>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            passthrough: vec![default_passthrough()],
        }
    }
}

fn default_passthrough() -> Regex {
    Regex::new(DEFAULT_PASSTHROUGH).expect("default pass-through pattern compiles")
}

impl Preprocessor {
    /// Build with custom pass-through patterns, matched against stripped lines
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let passthrough = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { passthrough })
    }

    fn is_passthrough(&self, stripped: &str) -> bool {
        self.passthrough.iter().any(|re| re.is_match(stripped))
    }

    pub fn process(&self, source: &FunctionSource) -> CleanedLines {
        let logical = logical_lines(source.body());
        let initial_indent = logical.first().map(|l| l.indent).unwrap_or(0);

        let mut lines: Vec<CleanedLine> = Vec::with_capacity(logical.len() * 2);
        let mut prev_indent: Option<usize> = None;
        // indentation of an enclosing nested `def` whose body is being copied
        let mut nested_def: Option<usize> = None;

        for line in logical {
            if let Some(def_indent) = nested_def {
                if line.indent > def_indent {
                    let display = relative(&line.display, line.indent, initial_indent);
                    push(&mut lines, line.indent, LineKind::Nested, line.code, display);
                    continue;
                }
                nested_def = None;
            }

            if let Some(prev) = prev_indent {
                if line.indent < prev {
                    push(
                        &mut lines,
                        prev,
                        LineKind::Boundary,
                        BOUNDARY_MARKER.to_string(),
                        BOUNDARY_MARKER.to_string(),
                    );
                }
            }
            prev_indent = Some(line.indent);

            let stripped = line.display.as_str();
            let kind = if is_branch_header(stripped) {
                LineKind::BranchHeader
            } else if self.is_passthrough(stripped) {
                LineKind::PassThrough
            } else if is_return(stripped) {
                LineKind::Return
            } else {
                LineKind::Statement
            };
            if starts_keyword(stripped, "def") {
                nested_def = Some(line.indent);
            }
            let display = relative(stripped, line.indent, initial_indent);
            push(&mut lines, line.indent, kind, line.code, display);
        }

        if let Some(prev) = prev_indent {
            if prev != initial_indent {
                push(
                    &mut lines,
                    initial_indent,
                    LineKind::Boundary,
                    BOUNDARY_MARKER.to_string(),
                    BOUNDARY_MARKER.to_string(),
                );
            }
        }

        let cleaned = CleanedLines {
            signature: source.signature().to_string(),
            initial_indent,
            lines,
        };
        debug!(
            function = source.name(),
            lines = cleaned.lines.len(),
            boundaries = cleaned.boundary_count(),
            initial_indent,
            "preprocessed function body"
        );
        cleaned
    }
}

fn push(lines: &mut Vec<CleanedLine>, indent: usize, kind: LineKind, code: String, display: String) {
    let ordinal = lines.len();
    lines.push(CleanedLine {
        ordinal,
        indent,
        kind,
        code,
        display,
    });
}

/// Join continuations, drop blanks and comments, split inline suites
fn logical_lines(body: &[String]) -> Vec<Logical> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, Vec<String>, Vec<String>)> = None;
    let mut depth = 0;

    for raw in body {
        match pending.as_mut() {
            Some((_, code, display)) => {
                code.push(raw.to_string());
                let piece = raw.trim();
                if !piece.is_empty() {
                    display.push(piece.to_string());
                }
            }
            None => {
                let stripped = raw.trim();
                if stripped.is_empty() || stripped.starts_with('#') {
                    continue;
                }
                pending = Some((
                    indentation(raw),
                    vec![raw.trim_start().to_string()],
                    vec![stripped.to_string()],
                ));
            }
        }
        depth += bracket_delta(raw);
        if depth <= 0 {
            depth = 0;
            if let Some((indent, code, display)) = pending.take() {
                emit_logical(&mut out, indent, code.join("\n"), display.join(" "));
            }
        }
    }
    // unbalanced brackets: keep what we have and let the compiler complain
    if let Some((indent, code, display)) = pending.take() {
        emit_logical(&mut out, indent, code.join("\n"), display.join(" "));
    }
    out
}

fn emit_logical(out: &mut Vec<Logical>, indent: usize, code: String, display: String) {
    let compound = ["if", "elif", "else", "while", "for", "def"]
        .iter()
        .any(|kw| starts_keyword(&display, kw));
    if compound && !code.contains('\n') {
        if let Some((header, rest)) = split_inline_suite(&code) {
            out.push(Logical {
                indent,
                code: header.to_string(),
                display: header.to_string(),
            });
            out.push(Logical {
                indent: indent + SUITE_INDENT,
                code: rest.to_string(),
                display: rest.trim_end().to_string(),
            });
            return;
        }
    }
    out.push(Logical {
        indent,
        code: code.trim_end().to_string(),
        display: display.trim_end().to_string(),
    });
}

fn relative(text: &str, indent: usize, initial_indent: usize) -> String {
    format!("{}{}", " ".repeat(indent.saturating_sub(initial_indent)), text)
}

/// `word` followed by a non-identifier character (or end of line)
pub(crate) fn starts_keyword(stripped: &str, word: &str) -> bool {
    match stripped.strip_prefix(word) {
        Some(rest) => !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'),
        None => false,
    }
}

fn is_branch_header(stripped: &str) -> bool {
    starts_keyword(stripped, "elif") || starts_keyword(stripped, "else")
}

fn is_return(stripped: &str) -> bool {
    starts_keyword(stripped, "return")
}
