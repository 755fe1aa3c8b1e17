//! Function source extraction
//!
//! Splits the text of one top-level function into its signature (which may
//! span several physical lines) and its body lines, preserving the original
//! formatting. The preprocessor's indentation arithmetic depends on that.

use crate::script::CompileError;

/// Exact text of a single function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSource {
    name: String,
    /// 1-based line of the `def` in the enclosing script
    first_line: usize,
    signature: String,
    body: Vec<String>,
}

impl FunctionSource {
    /// Split standalone function text (starting with its `def` line)
    pub fn parse(name: &str, text: &str) -> Result<Self, CompileError> {
        let lines: Vec<&str> = text.lines().collect();
        Self::from_lines(name, 1, &lines)
    }

    fn from_lines(name: &str, first_line: usize, lines: &[&str]) -> Result<Self, CompileError> {
        let Some(first) = lines.first() else {
            return Err(CompileError::new(first_line, "empty function source"));
        };
        let def_indent = indentation(first);
        if !first.trim_start().starts_with("def ") {
            return Err(CompileError::new(
                first_line,
                format!("expected 'def' at start of function '{}'", name),
            ));
        }

        // the header ends at the first ':' outside brackets and strings
        let mut depth: i32 = 0;
        for (offset, line) in lines.iter().enumerate() {
            if let Some(colon) = header_colon(line, &mut depth) {
                let rest = line[colon + 1..].trim();
                let mut signature_lines: Vec<&str> = lines[..offset].to_vec();
                let mut body: Vec<String> = Vec::new();
                if rest.is_empty() || rest.starts_with('#') {
                    signature_lines.push(line);
                } else {
                    // inline body: `def f(): return 1`
                    signature_lines.push(&line[..=colon]);
                    body.push(format!("{}{}", " ".repeat(def_indent + 4), rest));
                }
                body.extend(lines[offset + 1..].iter().map(|l| l.to_string()));
                return Ok(Self {
                    name: name.to_string(),
                    first_line,
                    signature: signature_lines.join("\n"),
                    body,
                });
            }
        }
        Err(CompileError::new(
            first_line,
            format!("unterminated signature for function '{}'", name),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn first_line(&self) -> usize {
        self.first_line
    }

    /// `def` line(s), ending with the colon
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// Signature and body joined back together
    pub fn text(&self) -> String {
        let mut text = self.signature.clone();
        for line in &self.body {
            text.push('\n');
            text.push_str(line);
        }
        text
    }
}

/// Cut lines `start..=end` (1-based; `end` defaults to the last line) out of
/// `script` and split them into a [`FunctionSource`]
pub fn extract_function(
    script: &str,
    name: &str,
    start: usize,
    end: Option<usize>,
) -> Result<FunctionSource, CompileError> {
    let all: Vec<&str> = script.lines().collect();
    let end = end.unwrap_or(all.len()).min(all.len());
    if start == 0 || start > end {
        return Err(CompileError::new(
            start,
            format!("function '{}' has no source lines", name),
        ));
    }
    let mut lines = &all[start - 1..end];
    // trailing blank lines and column-0 comments belong to no function
    while let Some((last, rest)) = lines.split_last() {
        if rest.is_empty() || !(last.trim().is_empty() || last.starts_with('#')) {
            break;
        }
        lines = rest;
    }
    FunctionSource::from_lines(name, start, lines)
}

/// Number of leading whitespace characters
pub fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Net change in bracket depth over `line`, ignoring strings and comments
pub fn bracket_delta(line: &str) -> i32 {
    let mut depth = 0;
    scan_code(line, |_, c| {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ => {}
        }
        false
    });
    depth
}

/// Split a single-line compound statement such as `if x: return 1` into its
/// header (`if x:`) and inline body (`return 1`)
pub fn split_inline_suite(line: &str) -> Option<(&str, &str)> {
    let mut depth = 0;
    let colon = header_colon(line, &mut depth)?;
    let rest = line[colon + 1..].trim();
    if rest.is_empty() || rest.starts_with('#') {
        return None;
    }
    Some((line[..=colon].trim_end(), rest))
}

/// Byte offset of the header-closing ':' on this line, tracking bracket depth
/// carried over from previous lines
fn header_colon(line: &str, depth: &mut i32) -> Option<usize> {
    let mut found = None;
    scan_code(line, |pos, c| {
        match c {
            '(' | '[' => *depth += 1,
            ')' | ']' => *depth -= 1,
            ':' if *depth == 0 => {
                found = Some(pos);
                return true;
            }
            _ => {}
        }
        false
    });
    found
}

/// Visit code characters outside string literals and comments; stop when
/// the visitor returns true
fn scan_code(line: &str, mut visit: impl FnMut(usize, char) -> bool) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (pos, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => return,
            _ => {
                if visit(pos, c) {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let src = FunctionSource::parse("f", "def f(x):\n    y = x\n    return y").unwrap();
        assert_eq!(src.signature(), "def f(x):");
        assert_eq!(src.body(), &["    y = x".to_string(), "    return y".to_string()]);
        assert_eq!(src.text(), "def f(x):\n    y = x\n    return y");
    }

    #[test]
    fn test_parse_inline_body() {
        let src = FunctionSource::parse("f", "def f(): return 1").unwrap();
        assert_eq!(src.signature(), "def f():");
        assert_eq!(src.body(), &["    return 1".to_string()]);
    }

    #[test]
    fn test_parse_multiline_signature_with_default_colon_string() {
        let src = FunctionSource::parse(
            "f",
            "def f(a,\n      sep=':'):\n    return a",
        )
        .unwrap();
        assert_eq!(src.signature(), "def f(a,\n      sep=':'):");
        assert_eq!(src.body().len(), 1);
    }

    #[test]
    fn test_extract_trims_trailing_noise() {
        let script = "def f():\n    return 1\n\n# next\n\ndef g():\n    pass\n";
        let src = extract_function(script, "f", 1, Some(5)).unwrap();
        assert_eq!(src.text(), "def f():\n    return 1");
        let g = extract_function(script, "g", 6, None).unwrap();
        assert_eq!(g.first_line(), 6);
        assert_eq!(g.body(), &["    pass".to_string()]);
    }

    #[test]
    fn test_extract_rejects_non_def() {
        assert!(extract_function("x = 1\n", "x", 1, None).is_err());
        assert!(extract_function("x = 1\n", "x", 3, None).is_err());
    }

    #[test]
    fn test_bracket_delta_ignores_strings_and_comments() {
        assert_eq!(bracket_delta("f(a, [1,"), 2);
        assert_eq!(bracket_delta("x = '(' # )"), 0);
        assert_eq!(bracket_delta("  3])"), -2);
    }

    #[test]
    fn test_split_inline_suite() {
        assert_eq!(split_inline_suite("if x: return 1"), Some(("if x:", "return 1")));
        assert_eq!(split_inline_suite("else:  pass  "), Some(("else:", "pass")));
        assert_eq!(split_inline_suite("for c in ':': n += 1"), Some(("for c in ':':", "n += 1")));
        assert_eq!(split_inline_suite("while x:  # spin"), None);
        assert_eq!(split_inline_suite("if x:"), None);
    }

    #[test]
    fn test_indentation() {
        assert_eq!(indentation("    x"), 4);
        assert_eq!(indentation("x"), 0);
        assert_eq!(indentation("\tx"), 1);
    }
}
