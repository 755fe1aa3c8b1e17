//! Tokenizer for pulse scripts
//!
//! Produces an indentation-aware token stream: leading spaces open and close
//! blocks through `Indent`/`Dedent` tokens, while open brackets suspend line
//! structure so one statement may span several physical lines.

use super::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
    Is,
    In,
    If,
    Elif,
    Else,
    While,
    For,
    Def,
    Return,
    Break,
    Continue,
    Pass,
    Raise,
    True,
    False,
    None,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Self> {
        let kw = match word {
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "is" => Keyword::Is,
            "in" => Keyword::In,
            "if" => Keyword::If,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "for" => Keyword::For,
            "def" => Keyword::Def,
            "return" => Keyword::Return,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "pass" => Keyword::Pass,
            "raise" => Keyword::Raise,
            "True" => Keyword::True,
            "False" => Keyword::False,
            "None" => Keyword::None,
            _ => return None,
        };
        Some(kw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    Op(Op),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based physical line
    pub line: usize,
}

/// Tokenize a complete script
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut indents = vec![0usize];
    // lines of brackets still open
    let mut open: Vec<usize> = Vec::new();
    let mut last_line = 0usize;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let chars: Vec<char> = raw.chars().collect();
        let mut pos = 0usize;

        if open.is_empty() {
            while pos < chars.len() && (chars[pos] == ' ' || chars[pos] == '\t') {
                pos += 1;
            }
            if pos == chars.len() || chars[pos] == '#' {
                continue;
            }
            let indent = pos;
            let current = indents.last().copied().unwrap_or(0);
            if indent > current {
                indents.push(indent);
                tokens.push(Token {
                    kind: TokenKind::Indent,
                    line: line_no,
                });
            } else if indent < current {
                while indents.last().copied().unwrap_or(0) > indent {
                    indents.pop();
                    tokens.push(Token {
                        kind: TokenKind::Dedent,
                        line: line_no,
                    });
                }
                if indents.last().copied().unwrap_or(0) != indent {
                    return Err(CompileError::new(
                        line_no,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }
        }

        while pos < chars.len() {
            let ch = chars[pos];
            if ch == ' ' || ch == '\t' || ch == '\r' {
                pos += 1;
                continue;
            }
            if ch == '#' {
                break;
            }
            if ch.is_ascii_digit() || (ch == '.' && next_is_digit(&chars, pos)) {
                let (kind, next) = lex_number(&chars, pos, line_no)?;
                tokens.push(Token {
                    kind,
                    line: line_no,
                });
                pos = next;
                continue;
            }
            if ch.is_alphabetic() || ch == '_' {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                let kind = match Keyword::lookup(&word) {
                    Some(kw) => TokenKind::Keyword(kw),
                    None => TokenKind::Name(word),
                };
                tokens.push(Token {
                    kind,
                    line: line_no,
                });
                continue;
            }
            if ch == '\'' || ch == '"' {
                let (text, next) = lex_string(&chars, pos, line_no)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    line: line_no,
                });
                pos = next;
                continue;
            }

            let (op, width) = lex_op(&chars, pos)
                .ok_or_else(|| CompileError::new(line_no, format!("unexpected character '{}'", ch)))?;
            match op {
                Op::LParen | Op::LBracket => open.push(line_no),
                Op::RParen | Op::RBracket => {
                    if open.pop().is_none() {
                        return Err(CompileError::new(line_no, "unmatched closing bracket"));
                    }
                }
                _ => {}
            }
            tokens.push(Token {
                kind: TokenKind::Op(op),
                line: line_no,
            });
            pos += width;
        }

        if open.is_empty() && needs_newline(&tokens) {
            tokens.push(Token {
                kind: TokenKind::Newline,
                line: line_no,
            });
        }
    }

    if let Some(&opened) = open.first() {
        return Err(CompileError::new(opened, "bracket is never closed"));
    }
    if needs_newline(&tokens) {
        tokens.push(Token {
            kind: TokenKind::Newline,
            line: last_line,
        });
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token {
            kind: TokenKind::Dedent,
            line: last_line,
        });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        line: last_line,
    });
    Ok(tokens)
}

fn needs_newline(tokens: &[Token]) -> bool {
    matches!(
        tokens.last().map(|t| &t.kind),
        Some(kind) if !matches!(kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent)
    )
}

fn next_is_digit(chars: &[char], pos: usize) -> bool {
    chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit())
}

fn lex_number(chars: &[char], start: usize, line: usize) -> Result<(TokenKind, usize), CompileError> {
    let mut pos = start;
    let mut is_float = false;
    while pos < chars.len() && chars[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < chars.len() && chars[pos] == '.' {
        is_float = true;
        pos += 1;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
        let mut exp = pos + 1;
        if exp < chars.len() && (chars[exp] == '+' || chars[exp] == '-') {
            exp += 1;
        }
        if exp < chars.len() && chars[exp].is_ascii_digit() {
            is_float = true;
            pos = exp;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    let text: String = chars[start..pos].iter().collect();
    let kind = if is_float {
        let value = text
            .parse::<f64>()
            .map_err(|_| CompileError::new(line, format!("invalid float literal '{}'", text)))?;
        TokenKind::Float(value)
    } else {
        let value = text
            .parse::<i64>()
            .map_err(|_| CompileError::new(line, format!("integer literal '{}' is too large", text)))?;
        TokenKind::Int(value)
    };
    Ok((kind, pos))
}

fn lex_string(chars: &[char], start: usize, line: usize) -> Result<(String, usize), CompileError> {
    let quote = chars[start];
    let mut pos = start + 1;
    let mut text = String::new();
    while pos < chars.len() {
        let ch = chars[pos];
        if ch == quote {
            return Ok((text, pos + 1));
        }
        if ch == '\\' {
            let escaped = chars
                .get(pos + 1)
                .ok_or_else(|| CompileError::new(line, "unterminated string literal"))?;
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '0' => text.push('\0'),
                '\\' | '\'' | '"' => text.push(*escaped),
                other => {
                    text.push('\\');
                    text.push(*other);
                }
            }
            pos += 2;
            continue;
        }
        text.push(ch);
        pos += 1;
    }
    Err(CompileError::new(line, "unterminated string literal"))
}

fn lex_op(chars: &[char], pos: usize) -> Option<(Op, usize)> {
    let ch = chars[pos];
    let next = chars.get(pos + 1).copied();
    let two = match (ch, next) {
        ('*', Some('*')) => Some(Op::DoubleStar),
        ('/', Some('/')) => Some(Op::DoubleSlash),
        ('=', Some('=')) => Some(Op::Eq),
        ('!', Some('=')) => Some(Op::NotEq),
        ('<', Some('=')) => Some(Op::LtE),
        ('>', Some('=')) => Some(Op::GtE),
        ('+', Some('=')) => Some(Op::PlusAssign),
        ('-', Some('=')) => Some(Op::MinusAssign),
        ('*', Some('=')) => Some(Op::StarAssign),
        ('/', Some('=')) => Some(Op::SlashAssign),
        _ => None,
    };
    if let Some(op) = two {
        return Some((op, 2));
    }
    let one = match ch {
        '(' => Op::LParen,
        ')' => Op::RParen,
        '[' => Op::LBracket,
        ']' => Op::RBracket,
        ',' => Op::Comma,
        ':' => Op::Colon,
        '.' => Op::Dot,
        '=' => Op::Assign,
        '+' => Op::Plus,
        '-' => Op::Minus,
        '*' => Op::Star,
        '/' => Op::Slash,
        '%' => Op::Percent,
        '<' => Op::Lt,
        '>' => Op::Gt,
        _ => return None,
    };
    Some((one, 1))
}

/// Quote `text` as a single-quoted script string literal
pub fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            kinds("x = 1"),
            vec![
                TokenKind::Name("x".into()),
                TokenKind::Op(Op::Assign),
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let toks = kinds("if x:\n    y = 1\nz = 2\n");
        assert!(toks.contains(&TokenKind::Indent));
        assert!(toks.contains(&TokenKind::Dedent));
        let indent_pos = toks.iter().position(|t| *t == TokenKind::Indent).unwrap();
        let dedent_pos = toks.iter().position(|t| *t == TokenKind::Dedent).unwrap();
        assert!(indent_pos < dedent_pos);
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let toks = kinds("x = 1\n\n    # indented comment\ny = 2\n");
        assert!(!toks.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_brackets_suspend_newlines() {
        let toks = kinds("xs = [1,\n        2]\n");
        let newlines = toks.iter().filter(|t| **t == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!toks.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_unclosed_bracket_reports_opening_line() {
        let err = tokenize("x = 1\ny = f(1,\n  2\nz = 3\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_bad_dedent_rejected() {
        let err = tokenize("if x:\n        y = 1\n    z = 2\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1.5")[0], TokenKind::Float(1.5));
        assert_eq!(kinds("2.")[0], TokenKind::Float(2.0));
        assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
        assert_eq!(kinds("42")[0], TokenKind::Int(42));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#"'it\'s'"#)[0], TokenKind::Str("it's".into()));
        assert_eq!(kinds(r#""a\nb""#)[0], TokenKind::Str("a\nb".into()));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("x = 'abc").is_err());
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(tokenize("x = (1, 2").is_err());
        assert!(tokenize("x = 1)").is_err());
    }

    #[test]
    fn test_quote_literal_round_trips_through_lexer() {
        let text = "print('a\\b')";
        let quoted = quote_literal(text);
        assert_eq!(kinds(&quoted)[0], TokenKind::Str(text.to_string()));
    }

    #[test]
    fn test_two_char_operators() {
        let toks = kinds("a ** b // c != d");
        assert!(toks.contains(&TokenKind::Op(Op::DoubleStar)));
        assert!(toks.contains(&TokenKind::Op(Op::DoubleSlash)));
        assert!(toks.contains(&TokenKind::Op(Op::NotEq)));
    }
}
