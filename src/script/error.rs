//! Compile-time and run-time errors raised by the script engine

use thiserror::Error;

/// Lexer or parser failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct CompileError {
    /// 1-based line within the compiled text
    pub line: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// What went wrong while executing a script
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("name '{0}' is not defined")]
    UndefinedName(String),

    #[error("unsupported operand type(s) for {op}: '{left}' and '{right}'")]
    UnsupportedOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("bad operand type for unary {op}: '{operand}'")]
    BadUnaryOperand { op: &'static str, operand: &'static str },

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Value(String),

    #[error("division by zero")]
    ZeroDivision,

    #[error("integer overflow")]
    Overflow,

    #[error("repetition would exceed {0} items")]
    TooLarge(usize),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("'{0}' object is not callable")]
    NotCallable(&'static str),

    #[error("'{type_name}' object has no method '{method}'")]
    NoSuchMethod {
        type_name: &'static str,
        method: String,
    },

    #[error("{function}() {message}")]
    Arity { function: String, message: String },

    #[error("maximum recursion depth of {0} exceeded")]
    RecursionLimit(usize),

    #[error("'{0}' outside loop")]
    OutsideLoop(&'static str),

    #[error("raised: {0}")]
    Raised(String),
}

/// Runtime failure annotated with the line that raised it
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {kind}")]
pub struct RuntimeError {
    pub line: usize,
    pub kind: ErrorKind,
}

impl RuntimeError {
    pub fn new(line: usize, kind: ErrorKind) -> Self {
        Self { line, kind }
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
