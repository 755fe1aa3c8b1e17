//! Pulse script engine: the small indentation-structured language whose
//! functions the profiler instruments and executes.
//!
//! The engine is a classic pipeline:
//!
//! ```text
//! source text → lexer → tokens → parser → Program (AST) → Interpreter
//! ```
//!
//! [`Script`] ties a source file to its parsed program and hands out the exact
//! text of individual functions for instrumentation.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::Program;
pub use builtins::{PrintSink, CLOCK_BUILTIN};
pub use error::{CompileError, ErrorKind, RuntimeError, RuntimeResult};
pub use interpreter::{Interpreter, DEFAULT_RECURSION_LIMIT, MAX_RECURSION_LIMIT};
pub use value::Value;

use crate::clock::MonotonicClock;
use crate::source::{self, FunctionSource};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error at {0}")]
    Compile(#[from] CompileError),

    #[error("runtime error at {0}")]
    Runtime(#[from] RuntimeError),

    #[error("function '{name}' is not defined at the top level of the script (available: {available})")]
    FunctionNotFound { name: String, available: String },
}

pub type Result<T> = std::result::Result<T, ScriptError>;

/// A parsed script and the text it came from
#[derive(Debug, Clone)]
pub struct Script {
    source: String,
    program: Program,
    origin: Option<PathBuf>,
}

impl Script {
    /// Parse script text; syntax errors are reported immediately
    pub fn from_source(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let program = parser::parse_program(&source)?;
        Ok(Self {
            source,
            program,
            origin: None,
        })
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut script = Self::from_source(source)?;
        script.origin = Some(path.to_path_buf());
        Ok(script)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Names of top-level functions in definition order
    pub fn function_names(&self) -> Vec<&str> {
        self.program.functions().map(|def| def.name.as_str()).collect()
    }

    /// Exact text of one top-level function, signature included
    pub fn function_source(&self, name: &str) -> Result<FunctionSource> {
        let Some(def) = self.program.functions().rev().find(|def| def.name == name) else {
            return Err(ScriptError::FunctionNotFound {
                name: name.to_string(),
                available: self.function_names().join(", "),
            });
        };
        let start = def.line;
        let end = self
            .program
            .body
            .iter()
            .map(|stmt| stmt.line)
            .find(|&line| line > start)
            .map(|next| next - 1);
        Ok(source::extract_function(&self.source, name, start, end)?)
    }
}

/// Evaluate one expression in a fresh interpreter (command-line arguments)
pub fn evaluate(text: &str) -> Result<Value> {
    let expr = parser::parse_expression(text)?;
    let mut interpreter = Interpreter::new(Rc::new(MonotonicClock::new()), PrintSink::Stderr);
    Ok(interpreter.eval(&expr)?)
}
