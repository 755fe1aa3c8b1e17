//! Materializer: compiles instrumented text inside an execution namespace

use crate::clock::{Clock, MonotonicClock};
use crate::profiler::{ProfileError, Result};
use crate::script::builtins::clock_function;
use crate::script::parser::parse_program;
use crate::script::{
    Interpreter, PrintSink, Program, RuntimeResult, Value, CLOCK_BUILTIN, DEFAULT_RECURSION_LIMIT,
};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Names visible to the profiled function
///
/// Defaults to the builtins plus the `perf_counter` clock accessor. A script
/// preamble (helper functions, module constants) runs first, then caller
/// bindings are merged over the result. The clock accessor always wins.
#[derive(Clone)]
pub struct Namespace {
    clock: Rc<dyn Clock>,
    preamble: Option<Program>,
    bindings: BTreeMap<String, Value>,
    sink: PrintSink,
    recursion_limit: usize,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(Rc::new(MonotonicClock::new()))
    }
}

impl Namespace {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            preamble: None,
            bindings: BTreeMap::new(),
            sink: PrintSink::default(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Bind an extra name; attempts to replace the clock accessor are ignored
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if name == CLOCK_BUILTIN {
            warn!(name = %name, "ignoring binding that would replace the clock accessor");
            return self;
        }
        self.bindings.insert(name, value);
        self
    }

    /// Top-level statements evaluated once before the function is defined
    pub fn with_preamble(mut self, program: Program) -> Self {
        self.preamble = Some(program);
        self
    }

    pub fn with_sink(mut self, sink: PrintSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

/// Compiled, callable instrumented function
pub struct Executable {
    interpreter: Interpreter,
    function: Value,
    name: String,
    line: usize,
    clock: Rc<dyn Clock>,
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executable")
            .field("name", &self.name)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

impl Executable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Invoke with the original calling convention; returns `(value, trace)`
    pub fn call(&mut self, args: &[Value], kwargs: &[(String, Value)]) -> RuntimeResult<Value> {
        self.interpreter
            .call(&self.function, args.to_vec(), kwargs.to_vec(), self.line)
    }
}

/// Compile `source` and bind the function called `name` from it
pub fn materialize(source: &str, name: &str, namespace: &Namespace) -> Result<Executable> {
    let program = parse_program(source).map_err(ProfileError::Compilation)?;

    let mut interpreter = Interpreter::new(namespace.clock(), namespace.sink.clone())
        .with_recursion_limit(namespace.recursion_limit);
    if let Some(preamble) = &namespace.preamble {
        interpreter.run(preamble).map_err(ProfileError::Setup)?;
    }
    for (key, value) in &namespace.bindings {
        interpreter.set_global(key.clone(), value.clone());
    }
    interpreter.set_global(CLOCK_BUILTIN, clock_function(namespace.clock()));
    let plain = interpreter.global(name).cloned();
    interpreter.run(&program).map_err(ProfileError::Setup)?;

    let (function, line) = match interpreter.global(name) {
        Some(Value::Function(def)) => (Value::Function(Rc::clone(def)), def.def.line),
        _ => {
            return Err(ProfileError::FunctionNotFound {
                name: name.to_string(),
                available: program
                    .functions()
                    .map(|def| def.name.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    };
    // recursive calls reach the uninstrumented definition, when there is one
    if let Some(plain @ Value::Function(_)) = plain {
        interpreter.set_global(name, plain);
    }
    debug!(function = name, bindings = namespace.bindings.len(), "materialized");

    Ok(Executable {
        interpreter,
        function,
        name: name.to_string(),
        line,
        clock: namespace.clock(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::StepClock;
    use crate::script::parser::parse_program;

    #[test]
    fn test_materialize_and_call() {
        let mut exec = materialize(
            "def f(x):\n    return x * 2, ()\n",
            "f",
            &Namespace::default(),
        )
        .unwrap();
        let result = exec.call(&[Value::Int(21)], &[]).unwrap();
        assert_eq!(result.index(&Value::Int(0)).unwrap(), Value::Int(42));
        assert_eq!(exec.name(), "f");
    }

    #[test]
    fn test_syntax_error_is_compilation_error() {
        let err = materialize("def f(:\n", "f", &Namespace::default()).unwrap_err();
        assert!(matches!(err, ProfileError::Compilation(_)));
    }

    #[test]
    fn test_missing_function() {
        let err = materialize("def g():\n    pass\n", "f", &Namespace::default()).unwrap_err();
        assert!(matches!(err, ProfileError::FunctionNotFound { .. }));
    }

    #[test]
    fn test_bindings_and_preamble_visible() {
        let preamble = parse_program("BASE = 10\ndef helper(x):\n    return x + BASE\n").unwrap();
        let ns = Namespace::default()
            .with_preamble(preamble)
            .bind("BASE", Value::Int(100));
        let mut exec = materialize("def f(x):\n    return helper(x)\n", "f", &ns).unwrap();
        assert_eq!(exec.call(&[Value::Int(1)], &[]).unwrap(), Value::Int(101));
    }

    #[test]
    fn test_clock_cannot_be_overridden() {
        let clock = Rc::new(StepClock::starting_at(5.0, 1.0));
        let preamble = parse_program("def perf_counter():\n    return -1\n").unwrap();
        let ns = Namespace::new(clock)
            .with_preamble(preamble)
            .bind(CLOCK_BUILTIN, Value::Int(0));
        assert!(ns.binding(CLOCK_BUILTIN).is_none());
        let mut exec = materialize("def f():\n    return perf_counter()\n", "f", &ns).unwrap();
        assert_eq!(exec.call(&[], &[]).unwrap(), Value::Float(5.0));
    }

    #[test]
    fn test_global_name_keeps_plain_definition() {
        let preamble = parse_program("def f(n):\n    return n\n").unwrap();
        let ns = Namespace::default().with_preamble(preamble);
        let mut exec = materialize("def f(n):\n    return f(n - 1), ()\n", "f", &ns).unwrap();
        let result = exec.call(&[Value::Int(3)], &[]).unwrap();
        assert_eq!(result.index(&Value::Int(0)).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_preamble_failure_is_reported() {
        let preamble = parse_program("x = 1 / 0\n").unwrap();
        let ns = Namespace::default().with_preamble(preamble);
        let err = materialize("def f():\n    pass\n", "f", &ns).unwrap_err();
        assert!(matches!(err, ProfileError::Setup(_)));
    }
}
