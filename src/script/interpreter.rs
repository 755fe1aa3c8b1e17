//! Tree-walking evaluator for pulse scripts

use super::ast::{Expr, ExprKind, FunctionDef, Program, Stmt, StmtKind, Target};
use super::builtins::{self, call_method, PrintSink};
use super::error::{ErrorKind, RuntimeError, RuntimeResult};
use super::value::{ScriptFunction, Value};
use crate::clock::Clock;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

/// Default maximum call depth
///
/// Every script call nests several native frames, so the depth a thread can
/// afford depends on its stack. This default fits a 2 MiB thread.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Highest configurable call depth; callers raising the limit this far must
/// run the interpreter on a thread with a correspondingly larger stack
pub const MAX_RECURSION_LIMIT: usize = 1000;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Local variables of one function activation; `None` means module scope
struct Frame {
    locals: Option<HashMap<String, Value>>,
}

impl Frame {
    fn module() -> Self {
        Self { locals: None }
    }

    fn function() -> Self {
        Self {
            locals: Some(HashMap::new()),
        }
    }
}

/// Script interpreter holding the global namespace
pub struct Interpreter {
    globals: HashMap<String, Value>,
    depth: usize,
    recursion_limit: usize,
}

impl Interpreter {
    /// Interpreter with builtins and the clock accessor installed
    pub fn new(clock: Rc<dyn Clock>, sink: PrintSink) -> Self {
        let mut globals = HashMap::new();
        builtins::install(&mut globals, sink, clock);
        Self {
            globals,
            depth: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit.clamp(1, MAX_RECURSION_LIMIT);
        self
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Execute top-level statements in module scope
    pub fn run(&mut self, program: &Program) -> RuntimeResult<()> {
        let mut frame = Frame::module();
        match self.exec_block(&program.body, &mut frame)? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(self.stray(&program.body, "return")),
            Flow::Break => Err(self.stray(&program.body, "break")),
            Flow::Continue => Err(self.stray(&program.body, "continue")),
        }
    }

    fn stray(&self, body: &[Stmt], what: &'static str) -> RuntimeError {
        let line = body.last().map(|s| s.line).unwrap_or(1);
        RuntimeError::new(line, ErrorKind::OutsideLoop(what))
    }

    /// Evaluate a standalone expression in module scope
    pub fn eval(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        let mut frame = Frame::module();
        self.eval_expr(expr, &mut frame)
    }

    /// Call any callable value
    pub fn call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        line: usize,
    ) -> RuntimeResult<Value> {
        match callee {
            Value::Native(native) => {
                if !kwargs.is_empty() {
                    return Err(RuntimeError::new(
                        line,
                        ErrorKind::Arity {
                            function: native.name.to_string(),
                            message: "takes no keyword arguments".to_string(),
                        },
                    ));
                }
                (native.func)(&args).map_err(|kind| RuntimeError::new(line, kind))
            }
            Value::Function(function) => {
                let function = Rc::clone(function);
                self.call_function(&function, args, kwargs, line)
            }
            other => Err(RuntimeError::new(
                line,
                ErrorKind::NotCallable(other.type_name()),
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &ScriptFunction,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        line: usize,
    ) -> RuntimeResult<Value> {
        let def = &function.def;
        let mut frame = Frame::function();
        let locals = bind_arguments(function, args, kwargs)
            .map_err(|kind| RuntimeError::new(line, kind))?;
        frame.locals = Some(locals);

        if self.depth >= self.recursion_limit {
            return Err(RuntimeError::new(
                line,
                ErrorKind::RecursionLimit(self.recursion_limit),
            ));
        }
        self.depth += 1;
        trace!(function = %def.name, depth = self.depth, "call");
        let outcome = self.exec_block(&def.body, &mut frame);
        self.depth -= 1;

        match outcome? {
            Flow::Normal => Ok(Value::None),
            Flow::Return(value) => Ok(value),
            Flow::Break => Err(self.stray(&def.body, "break")),
            Flow::Continue => Err(self.stray(&def.body, "continue")),
        }
    }

    fn exec_block(&mut self, body: &[Stmt], frame: &mut Frame) -> RuntimeResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt, frame)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> RuntimeResult<Flow> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, frame)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval_expr(value, frame)?;
                self.assign(target, value, frame, line)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = match target {
                    Target::Name(name) => self.lookup(name, frame, line)?,
                    Target::Index { target, index } => {
                        let container = self.eval_expr(target, frame)?;
                        let index = self.eval_expr(index, frame)?;
                        container
                            .index(&index)
                            .map_err(|kind| RuntimeError::new(line, kind))?
                    }
                };
                let rhs = self.eval_expr(value, frame)?;
                let updated = Value::binary(*op, &current, &rhs)
                    .map_err(|kind| RuntimeError::new(line, kind))?;
                self.assign(target, updated, frame, line)?;
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval_expr(cond, frame)?.truthy() {
                        return self.exec_block(body, frame);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body, frame);
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond, frame)?.truthy() {
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::For { var, iter, body } => {
                let iterable = self.eval_expr(iter, frame)?;
                let items = iterable
                    .iterate()
                    .map_err(|kind| RuntimeError::new(line, kind))?;
                for item in items {
                    self.store(var, item, frame);
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::Raise(expr) => {
                let value = self.eval_expr(expr, frame)?;
                return Err(RuntimeError::new(line, ErrorKind::Raised(value.to_string())));
            }
            StmtKind::Def(def) => {
                let function = self.define(def, frame)?;
                self.store(&def.name, function, frame);
            }
        }
        Ok(Flow::Normal)
    }

    fn define(&mut self, def: &Rc<FunctionDef>, frame: &mut Frame) -> RuntimeResult<Value> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval_expr(expr, frame)?),
                None => None,
            });
        }
        Ok(Value::Function(Rc::new(ScriptFunction {
            def: Rc::clone(def),
            defaults,
        })))
    }

    fn assign(
        &mut self,
        target: &Target,
        value: Value,
        frame: &mut Frame,
        line: usize,
    ) -> RuntimeResult<()> {
        match target {
            Target::Name(name) => {
                self.store(name, value, frame);
                Ok(())
            }
            Target::Index { target, index } => {
                let container = self.eval_expr(target, frame)?;
                let index = self.eval_expr(index, frame)?;
                container
                    .set_index(&index, value)
                    .map_err(|kind| RuntimeError::new(line, kind))
            }
        }
    }

    fn store(&mut self, name: &str, value: Value, frame: &mut Frame) {
        match &mut frame.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    fn lookup(&self, name: &str, frame: &Frame, line: usize) -> RuntimeResult<Value> {
        if let Some(value) = frame.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Ok(value.clone());
        }
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::new(line, ErrorKind::UndefinedName(name.to_string())))
    }

    fn eval_expr(&mut self, expr: &Expr, frame: &mut Frame) -> RuntimeResult<Value> {
        let line = expr.line;
        let at = |kind: ErrorKind| RuntimeError::new(line, kind);
        Ok(match &expr.kind {
            ExprKind::None => Value::None,
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Int(i) => Value::Int(*i),
            ExprKind::Float(f) => Value::Float(*f),
            ExprKind::Str(s) => Value::str(s),
            ExprKind::Name(name) => self.lookup(name, frame, line)?,
            ExprKind::Tuple(items) => Value::tuple(self.eval_all(items, frame)?),
            ExprKind::List(items) => Value::list(self.eval_all(items, frame)?),
            ExprKind::Unary(op, operand) => {
                let operand = self.eval_expr(operand, frame)?;
                Value::unary(*op, &operand).map_err(at)?
            }
            ExprKind::Binary(op, left, right) => {
                let left = self.eval_expr(left, frame)?;
                let right = self.eval_expr(right, frame)?;
                Value::binary(*op, &left, &right).map_err(at)?
            }
            ExprKind::Compare { left, rest } => {
                let mut current = self.eval_expr(left, frame)?;
                for (op, operand) in rest {
                    let next = self.eval_expr(operand, frame)?;
                    if !Value::compare(*op, &current, &next).map_err(at)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Value::Bool(true)
            }
            ExprKind::And(left, right) => {
                let left = self.eval_expr(left, frame)?;
                if !left.truthy() {
                    left
                } else {
                    self.eval_expr(right, frame)?
                }
            }
            ExprKind::Or(left, right) => {
                let left = self.eval_expr(left, frame)?;
                if left.truthy() {
                    left
                } else {
                    self.eval_expr(right, frame)?
                }
            }
            ExprKind::Not(operand) => Value::Bool(!self.eval_expr(operand, frame)?.truthy()),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_expr(cond, frame)?.truthy() {
                    self.eval_expr(then, frame)?
                } else {
                    self.eval_expr(otherwise, frame)?
                }
            }
            ExprKind::Call { func, args, kwargs } => {
                let callee = self.eval_expr(func, frame)?;
                let args = self.eval_all(args, frame)?;
                let mut evaluated = Vec::with_capacity(kwargs.len());
                for (name, value) in kwargs {
                    evaluated.push((name.clone(), self.eval_expr(value, frame)?));
                }
                self.call(&callee, args, evaluated, line)?
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval_expr(receiver, frame)?;
                let args = self.eval_all(args, frame)?;
                call_method(&receiver, method, &args).map_err(at)?
            }
            ExprKind::Index { target, index } => {
                let target = self.eval_expr(target, frame)?;
                let index = self.eval_expr(index, frame)?;
                target.index(&index).map_err(at)?
            }
        })
    }

    fn eval_all(&mut self, exprs: &[Expr], frame: &mut Frame) -> RuntimeResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval_expr(e, frame)).collect()
    }
}

fn bind_arguments(
    function: &ScriptFunction,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<HashMap<String, Value>, ErrorKind> {
    let def = &function.def;
    let arity_error = |message: String| ErrorKind::Arity {
        function: def.name.clone(),
        message,
    };
    if args.len() > def.params.len() {
        return Err(arity_error(format!(
            "takes {} positional arguments but {} were given",
            def.params.len(),
            args.len()
        )));
    }

    let mut slots: Vec<Option<Value>> = vec![None; def.params.len()];
    for (slot, value) in slots.iter_mut().zip(args) {
        *slot = Some(value);
    }
    for (name, value) in kwargs {
        let position = def
            .params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| arity_error(format!("got an unexpected keyword argument '{}'", name)))?;
        if slots[position].is_some() {
            return Err(arity_error(format!(
                "got multiple values for argument '{}'",
                name
            )));
        }
        slots[position] = Some(value);
    }

    let mut locals = HashMap::with_capacity(def.params.len());
    for ((param, slot), default) in def.params.iter().zip(slots).zip(&function.defaults) {
        let value = match (slot, default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(arity_error(format!(
                    "missing required argument: '{}'",
                    param.name
                )))
            }
        };
        locals.insert(param.name.clone(), value);
    }
    Ok(locals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::StepClock;
    use crate::script::parser::{parse_expression, parse_program};

    fn interpreter() -> (Interpreter, Rc<std::cell::RefCell<String>>) {
        let (sink, buffer) = PrintSink::capture();
        (Interpreter::new(Rc::new(StepClock::new(1.0)), sink), buffer)
    }

    fn run(source: &str) -> Interpreter {
        let (mut interp, _) = interpreter();
        interp.run(&parse_program(source).unwrap()).unwrap();
        interp
    }

    fn call(interp: &mut Interpreter, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let func = interp.global(name).cloned().unwrap();
        interp.call(&func, args, Vec::new(), 0)
    }

    #[test]
    fn test_loop_accumulates() {
        let mut interp = run("def f(n):\n    m = 1\n    for i in range(n):\n        m = m + i\n    return m\n");
        assert_eq!(call(&mut interp, "f", vec![Value::Int(4)]).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_while_break_continue() {
        let src = "def f():\n    i = 0\n    total = 0\n    while True:\n        i += 1\n        if i % 2 == 0:\n            continue\n        if i > 7:\n            break\n        total += i\n    return total\n";
        let mut interp = run(src);
        assert_eq!(call(&mut interp, "f", vec![]).unwrap(), Value::Int(16));
    }

    #[test]
    fn test_if_elif_else() {
        let src = "def sign(x):\n    if x < 0:\n        return -1\n    elif x == 0:\n        return 0\n    else:\n        return 1\n";
        let mut interp = run(src);
        assert_eq!(call(&mut interp, "sign", vec![Value::Int(-5)]).unwrap(), Value::Int(-1));
        assert_eq!(call(&mut interp, "sign", vec![Value::Int(0)]).unwrap(), Value::Int(0));
        assert_eq!(call(&mut interp, "sign", vec![Value::Int(5)]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_keyword_and_default_arguments() {
        let mut interp = run("def f(a, b=10):\n    return a - b\n");
        let func = interp.global("f").cloned().unwrap();
        let result = interp
            .call(&func, vec![], vec![("a".into(), Value::Int(1)), ("b".into(), Value::Int(2))], 0)
            .unwrap();
        assert_eq!(result, Value::Int(-1));
        assert_eq!(call(&mut interp, "f", vec![Value::Int(15)]).unwrap(), Value::Int(5));
        let err = call(&mut interp, "f", vec![]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Arity { .. }));
    }

    #[test]
    fn test_function_without_return_yields_none() {
        let mut interp = run("def f():\n    x = 1\n");
        assert_eq!(call(&mut interp, "f", vec![]).unwrap(), Value::None);
    }

    #[test]
    fn test_helpers_resolve_through_globals() {
        let mut interp = run("SCALE = 3\ndef helper(x):\n    return x * SCALE\ndef f(x):\n    return helper(x) + 1\n");
        assert_eq!(call(&mut interp, "f", vec![Value::Int(2)]).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_recursion_limit() {
        let (interp, _) = interpreter();
        let mut interp = interp.with_recursion_limit(50);
        interp
            .run(&parse_program("def down(n):\n    return down(n + 1)\n").unwrap())
            .unwrap();
        let err = call(&mut interp, "down", vec![Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimit(50));
    }

    #[test]
    fn test_recursion_within_limit() {
        let mut interp = run("def fact(n):\n    if n <= 1: return 1\n    return n * fact(n - 1)\n");
        assert_eq!(call(&mut interp, "fact", vec![Value::Int(10)]).unwrap(), Value::Int(3628800));
    }

    #[test]
    fn test_raise_carries_message_and_line() {
        let mut interp = run("def f():\n    x = 1\n    raise 'boom ' + str(x)\n");
        let err = call(&mut interp, "f", vec![]).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, ErrorKind::Raised("boom 1".to_string()));
    }

    #[test]
    fn test_undefined_name() {
        let mut interp = run("def f():\n    return missing\n");
        let err = call(&mut interp, "f", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedName("missing".to_string()));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_shared_list_mutation_is_visible() {
        let mut interp = run("state = [1, 2, 3]\ndef f():\n    return state.pop()\n");
        assert_eq!(call(&mut interp, "f", vec![]).unwrap(), Value::Int(3));
        assert_eq!(call(&mut interp, "f", vec![]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_print_goes_to_sink() {
        let (mut interp, buffer) = interpreter();
        interp.run(&parse_program("print('hi', 1 + 1)\n").unwrap()).unwrap();
        assert_eq!(buffer.borrow().as_str(), "hi 2\n");
    }

    #[test]
    fn test_eval_standalone_expression() {
        let (mut interp, _) = interpreter();
        let value = interp.eval(&parse_expression("[1, 2] + [3]").unwrap()).unwrap();
        assert_eq!(value.len().unwrap(), 3);
    }

    #[test]
    fn test_short_circuit() {
        let mut interp = run("def f():\n    return None or 0 or 'x'\n");
        assert_eq!(call(&mut interp, "f", vec![]).unwrap(), Value::str("x"));
        let mut interp = run("def f():\n    return 0 and missing\n");
        assert_eq!(call(&mut interp, "f", vec![]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_break_outside_loop_is_error() {
        let mut interp = run("def f():\n    break\n");
        let err = call(&mut interp, "f", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutsideLoop("break"));
    }
}
