//! Builtin functions available to every script

use super::error::ErrorKind;
use super::value::{format_float, NativeFunction, Value};
use crate::clock::Clock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Name under which the clock accessor is bound
pub const CLOCK_BUILTIN: &str = "perf_counter";

/// Where `print()` output goes
#[derive(Debug, Clone, Default)]
pub enum PrintSink {
    #[default]
    Stdout,
    Stderr,
    /// Collected in memory (tests, embedding)
    Capture(Rc<RefCell<String>>),
}

impl PrintSink {
    pub fn capture() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        (PrintSink::Capture(Rc::clone(&buffer)), buffer)
    }

    pub fn emit(&self, line: &str) {
        match self {
            PrintSink::Stdout => println!("{}", line),
            PrintSink::Stderr => eprintln!("{}", line),
            PrintSink::Capture(buffer) => {
                let mut buffer = buffer.borrow_mut();
                buffer.push_str(line);
                buffer.push('\n');
            }
        }
    }
}

/// Bind every builtin, plus the clock accessor, into `globals`
pub fn install(globals: &mut HashMap<String, Value>, sink: PrintSink, clock: Rc<dyn Clock>) {
    let mut bind = |name: &str, func: Box<dyn Fn(&[Value]) -> Result<Value, ErrorKind>>| {
        globals.insert(
            name.to_string(),
            Value::Native(NativeFunction {
                name: Rc::from(name),
                func: Rc::from(func),
            }),
        );
    };

    bind("len", Box::new(|args: &[Value]| {
        let [value] = exact::<1>("len", args)?;
        Ok(Value::Int(value.len()? as i64))
    }));
    bind("range", Box::new(builtin_range));
    bind("abs", Box::new(|args: &[Value]| {
        let [value] = exact::<1>("abs", args)?;
        match value {
            Value::Int(i) => i.checked_abs().map(Value::Int).ok_or(ErrorKind::Overflow),
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(ErrorKind::Type(format!(
                "bad operand type for abs(): '{}'",
                other.type_name()
            ))),
        }
    }));
    bind("min", Box::new(|args: &[Value]| extremum("min", args, std::cmp::Ordering::Less)));
    bind("max", Box::new(|args: &[Value]| extremum("max", args, std::cmp::Ordering::Greater)));
    bind("print", Box::new(move |args: &[Value]| {
        let parts: Vec<String> = args.iter().map(Value::to_string).collect();
        sink.emit(&parts.join(" "));
        Ok(Value::None)
    }));
    bind("str", Box::new(|args: &[Value]| match args {
        [] => Ok(Value::str("")),
        [value] => Ok(Value::str(&value.to_string())),
        _ => Err(arity("str", "takes at most 1 argument", args.len())),
    }));
    bind("int", Box::new(builtin_int));
    bind("float", Box::new(builtin_float));
    bind("append", Box::new(|args: &[Value]| {
        let [target, item] = exact::<2>("append", args)?;
        list_append(target, item.clone())
    }));
    globals.insert(CLOCK_BUILTIN.to_string(), clock_function(clock));
}

/// The `perf_counter()` accessor reading `clock`, in seconds
pub fn clock_function(clock: Rc<dyn Clock>) -> Value {
    Value::Native(NativeFunction::new(CLOCK_BUILTIN, move |args: &[Value]| {
        exact::<0>(CLOCK_BUILTIN, args)?;
        Ok(Value::Float(clock.now()))
    }))
}

/// `list.method(args)` dispatch
pub fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    match (receiver, method) {
        (Value::List(_), "append") => {
            let [item] = exact::<1>("append", args)?;
            list_append(receiver, item.clone())
        }
        (Value::List(items), "pop") => {
            let mut items = items.borrow_mut();
            let len = items.len();
            if len == 0 {
                return Err(ErrorKind::Value("pop from empty list".to_string()));
            }
            let raw = match args {
                [] => -1,
                [index] => index.as_int().ok_or_else(|| {
                    ErrorKind::Type(format!(
                        "'{}' object cannot be interpreted as an integer",
                        index.type_name()
                    ))
                })?,
                _ => return Err(arity("pop", "takes at most 1 argument", args.len())),
            };
            let pos = if raw < 0 { raw + len as i64 } else { raw };
            if pos < 0 || pos >= len as i64 {
                return Err(ErrorKind::IndexOutOfRange { index: raw, len });
            }
            Ok(items.remove(pos as usize))
        }
        _ => Err(ErrorKind::NoSuchMethod {
            type_name: receiver.type_name(),
            method: method.to_string(),
        }),
    }
}

fn list_append(target: &Value, item: Value) -> Result<Value, ErrorKind> {
    match target {
        Value::List(items) => {
            items.borrow_mut().push(item);
            Ok(Value::None)
        }
        other => Err(ErrorKind::Type(format!(
            "append() expects a list, not '{}'",
            other.type_name()
        ))),
    }
}

fn arity(function: &str, message: &str, given: usize) -> ErrorKind {
    ErrorKind::Arity {
        function: function.to_string(),
        message: format!("{} ({} given)", message, given),
    }
}

fn exact<'a, const N: usize>(function: &str, args: &'a [Value]) -> Result<&'a [Value; N], ErrorKind> {
    args.try_into().map_err(|_| {
        let plural = if N == 1 { "" } else { "s" };
        arity(
            function,
            &format!("takes exactly {} argument{}", N, plural),
            args.len(),
        )
    })
}

fn int_arg(function: &str, value: &Value) -> Result<i64, ErrorKind> {
    value.as_int().ok_or_else(|| {
        ErrorKind::Type(format!(
            "{}() expects integer arguments, not '{}'",
            function,
            value.type_name()
        ))
    })
}

fn builtin_range(args: &[Value]) -> Result<Value, ErrorKind> {
    let (start, stop, step) = match args {
        [stop] => (0, int_arg("range", stop)?, 1),
        [start, stop] => (int_arg("range", start)?, int_arg("range", stop)?, 1),
        [start, stop, step] => (
            int_arg("range", start)?,
            int_arg("range", stop)?,
            int_arg("range", step)?,
        ),
        _ => return Err(arity("range", "expects 1 to 3 arguments", args.len())),
    };
    if step == 0 {
        return Err(ErrorKind::Value("range() arg 3 must not be zero".to_string()));
    }
    Ok(Value::Range { start, stop, step })
}

fn extremum(name: &str, args: &[Value], wanted: std::cmp::Ordering) -> Result<Value, ErrorKind> {
    let candidates: Vec<Value> = match args {
        [] => return Err(arity(name, "expected at least 1 argument", 0)),
        [iterable] => iterable.iterate()?.collect(),
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = Some(match best {
            None => candidate,
            Some(current) => {
                let ordering = candidate.try_cmp(&current).ok_or_else(|| {
                    ErrorKind::Type(format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        if wanted == std::cmp::Ordering::Less { "<" } else { ">" },
                        candidate.type_name(),
                        current.type_name()
                    ))
                })?;
                if ordering == wanted {
                    candidate
                } else {
                    current
                }
            }
        });
    }
    best.ok_or_else(|| ErrorKind::Value(format!("{}() arg is an empty sequence", name)))
}

fn builtin_int(args: &[Value]) -> Result<Value, ErrorKind> {
    let [value] = exact::<1>("int", args)?;
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if !f.is_finite() || f.abs() >= 9.2e18 {
                return Err(ErrorKind::Value(format!(
                    "cannot convert float {} to integer",
                    format_float(*f)
                )));
            }
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            ErrorKind::Value(format!("invalid literal for int(): '{}'", s))
        }),
        other => Err(ErrorKind::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value, ErrorKind> {
    let [value] = exact::<1>("float", args)?;
    if let Some(f) = value.as_f64() {
        return Ok(Value::Float(f));
    }
    match value {
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" => Some(f64::NAN),
                other => other.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                ErrorKind::Value(format!("could not convert string to float: '{}'", s))
            })
        }
        other => Err(ErrorKind::Type(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}
