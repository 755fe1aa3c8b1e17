//! Runtime values and the operators defined over them

use super::ast::{BinaryOp, CompareOp, FunctionDef, UnaryOp};
use super::error::ErrorKind;
use super::lexer::quote_literal;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, ErrorKind>;

/// Builtin implemented in Rust
#[derive(Clone)]
pub struct NativeFunction {
    pub name: Rc<str>,
    pub func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: &str,
        func: impl Fn(&[Value]) -> Result<Value, ErrorKind> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

/// Function defined in a script, with its defaults evaluated at definition time
#[derive(Debug)]
pub struct ScriptFunction {
    pub def: Rc<FunctionDef>,
    pub defaults: Vec<Option<Value>>,
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Range { start: i64, stop: i64, step: i64 },
    Native(NativeFunction),
    Function(Rc<ScriptFunction>),
}

enum Num {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn str(text: &str) -> Self {
        Value::Str(Rc::from(text))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::from(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Range { .. } => "range",
            Value::Native(_) => "builtin_function",
            Value::Function(_) => "function",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Range { .. } => self.range_len() > 0,
            Value::Native(_) | Value::Function(_) => true,
        }
    }

    /// Numeric view of the value, if it has one (bools count as ints)
    pub fn as_f64(&self) -> Option<f64> {
        match self.as_num()? {
            Num::Int(i) => Some(i as f64),
            Num::Float(f) => Some(f),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_num(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn range_len(&self) -> usize {
        match self {
            Value::Range { start, stop, step } => range_len(*start, *stop, *step),
            _ => 0,
        }
    }

    /// Number of elements for sized values
    pub fn len(&self) -> Result<usize, ErrorKind> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(items) => Ok(items.borrow().len()),
            Value::Tuple(items) => Ok(items.len()),
            Value::Range { .. } => Ok(self.range_len()),
            other => Err(ErrorKind::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
    }

    /// Snapshot of the items an iteration over this value would visit
    pub fn iterate(&self) -> Result<ValueIter, ErrorKind> {
        match self {
            Value::Range { start, stop, step } => Ok(ValueIter::Range {
                next: *start,
                stop: *stop,
                step: *step,
            }),
            Value::List(items) => Ok(ValueIter::Items(items.borrow().clone().into_iter())),
            Value::Tuple(items) => Ok(ValueIter::Items(items.to_vec().into_iter())),
            Value::Str(s) => Ok(ValueIter::Items(
                s.chars()
                    .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
                    .collect::<Vec<_>>()
                    .into_iter(),
            )),
            other => Err(ErrorKind::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    pub fn index(&self, index: &Value) -> Result<Value, ErrorKind> {
        let raw = index.as_int().ok_or_else(|| {
            ErrorKind::Type(format!(
                "{} indices must be integers, not {}",
                self.type_name(),
                index.type_name()
            ))
        })?;
        match self {
            Value::List(items) => {
                let items = items.borrow();
                let pos = normalize_index(raw, items.len())?;
                Ok(items[pos].clone())
            }
            Value::Tuple(items) => {
                let pos = normalize_index(raw, items.len())?;
                Ok(items[pos].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let pos = normalize_index(raw, chars.len())?;
                Ok(Value::str(chars[pos].encode_utf8(&mut [0; 4])))
            }
            Value::Range { start, step, .. } => {
                let pos = normalize_index(raw, self.range_len())?;
                Ok(Value::Int(start + step * pos as i64))
            }
            other => Err(ErrorKind::Type(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    pub fn set_index(&self, index: &Value, value: Value) -> Result<(), ErrorKind> {
        match self {
            Value::List(items) => {
                let raw = index.as_int().ok_or_else(|| {
                    ErrorKind::Type(format!(
                        "list indices must be integers, not {}",
                        index.type_name()
                    ))
                })?;
                let mut items = items.borrow_mut();
                let pos = normalize_index(raw, items.len())?;
                items[pos] = value;
                Ok(())
            }
            other => Err(ErrorKind::Type(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    /// `repr()`-style rendering: strings are quoted
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote_literal(s),
            other => other.to_string(),
        }
    }

    pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, ErrorKind> {
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
        };
        match (op, operand.as_num()) {
            (UnaryOp::Neg, Some(Num::Int(i))) => {
                i.checked_neg().map(Value::Int).ok_or(ErrorKind::Overflow)
            }
            (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
            (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
            (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
            (_, None) => Err(ErrorKind::BadUnaryOperand {
                op: symbol,
                operand: operand.type_name(),
            }),
        }
    }

    pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ErrorKind> {
        if let (Some(l), Some(r)) = (left.as_num(), right.as_num()) {
            return numeric_binary(op, l, r);
        }
        let unsupported = || ErrorKind::UnsupportedOperands {
            op: op.symbol(),
            left: left.type_name(),
            right: right.type_name(),
        };
        match (op, left, right) {
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Ok(Value::str(&joined))
            }
            (BinaryOp::Add, Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
                Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
            }
            (BinaryOp::Mul, Value::Str(s), count) | (BinaryOp::Mul, count, Value::Str(s)) => {
                let n = count.as_int().ok_or_else(unsupported)?;
                let len = repeated_len(s.len(), n)?;
                if len == 0 {
                    return Ok(Value::str(""));
                }
                Ok(Value::str(&s.repeat(len / s.len())))
            }
            (BinaryOp::Mul, Value::List(items), count)
            | (BinaryOp::Mul, count, Value::List(items)) => {
                let n = count.as_int().ok_or_else(unsupported)?;
                let items = items.borrow();
                let len = repeated_len(items.len(), n)?;
                let mut repeated = Vec::with_capacity(len);
                while repeated.len() < len {
                    repeated.extend(items.iter().cloned());
                }
                Ok(Value::list(repeated))
            }
            _ => Err(unsupported()),
        }
    }

    /// Evaluate one link of a (possibly chained) comparison
    pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ErrorKind> {
        match op {
            CompareOp::Eq => Ok(left == right),
            CompareOp::NotEq => Ok(left != right),
            CompareOp::Is => Ok(identical(left, right)),
            CompareOp::IsNot => Ok(!identical(left, right)),
            CompareOp::In => right.contains(left),
            CompareOp::NotIn => right.contains(left).map(|found| !found),
            CompareOp::Lt | CompareOp::LtE | CompareOp::Gt | CompareOp::GtE => {
                let ordering = left.try_cmp(right).ok_or_else(|| {
                    let symbol = match op {
                        CompareOp::Lt => "<",
                        CompareOp::LtE => "<=",
                        CompareOp::Gt => ">",
                        _ => ">=",
                    };
                    ErrorKind::Type(format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        symbol,
                        left.type_name(),
                        right.type_name()
                    ))
                })?;
                Ok(match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::LtE => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                })
            }
        }
    }

    /// Ordering used by `<` and friends, `min` and `max`
    pub fn try_cmp(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            if let (Some(x), Some(y)) = (self.as_int(), other.as_int()) {
                return Some(x.cmp(&y));
            }
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => sequence_cmp(&a.borrow(), &b.borrow()),
            (Value::Tuple(a), Value::Tuple(b)) => sequence_cmp(a, b),
            _ => None,
        }
    }

    fn contains(&self, needle: &Value) -> Result<bool, ErrorKind> {
        match self {
            Value::List(items) => Ok(items.borrow().iter().any(|item| item == needle)),
            Value::Tuple(items) => Ok(items.iter().any(|item| item == needle)),
            Value::Str(haystack) => match needle {
                Value::Str(n) => Ok(haystack.contains(&**n)),
                other => Err(ErrorKind::Type(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            Value::Range { start, stop, step } => Ok(match needle.as_int() {
                Some(n) if *step > 0 => n >= *start && n < *stop && (n - start) % step == 0,
                Some(n) => n <= *start && n > *stop && (start - n) % step.abs() == 0,
                None => false,
            }),
            other => Err(ErrorKind::Type(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                (Num::Int(x), Num::Float(y)) | (Num::Float(y), Num::Int(x)) => x as f64 == y,
                (Num::Float(x), Num::Float(y)) => x == y,
            };
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Range { .. }, Value::Range { .. }) => {
                let (a, b) = (self.iterate(), other.iterate());
                match (a, b) {
                    (Ok(a), Ok(b)) => a.eq(b),
                    _ => false,
                }
            }
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let items = items.borrow();
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                if parts.len() == 1 {
                    write!(f, "({},)", parts[0])
                } else {
                    write!(f, "({})", parts.join(", "))
                }
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    write!(f, "range({}, {})", start, stop)
                } else {
                    write!(f, "range({}, {}, {})", start, stop, step)
                }
            }
            Value::Native(native) => write!(f, "{:?}", native),
            Value::Function(func) => write!(f, "<function {}>", func.def.name),
        }
    }
}

/// Lazily produced elements of an iterable value
pub enum ValueIter {
    Range { next: i64, stop: i64, step: i64 },
    Items(std::vec::IntoIter<Value>),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return None;
                }
                let current = *next;
                *next = next.saturating_add(*step);
                if *next == current {
                    *next = *stop;
                }
                Some(Value::Int(current))
            }
            ValueIter::Items(items) => items.next(),
        }
    }
}

/// Longest string (in bytes) or list a repetition may build
pub const MAX_REPEAT_LEN: usize = 1 << 24;

/// Length of `count` copies of a `unit`-long sequence; negative counts give 0
fn repeated_len(unit: usize, count: i64) -> Result<usize, ErrorKind> {
    if unit == 0 || count <= 0 {
        return Ok(0);
    }
    usize::try_from(count)
        .ok()
        .and_then(|count| unit.checked_mul(count))
        .filter(|&len| len <= MAX_REPEAT_LEN)
        .ok_or(ErrorKind::TooLarge(MAX_REPEAT_LEN))
}

pub fn range_len(start: i64, stop: i64, step: i64) -> usize {
    if step > 0 && start < stop {
        ((stop as i128 - start as i128 + step as i128 - 1) / step as i128) as usize
    } else if step < 0 && start > stop {
        ((start as i128 - stop as i128 - step as i128 - 1) / -(step as i128)) as usize
    } else {
        0
    }
}

fn normalize_index(raw: i64, len: usize) -> Result<usize, ErrorKind> {
    let adjusted = if raw < 0 { raw + len as i64 } else { raw };
    if adjusted < 0 || adjusted >= len as i64 {
        return Err(ErrorKind::IndexOutOfRange { index: raw, len });
    }
    Ok(adjusted as usize)
}

fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::None, _) | (_, Value::None) => false,
        (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
        _ => left == right,
    }
}

fn sequence_cmp(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        if x != y {
            return x.try_cmp(y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

fn numeric_binary(op: BinaryOp, left: Num, right: Num) -> Result<Value, ErrorKind> {
    match (left, right) {
        (Num::Int(a), Num::Int(b)) => int_binary(op, a, b),
        (a, b) => {
            let (x, y) = (to_f64(a), to_f64(b));
            float_binary(op, x, y)
        }
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value, ErrorKind> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(ErrorKind::ZeroDivision);
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ErrorKind::ZeroDivision);
            }
            a.checked_div_euclid(b).map(|q| {
                // euclidean division rounds toward -inf only for positive divisors
                if b < 0 && a.rem_euclid(b) != 0 {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ErrorKind::ZeroDivision);
            }
            a.checked_rem(b)
                .map(|r| if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
        BinaryOp::Pow => {
            if b < 0 {
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b).ok().and_then(|e| a.checked_pow(e))
        }
    };
    result.map(Value::Int).ok_or(ErrorKind::Overflow)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<Value, ErrorKind> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ErrorKind::ZeroDivision);
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(ErrorKind::ZeroDivision);
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(ErrorKind::ZeroDivision);
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => a.powf(b),
    };
    Ok(Value::Float(result))
}

/// Shortest round-trip float text, always showing a fractional part or exponent
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{:e}", x);
        return match text.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => text,
        };
    }
    let text = format!("{}", x);
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_floor_semantics() {
        assert_eq!(
            Value::binary(BinaryOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(
            Value::binary(BinaryOp::FloorDiv, &Value::Int(7), &Value::Int(-2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(
            Value::binary(BinaryOp::Mod, &Value::Int(-7), &Value::Int(3)).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            Value::binary(BinaryOp::Mod, &Value::Int(7), &Value::Int(-3)).unwrap(),
            Value::Int(-2)
        );
    }

    #[test]
    fn test_true_division_yields_float() {
        assert_eq!(
            Value::binary(BinaryOp::Div, &Value::Int(3), &Value::Int(2)).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_zero_division() {
        assert_eq!(
            Value::binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(ErrorKind::ZeroDivision)
        );
        assert_eq!(
            Value::binary(BinaryOp::Mod, &Value::Float(1.0), &Value::Int(0)),
            Err(ErrorKind::ZeroDivision)
        );
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)),
            Err(ErrorKind::Overflow)
        );
    }

    #[test]
    fn test_mixed_equality_and_ordering() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_eq!(
            Value::Int(2).try_cmp(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert!(Value::str("a").try_cmp(&Value::Int(1)).is_none());
    }

    #[test]
    fn test_is_distinguishes_none() {
        assert!(Value::compare(CompareOp::Is, &Value::None, &Value::None).unwrap());
        assert!(!Value::compare(CompareOp::Is, &Value::Float(0.0), &Value::None).unwrap());
        assert!(Value::compare(CompareOp::IsNot, &Value::Float(0.0), &Value::None).unwrap());
    }

    #[test]
    fn test_concatenation_and_repetition() {
        assert_eq!(
            Value::binary(BinaryOp::Add, &Value::str("ab"), &Value::str("cd")).unwrap(),
            Value::str("abcd")
        );
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::list(vec![Value::Int(0)]), &Value::Int(3))
                .unwrap()
                .len()
                .unwrap(),
            3
        );
        assert!(Value::binary(BinaryOp::Add, &Value::str("a"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_oversized_repetition_is_error() {
        let pair = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            Value::binary(BinaryOp::Mul, &pair, &Value::Int(i64::MAX)),
            Err(ErrorKind::TooLarge(MAX_REPEAT_LEN))
        );
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::Int(i64::MAX), &Value::str("ab")),
            Err(ErrorKind::TooLarge(MAX_REPEAT_LEN))
        );
        let empty = Value::binary(BinaryOp::Mul, &Value::list(Vec::new()), &Value::Int(i64::MAX));
        assert_eq!(empty.unwrap().len().unwrap(), 0);
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::str("ab"), &Value::Int(-4)).unwrap(),
            Value::str("")
        );
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::str("ab"), &Value::Int(3)).unwrap(),
            Value::str("ababab")
        );
    }

    #[test]
    fn test_indexing_with_negative_offsets() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.index(&Value::Int(-1)).unwrap(), Value::Int(3));
        assert!(matches!(
            list.index(&Value::Int(3)),
            Err(ErrorKind::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_lists_share_mutations() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        alias.set_index(&Value::Int(0), Value::Int(9)).unwrap();
        assert_eq!(list.index(&Value::Int(0)).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_range_iteration_and_membership() {
        let range = Value::Range {
            start: 10,
            stop: 0,
            step: -3,
        };
        let items: Vec<Value> = range.iterate().unwrap().collect();
        assert_eq!(
            items,
            vec![Value::Int(10), Value::Int(7), Value::Int(4), Value::Int(1)]
        );
        assert_eq!(range.len().unwrap(), 4);
        assert!(Value::compare(CompareOp::In, &Value::Int(7), &range).unwrap());
        assert!(!Value::compare(CompareOp::In, &Value::Int(8), &range).unwrap());
    }

    #[test]
    fn test_display_matches_script_conventions() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(Value::Float(1e20).to_string(), "1e+20");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(
            Value::list(vec![Value::str("a"), Value::None]).to_string(),
            "['a', None]"
        );
    }
}
