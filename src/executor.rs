//! Multi-run executor: calls the instrumented function N times
//!
//! Runs are strictly sequential. Any state the function mutates (lists bound
//! in the namespace, for instance) carries over from one run to the next.

use crate::materialize::Executable;
use crate::profiler::{ProfileError, Result};
use crate::script::Value;
use tracing::{debug, trace};

/// One observation from a run: the span-max recorded at an instrumentation point
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub ordinal: usize,
    pub text: String,
    /// Seconds, as reported by the namespace clock
    pub span: f64,
}

/// Observations of one run, ordered by ordinal; points the run never reached
/// are absent
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trace {
    pub entries: Vec<TraceEntry>,
}

impl Trace {
    /// Decode the tuple of `(ordinal, text, timestamp, span_max)` trackers
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Tuple(items) = value else {
            return Err(malformed(format!(
                "expected a tuple of trackers, got {}",
                value.type_name()
            )));
        };
        let mut entries = Vec::with_capacity(items.len());
        for item in items.iter() {
            let Value::Tuple(fields) = item else {
                return Err(malformed(format!("tracker is a {}", item.type_name())));
            };
            let [ordinal, text, timestamp, span] = &fields[..] else {
                return Err(malformed(format!(
                    "tracker has {} fields instead of 4",
                    fields.len()
                )));
            };
            // never visited during this run; branch headers carry a constant 0
            if timestamp.is_none() {
                continue;
            }
            let ordinal = match ordinal {
                Value::Int(i) if *i >= 0 => *i as usize,
                other => return Err(malformed(format!("bad tracker ordinal {}", other.repr()))),
            };
            let Value::Str(text) = text else {
                return Err(malformed(format!("bad tracker text {}", text.repr())));
            };
            let span = span
                .as_f64()
                .ok_or_else(|| malformed(format!("bad span value {}", span.repr())))?;
            entries.push(TraceEntry {
                ordinal,
                text: text.to_string(),
                span,
            });
        }
        entries.sort_by_key(|e| e.ordinal);
        entries.dedup_by_key(|e| e.ordinal);
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn malformed(message: String) -> ProfileError {
    ProfileError::MalformedTrace(message)
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub trace: Trace,
    /// Wall-clock duration of the whole call, in milliseconds
    pub total_ms: f64,
    /// The function's own return value
    pub value: Value,
}

/// Call `executable` `iterations` times with identical arguments
pub fn run(
    executable: &mut Executable,
    args: &[Value],
    kwargs: &[(String, Value)],
    iterations: usize,
) -> Result<Vec<RunRecord>> {
    if iterations == 0 {
        return Err(ProfileError::InvalidIterations);
    }
    let mut records = Vec::with_capacity(iterations);
    for run in 0..iterations {
        let start = executable.clock().now();
        let returned = executable
            .call(args, kwargs)
            .map_err(|source| ProfileError::Execution { run, source })?;
        let end = executable.clock().now();
        let total_ms = (end - start) * 1000.0;

        let (value, trace) = split_return(&returned)?;
        trace!(run, points = trace.len(), total_ms, "run finished");
        records.push(RunRecord {
            trace,
            total_ms,
            value,
        });
    }
    debug!(
        function = executable.name(),
        iterations,
        "completed all runs"
    );
    Ok(records)
}

fn split_return(returned: &Value) -> Result<(Value, Trace)> {
    match returned {
        Value::Tuple(pair) if pair.len() == 2 => {
            Ok((pair[0].clone(), Trace::from_value(&pair[1])?))
        }
        other => Err(malformed(format!(
            "instrumented function returned {} instead of (value, trace)",
            other.repr()
        ))),
    }
}
