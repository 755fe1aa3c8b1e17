//! Line-level profiler: the tracker that ties the pipeline together
//!
//! ```text
//! FunctionSource → Preprocessor → Instrumenter → Materializer
//!                                                     ↓
//!                  AggregatedReport ← Aggregator ← Executor (N runs)
//! ```
//!
//! A [`Tracker`] is built once per function. Construction extracts, cleans,
//! rewrites and compiles the source; every [`Tracker::call`] runs the
//! function N times and replaces the previous report.
//!
//! # Example
//!
//! ```
//! use codpulse::config::ProfilerConfig;
//! use codpulse::profiler::Tracker;
//! use codpulse::script::{Script, Value};
//!
//! let script = Script::from_source(
//!     "def work(n):\n    total = 0\n    for i in range(n):\n        total = total + i\n    return total\n",
//! )
//! .unwrap();
//! let mut tracker = Tracker::for_script(&script, "work", &ProfilerConfig::default()).unwrap();
//! let report = tracker.call(&[Value::Int(10)], &[]).unwrap();
//! assert_eq!(report.iterations, 3);
//! assert_eq!(report.rows().len(), 4);
//! ```

use crate::aggregate::{aggregate, AggregatedReport, ReportRow};
use crate::config::ProfilerConfig;
use crate::executor::{self, RunRecord};
use crate::instrument::{instrument, Instrumented};
use crate::materialize::{materialize, Executable, Namespace};
use crate::preprocess::{CleanedLines, Preprocessor};
use crate::script::{CompileError, RuntimeError, Script, ScriptError, Value};
use crate::source::FunctionSource;
use crate::stats::{self, StatsError};
use thiserror::Error;
use tracing::{debug, info};

/// Degrees of freedom for the deviation of total run durations
pub const TOTAL_DDOF: usize = 0;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("instrumented source does not compile")]
    Compilation(#[source] CompileError),

    #[error("script setup failed")]
    Setup(#[source] RuntimeError),

    #[error("profiled function raised during run {run}")]
    Execution {
        run: usize,
        #[source]
        source: RuntimeError,
    },

    #[error("no run recorded any text for line ordinal {ordinal}")]
    Resolution { ordinal: usize },

    #[error(transparent)]
    InsufficientData(#[from] StatsError),

    #[error("malformed trace: {0}")]
    MalformedTrace(String),

    #[error("function '{name}' not found (available: {available})")]
    FunctionNotFound { name: String, available: String },

    #[error("iteration count must be at least 1")]
    InvalidIterations,

    #[error("invalid pass-through pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(transparent)]
    Load(ScriptError),
}

pub type Result<T> = std::result::Result<T, ProfileError>;

impl From<ScriptError> for ProfileError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::Compile(e) => ProfileError::Compilation(e),
            ScriptError::Runtime(e) => ProfileError::Setup(e),
            ScriptError::FunctionNotFound { name, available } => {
                ProfileError::FunctionNotFound { name, available }
            }
            io @ ScriptError::Io { .. } => ProfileError::Load(io),
        }
    }
}

/// Outcome of one tracker invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    /// Declared name of the profiled function
    pub function: String,
    pub iterations: usize,
    /// Wall-clock duration of every run, in milliseconds
    pub totals_ms: Vec<f64>,
    pub aggregated: AggregatedReport,
    /// Return value of the last run
    pub returned: Value,
}

impl ProfileReport {
    pub fn rows(&self) -> &[ReportRow] {
        &self.aggregated.rows
    }

    pub fn total_mean_ms(&self) -> Result<f64> {
        Ok(stats::mean(&self.totals_ms)?)
    }

    /// Population deviation of the run durations
    pub fn total_std_ms(&self) -> Result<f64> {
        Ok(stats::stddev(&self.totals_ms, TOTAL_DDOF)?)
    }
}

/// Profiles one function across repeated invocations
pub struct Tracker {
    source: FunctionSource,
    cleaned: CleanedLines,
    instrumented: Instrumented,
    executable: Executable,
    iterations: usize,
    last_report: Option<ProfileReport>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("function", &self.source.name())
            .field("iterations", &self.iterations)
            .field("points", &self.instrumented.point_count())
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Track `function` from `script`; the rest of the script (helpers,
    /// module-level names) is visible to it at run time
    pub fn for_script(script: &Script, function: &str, config: &ProfilerConfig) -> Result<Self> {
        let namespace = config
            .namespace()
            .with_preamble(script.program().clone());
        Self::with_namespace(script, function, namespace, config)
    }

    /// Like [`Tracker::for_script`] with a caller-supplied namespace; the
    /// script is not run as a preamble unless the namespace already has one
    pub fn with_namespace(
        script: &Script,
        function: &str,
        namespace: Namespace,
        config: &ProfilerConfig,
    ) -> Result<Self> {
        let source = script.function_source(function)?;
        Self::new(source, namespace, config)
    }

    pub fn new(source: FunctionSource, namespace: Namespace, config: &ProfilerConfig) -> Result<Self> {
        if config.iterations == 0 {
            return Err(ProfileError::InvalidIterations);
        }
        let preprocessor = Preprocessor::new(config.passthrough.as_slice())?;
        let cleaned = preprocessor.process(&source);
        let instrumented = instrument(&cleaned);
        let executable = materialize(&instrumented.source, source.name(), &namespace)?;
        info!(
            function = source.name(),
            lines = cleaned.lines.len(),
            points = instrumented.point_count(),
            iterations = config.iterations,
            "tracker ready"
        );
        Ok(Self {
            source,
            cleaned,
            instrumented,
            executable,
            iterations: config.iterations,
            last_report: None,
        })
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: usize) -> Result<()> {
        if iterations == 0 {
            return Err(ProfileError::InvalidIterations);
        }
        self.iterations = iterations;
        Ok(())
    }

    pub fn source(&self) -> &FunctionSource {
        &self.source
    }

    pub fn cleaned_lines(&self) -> &CleanedLines {
        &self.cleaned
    }

    /// The rewritten function text that is actually executed
    pub fn instrumented_source(&self) -> &str {
        &self.instrumented.source
    }

    /// Report of the most recent successful call
    pub fn report(&self) -> Option<&ProfileReport> {
        self.last_report.as_ref()
    }

    /// Run the function N times with the same arguments and aggregate
    ///
    /// On failure no report is kept, not even the previous one.
    pub fn call(&mut self, args: &[Value], kwargs: &[(String, Value)]) -> Result<&ProfileReport> {
        self.last_report = None;
        let records = executor::run(&mut self.executable, args, kwargs, self.iterations)?;
        let report = self.build_report(records)?;
        debug!(
            function = %report.function,
            rows = report.rows().len(),
            "profiling call complete"
        );
        Ok(self.last_report.insert(report))
    }

    fn build_report(&self, records: Vec<RunRecord>) -> Result<ProfileReport> {
        let mut traces = Vec::with_capacity(records.len());
        let mut totals_ms = Vec::with_capacity(records.len());
        let mut returned = Value::None;
        for record in records {
            traces.push(record.trace);
            totals_ms.push(record.total_ms);
            returned = record.value;
        }
        Ok(ProfileReport {
            function: self.source.name().to_string(),
            iterations: self.iterations,
            totals_ms,
            aggregated: aggregate(&traces)?,
            returned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::StepClock;
    use std::rc::Rc;

    fn deterministic(iterations: usize) -> ProfilerConfig {
        ProfilerConfig {
            iterations,
            ..ProfilerConfig::default()
        }
    }

    fn tracker(source: &str, name: &str, iterations: usize) -> Tracker {
        let script = Script::from_source(source).unwrap();
        let namespace = Namespace::new(Rc::new(StepClock::new(0.001)))
            .with_preamble(script.program().clone());
        Tracker::with_namespace(&script, name, namespace, &deterministic(iterations)).unwrap()
    }

    #[test]
    fn test_loop_scenario_rows() {
        let mut t = tracker(
            "def f():\n    m = 1\n    for i in range(3):\n        m = m + 1\n    return m\n",
            "f",
            3,
        );
        let report = t.call(&[], &[]).unwrap();
        let texts: Vec<&str> = report.rows().iter().map(|r| r.text.trim()).collect();
        assert_eq!(texts, vec!["m = 1", "for i in range(3):", "m = m + 1", "return m"]);
        assert_eq!(report.returned, Value::Int(4));
        assert_eq!(report.totals_ms.len(), 3);
    }

    #[test]
    fn test_report_replaced_on_each_call() {
        let mut t = tracker("def f(x):\n    return x\n", "f", 2);
        assert!(t.report().is_none());
        t.call(&[Value::Int(1)], &[]).unwrap();
        assert_eq!(t.report().unwrap().returned, Value::Int(1));
        t.call(&[Value::Int(2)], &[]).unwrap();
        assert_eq!(t.report().unwrap().returned, Value::Int(2));
    }

    #[test]
    fn test_failure_clears_report() {
        let mut t = tracker("def f(x):\n    return 10 / x\n", "f", 2);
        t.call(&[Value::Int(2)], &[]).unwrap();
        assert!(t.report().is_some());
        let err = t.call(&[Value::Int(0)], &[]).unwrap_err();
        assert!(matches!(err, ProfileError::Execution { run: 0, .. }));
        assert!(t.report().is_none());
    }

    #[test]
    fn test_error_message_leaves_cause_to_source() {
        let mut t = tracker("def f(x):\n    return 10 / x\n", "f", 1);
        let err = t.call(&[Value::Int(0)], &[]).unwrap_err();
        assert_eq!(err.to_string(), "profiled function raised during run 0");
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(cause.contains("division by zero"));
    }

    #[test]
    fn test_single_iteration_totals() {
        let mut t = tracker("def f():\n    return 42\n", "f", 1);
        let report = t.call(&[], &[]).unwrap();
        assert!(report.total_mean_ms().is_ok());
        assert!(matches!(
            report.total_std_ms(),
            Err(ProfileError::InsufficientData(_))
        ));
        assert_eq!(report.rows().len(), 1);
        assert_eq!(report.rows()[0].std_ms, None);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let script = Script::from_source("def f():\n    pass\n").unwrap();
        let err = Tracker::for_script(&script, "f", &deterministic(0)).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidIterations));
    }

    #[test]
    fn test_unknown_function() {
        let script = Script::from_source("def f():\n    pass\n").unwrap();
        let err = Tracker::for_script(&script, "g", &ProfilerConfig::default()).unwrap_err();
        assert!(matches!(err, ProfileError::FunctionNotFound { .. }));
    }

    #[test]
    fn test_bad_passthrough_pattern() {
        let script = Script::from_source("def f():\n    pass\n").unwrap();
        let config = ProfilerConfig {
            passthrough: vec!["[".to_string()],
            ..ProfilerConfig::default()
        };
        let err = Tracker::for_script(&script, "f", &config).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidPattern(_)));
    }

    #[test]
    fn test_instrumented_source_exposed() {
        let t = tracker("def f():\n    x = 1\n", "f", 1);
        assert!(t.instrumented_source().starts_with("def f():\n"));
        assert!(t.instrumented_source().contains("__tw_0 = perf_counter()"));
    }

    #[test]
    fn test_keyword_arguments_forwarded() {
        let mut t = tracker("def f(a, b=1):\n    return a - b\n", "f", 1);
        let report = t
            .call(&[], &[("a".to_string(), Value::Int(5)), ("b".to_string(), Value::Int(2))])
            .unwrap();
        assert_eq!(report.returned, Value::Int(3));
    }
}
