use anyhow::{anyhow, Context, Result};
use clap::Parser;
use codpulse::cli::{Cli, OutputFormat};
use codpulse::config::ProfilerConfig;
use codpulse::csv_output::CsvOutput;
use codpulse::json_output::JsonOutput;
use codpulse::profiler::Tracker;
use codpulse::report;
use codpulse::script::{self, PrintSink, Script, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "codpulse.toml";

/// Stack of the profiling thread, large enough for `MAX_RECURSION_LIMIT`
/// nested script calls
const WORKER_STACK_BYTES: usize = 64 * 1024 * 1024;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Explicit `--config`, else `./codpulse.toml` if it exists, else defaults
fn load_config(explicit: Option<&Path>) -> Result<ProfilerConfig> {
    match explicit {
        Some(path) => ProfilerConfig::from_file(path),
        None => {
            let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
            if implicit.is_file() {
                tracing::debug!(path = %implicit.display(), "using configuration file");
                ProfilerConfig::from_file(implicit)
            } else {
                Ok(ProfilerConfig::default())
            }
        }
    }
}

fn evaluate_arguments(args: &[String]) -> Result<Vec<Value>> {
    args.iter()
        .map(|expr| {
            script::evaluate(expr).with_context(|| format!("Invalid argument expression '{}'", expr))
        })
        .collect()
}

fn evaluate_keywords(kwargs: &[(String, String)]) -> Result<Vec<(String, Value)>> {
    kwargs
        .iter()
        .map(|(name, expr)| {
            let value = script::evaluate(expr)
                .with_context(|| format!("Invalid value for keyword '{}': '{}'", name, expr))?;
            Ok((name.clone(), value))
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    std::thread::Builder::new()
        .name("codpulse".to_string())
        .stack_size(WORKER_STACK_BYTES)
        .spawn(move || run(args))
        .context("Failed to start profiling thread")?
        .join()
        .map_err(|_| anyhow!("Profiling thread panicked"))?
}

fn run(args: Cli) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    config.validate()?;

    let script = Script::parse_file(&args.script)?;

    // keep machine-readable stdout clean of the script's own prints
    let sink = match args.format {
        OutputFormat::Text => PrintSink::Stdout,
        OutputFormat::Json | OutputFormat::Csv => PrintSink::Stderr,
    };
    let namespace = config
        .namespace()
        .with_sink(sink)
        .with_preamble(script.program().clone());
    let mut tracker = Tracker::with_namespace(&script, &args.function, namespace, &config)
        .with_context(|| format!("Cannot instrument '{}'", args.function))?;

    if args.show_instrumented {
        print!("{}", tracker.instrumented_source());
        return Ok(());
    }

    let positional = evaluate_arguments(&args.args)?;
    let keywords = evaluate_keywords(&args.kwargs)?;
    let profile = tracker
        .call(&positional, &keywords)
        .with_context(|| format!("Profiling '{}' failed", args.function))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Text => report::render(profile, &config.report, &mut out)?,
        OutputFormat::Json => writeln!(out, "{}", JsonOutput::from_report(profile).to_json()?)?,
        OutputFormat::Csv => write!(out, "{}", CsvOutput::from_report(profile, args.samples).to_csv())?,
    }
    out.flush()?;

    Ok(())
}
