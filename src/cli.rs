//! CLI argument parsing for codpulse

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the profiling report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width table (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "codpulse")]
#[command(version)]
#[command(about = "Line-level execution profiler for pulse scripts", long_about = None)]
pub struct Cli {
    /// Script containing the function to profile
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Name of the top-level function to profile
    #[arg(short = 'f', long = "function", value_name = "NAME")]
    pub function: String,

    /// Number of runs (overrides the configuration file)
    #[arg(short = 'n', long = "iterations", value_name = "N")]
    pub iterations: Option<usize>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (defaults to ./codpulse.toml when present)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the instrumented function and exit without running it
    #[arg(long = "show-instrumented")]
    pub show_instrumented: bool,

    /// Add a per-line sample count column to CSV output
    #[arg(long = "samples")]
    pub samples: bool,

    /// Keyword argument for the profiled function (repeatable)
    #[arg(long = "kw", value_name = "NAME=EXPR", value_parser = parse_keyword)]
    pub kwargs: Vec<(String, String)>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,

    /// Positional arguments, each evaluated as a script expression
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

fn parse_keyword(raw: &str) -> Result<(String, String), String> {
    let (name, expr) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=EXPR, got '{}'", raw))?;
    let name = name.trim();
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(format!("'{}' is not a valid parameter name", name));
    }
    Ok((name.to_string(), expr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_minimal() {
        let cli = Cli::parse_from(["codpulse", "work.pulse", "-f", "work"]);
        assert_eq!(cli.script, PathBuf::from("work.pulse"));
        assert_eq!(cli.function, "work");
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.iterations.is_none());
        assert!(cli.args.is_empty());
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_trailing_args() {
        let cli = Cli::parse_from(["codpulse", "s.pulse", "-f", "g", "--", "10", "[1, 2]"]);
        assert_eq!(cli.args, vec!["10".to_string(), "[1, 2]".to_string()]);
    }

    #[test]
    fn test_cli_keyword_args() {
        let cli = Cli::parse_from([
            "codpulse", "s.pulse", "-f", "g", "--kw", "limit=5", "--kw", "name='a=b'",
        ]);
        assert_eq!(
            cli.kwargs,
            vec![
                ("limit".to_string(), "5".to_string()),
                ("name".to_string(), "'a=b'".to_string())
            ]
        );
    }

    #[test]
    fn test_cli_rejects_bad_keyword() {
        assert!(Cli::try_parse_from(["codpulse", "s", "-f", "g", "--kw", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["codpulse", "s", "-f", "g", "--kw", "1x=2"]).is_err());
    }

    #[test]
    fn test_cli_format_and_iterations() {
        let cli = Cli::parse_from(["codpulse", "s", "-f", "g", "-n", "7", "--format", "json"]);
        assert_eq!(cli.iterations, Some(7));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_function_required() {
        assert!(Cli::try_parse_from(["codpulse", "s.pulse"]).is_err());
    }
}
