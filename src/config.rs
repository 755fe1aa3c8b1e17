//! Profiler configuration loaded from `codpulse.toml`
//!
//! Every key is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! iterations = 5
//! passthrough = ["^print\\(", "^log\\("]
//!
//! [report]
//! padding = 5
//! left_padding = 2
//! precision = 3
//! ```

use crate::materialize::Namespace;
use crate::preprocess::DEFAULT_PASSTHROUGH;
use crate::report::DisplayOptions;
use crate::script::{DEFAULT_RECURSION_LIMIT, MAX_RECURSION_LIMIT};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_ITERATIONS: usize = 3;

/// Root of `codpulse.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilerConfig {
    /// Runs per tracker call
    pub iterations: usize,
    /// Regexes for lines that are kept in the function but never timed
    pub passthrough: Vec<String>,
    /// Call depth at which the script interpreter gives up
    pub recursion_limit: usize,
    pub report: DisplayOptions,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            passthrough: vec![DEFAULT_PASSTHROUGH.to_string()],
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            report: DisplayOptions::default(),
        }
    }
}

impl ProfilerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            bail!("iterations must be at least 1");
        }
        if !(1..=MAX_RECURSION_LIMIT).contains(&self.recursion_limit) {
            bail!(
                "recursion_limit must be between 1 and {}, got {}",
                MAX_RECURSION_LIMIT,
                self.recursion_limit
            );
        }
        for pattern in &self.passthrough {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid passthrough pattern '{}'", pattern))?;
        }
        Ok(())
    }

    /// Fresh namespace on the real monotonic clock
    pub fn namespace(&self) -> Namespace {
        Namespace::default().with_recursion_limit(self.recursion_limit)
    }
}
