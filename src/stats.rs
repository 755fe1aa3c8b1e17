//! Mean and standard deviation over timing samples
//!
//! Both routines refuse to answer with too few samples instead of returning
//! NaN: the mean needs one data point, the standard deviation two. The
//! arithmetic runs on `trueno::Vector` (f32 lanes); results widen back to f64.

use thiserror::Error;
use trueno::Vector;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("{statistic} requires at least {required} data point(s), got {found}")]
    InsufficientData {
        statistic: &'static str,
        required: usize,
        found: usize,
    },

    #[error("vector statistics failed: {0}")]
    Compute(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

fn vector(data: &[f64]) -> Vector<f32> {
    let lanes: Vec<f32> = data.iter().map(|&x| x as f32).collect();
    Vector::from_slice(&lanes)
}

/// Arithmetic mean
pub fn mean(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(StatsError::InsufficientData {
            statistic: "mean",
            required: 1,
            found: 0,
        });
    }
    let m = vector(data)
        .mean()
        .map_err(|e| StatsError::Compute(e.to_string()))?;
    Ok(f64::from(m))
}

/// Standard deviation with `ddof` delta degrees of freedom
///
/// `ddof = 0` gives the population deviation, `ddof = 1` the sample
/// deviation. At least two points are always required.
pub fn stddev(data: &[f64], ddof: usize) -> Result<f64> {
    let n = data.len();
    let required = 2.max(ddof + 1);
    if n < required {
        return Err(StatsError::InsufficientData {
            statistic: "standard deviation",
            required,
            found: n,
        });
    }
    // trueno divides by n
    let population = vector(data)
        .variance()
        .map_err(|e| StatsError::Compute(e.to_string()))?;
    let variance = f64::from(population.max(0.0)) * n as f64 / (n - ddof) as f64;
    Ok(variance.sqrt())
}

/// Per-row summary where undefined statistics are `None`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

impl Summary {
    /// Summarize `data`, using `ddof` for the deviation
    pub fn of(data: &[f64], ddof: usize) -> Self {
        Self {
            count: data.len(),
            mean: mean(data).ok(),
            std: stddev(data, ddof).ok(),
        }
    }
}
