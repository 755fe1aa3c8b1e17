//! codpulse - line-level execution profiler
//!
//! Given the source of a function written in the pulse script language,
//! codpulse rewrites it so that almost every logical line records a
//! timestamp, runs the rewritten function several times with the same
//! arguments, and reports the mean and standard deviation of the time spent
//! on each line across runs.
//!
//! The pipeline, stage by stage:
//!
//! - [`source`] extracts a function's text from a script
//! - [`preprocess`] drops blank and comment lines and inserts boundary markers
//! - [`instrument`] emits the timed variant of the function
//! - [`materialize`] compiles it inside an execution namespace
//! - [`executor`] calls it N times and decodes the traces
//! - [`aggregate`] aligns the traces and summarizes each line
//!
//! [`profiler::Tracker`] drives all of it; [`report`], [`json_output`] and
//! [`csv_output`] turn the result into text.

pub mod aggregate;
pub mod cli;
pub mod clock;
pub mod config;
pub mod csv_output;
pub mod executor;
pub mod instrument;
pub mod json_output;
pub mod materialize;
pub mod preprocess;
pub mod profiler;
pub mod report;
pub mod script;
pub mod source;
pub mod stats;
