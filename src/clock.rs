//! Monotonic time sources exposed to profiled scripts as `perf_counter()`
//!
//! Instrumented code reads the clock at every instrumentation point, and the
//! executor reads it around every run. Both go through the [`Clock`] trait so
//! tests can substitute [`StepClock`], which advances by a fixed step per read
//! and makes reports reproducible.
//!
//! # Example
//!
//! ```
//! use codpulse::clock::{Clock, StepClock};
//!
//! let clock = StepClock::new(0.5);
//! assert_eq!(clock.now(), 0.0);
//! assert_eq!(clock.now(), 0.5);
//! ```

use std::cell::Cell;
use std::time::Instant;

/// Source of monotonically non-decreasing timestamps, in seconds
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`], measured from construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Deterministic stand-in: each read returns the previous value plus `step`
#[derive(Debug, Clone)]
pub struct StepClock {
    current: Cell<f64>,
    step: f64,
}

impl StepClock {
    pub fn new(step: f64) -> Self {
        Self::starting_at(0.0, step)
    }

    pub fn starting_at(start: f64, step: f64) -> Self {
        Self {
            current: Cell::new(start),
            step,
        }
    }

    pub fn reset(&self, start: f64) {
        self.current.set(start);
    }
}

impl Clock for StepClock {
    fn now(&self) -> f64 {
        let value = self.current.get();
        self.current.set(value + self.step);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_step_clock_sequence() {
        let clock = StepClock::starting_at(1.0, 0.25);
        assert_eq!(clock.now(), 1.0);
        assert_eq!(clock.now(), 1.25);
        assert_eq!(clock.now(), 1.5);
    }

    #[test]
    fn test_step_clock_reset() {
        let clock = StepClock::new(1.0);
        clock.now();
        clock.now();
        clock.reset(0.0);
        assert_eq!(clock.now(), 0.0);
    }
}
