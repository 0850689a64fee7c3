//! Time source for control loops.

use crate::stop::StopSignal;
use kc_core::Real;
use std::time::{Duration, Instant};

/// How a sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The deadline passed.
    Elapsed,
    /// A stop was requested first.
    Stopped,
}

/// Monotonic seconds plus a cancellable sleep.
pub trait Clock {
    fn now(&self) -> Real;

    /// Sleep until `deadline` (same time base as [`Clock::now`]) or until
    /// `stop` fires, whichever comes first.
    fn sleep_until(&mut self, deadline: Real, stop: &StopSignal) -> Wake;
}

/// Wall-clock time, measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Real {
        self.origin.elapsed().as_secs_f64()
    }

    fn sleep_until(&mut self, deadline: Real, stop: &StopSignal) -> Wake {
        let remaining = deadline - self.now();
        let stopped = match Duration::try_from_secs_f64(remaining) {
            Ok(timeout) if remaining > 0.0 => stop.wait_timeout(timeout),
            _ => stop.is_stopped(),
        };
        if stopped { Wake::Stopped } else { Wake::Elapsed }
    }
}
