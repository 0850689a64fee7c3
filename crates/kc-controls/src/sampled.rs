//! Sampled execution timing for control loops.
//!
//! A loop runs once per update interval. At the start of each cycle it fixes
//! a wake time; if the cycle's work leaves less than [`GUARD_MARGIN_S`]
//! before that wake time, the interval is too short for the loop to keep up.

use crate::error::{ControlError, ControlResult};
use kc_core::Real;
use serde::{Deserialize, Serialize};

/// Minimum slack (seconds) a cycle must leave before its wake time.
pub const GUARD_MARGIN_S: Real = 0.25;

/// Sample configuration for a control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Update interval in seconds.
    pub update_interval: Real,
}

impl SampleConfig {
    /// Create a new sample configuration.
    ///
    /// # Errors
    ///
    /// Returns error if `update_interval` is not a positive finite number.
    pub fn new(update_interval: Real) -> ControlResult<Self> {
        if !update_interval.is_finite() || update_interval <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "update interval must be positive",
            });
        }
        Ok(Self { update_interval })
    }

    /// Create a sample configuration from frequency in Hz.
    pub fn from_frequency(freq_hz: Real) -> ControlResult<Self> {
        if !freq_hz.is_finite() || freq_hz <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "frequency must be positive",
            });
        }
        Self::new(1.0 / freq_hz)
    }

    /// Get the sample frequency in Hz.
    pub fn frequency(&self) -> Real {
        1.0 / self.update_interval
    }

    /// Wake time for a cycle starting at `cycle_start`.
    pub fn wake_time(&self, cycle_start: Real) -> Real {
        cycle_start + self.update_interval
    }

    /// Whether a cycle that finished its work at `now` overran `wake_time`.
    pub fn overran(&self, wake_time: Real, now: Real) -> bool {
        wake_time <= now + GUARD_MARGIN_S
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            update_interval: 2.5,
        }
    }
}
