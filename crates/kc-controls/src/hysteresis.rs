//! On/off hysteresis controller with dwell-time constraints.
//!
//! The controller follows the sign of the error, but a state change is only
//! allowed once the current state has been held long enough:
//! - ON is held for at least `on_min` and at most `on_max` seconds
//! - OFF is held for at least `off_min` seconds
//!
//! Dwell constraints always win over demand. This protects compressors,
//! pumps and heating elements from short-cycling.

use crate::error::{ControlError, ControlResult};
use kc_core::{Real, ensure_finite};
use serde::{Deserialize, Serialize};

/// Which side of the setpoint turns the output on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// ON while the measurement is at or below the target (heating).
    #[default]
    Positive,
    /// ON while the measurement is at or above the target (cooling).
    Negative,
}

impl Polarity {
    pub fn is_positive(self) -> bool {
        matches!(self, Self::Positive)
    }

    /// Whether the output is demanded for this measurement and target.
    pub fn demands_on(self, current: Real, target: Real) -> bool {
        match self {
            Self::Positive => current <= target,
            Self::Negative => current >= target,
        }
    }
}

/// Dwell-time bounds in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DwellTimes {
    /// Minimum time the output stays ON once switched on.
    pub on_min: Real,
    /// Maximum continuous ON time before the output is forced OFF.
    pub on_max: Real,
    /// Minimum time the output stays OFF once switched off.
    pub off_min: Real,
}

impl DwellTimes {
    /// Validate and build dwell times.
    ///
    /// # Errors
    ///
    /// Returns error unless `0 < on_min < on_max` and `off_min > 0`.
    pub fn new(on_min: Real, on_max: Real, off_min: Real) -> ControlResult<Self> {
        ensure_finite(on_min, "on_min")?;
        ensure_finite(on_max, "on_max")?;
        ensure_finite(off_min, "off_min")?;
        if on_min <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "minimum on time must be positive",
            });
        }
        if on_max <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "maximum on time must be positive",
            });
        }
        if on_min >= on_max {
            return Err(ControlError::InvalidArg {
                what: "maximum on time must be greater than the minimum on time",
            });
        }
        if off_min <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "minimum off time must be positive",
            });
        }
        Ok(Self {
            on_min,
            on_max,
            off_min,
        })
    }
}

impl Default for DwellTimes {
    fn default() -> Self {
        Self {
            on_min: 45.0,
            on_max: 1800.0,
            off_min: 90.0,
        }
    }
}

/// Hysteresis controller state.
#[derive(Debug, Clone, PartialEq)]
pub struct Hysteresis {
    polarity: Polarity,
    dwell: DwellTimes,
    on: bool,
    last_transition_time: Real,
}

impl Hysteresis {
    /// Create a controller that starts OFF.
    ///
    /// `now` is taken as the last transition, so the first ON is delayed
    /// until `off_min` has elapsed.
    pub fn new(polarity: Polarity, dwell: DwellTimes, now: Real) -> Self {
        Self {
            polarity,
            dwell,
            on: false,
            last_transition_time: now,
        }
    }

    /// Start in an explicit state, with `since` as the time it was entered.
    ///
    /// Passing a `since` at least `off_min` in the past removes the start-up
    /// delay.
    pub fn with_initial_state(mut self, on: bool, since: Real) -> Self {
        self.on = on;
        self.last_transition_time = since;
        self
    }

    /// Advance the state machine and return whether the output is ON.
    pub fn update(&mut self, current: Real, target: Real, now: Real) -> bool {
        let interval = now - self.last_transition_time;
        let demand = self.polarity.demands_on(current, target);

        let next = match (demand, self.on) {
            // Held ON too long: forced off even though demand persists.
            (true, true) => interval <= self.dwell.on_max,
            (true, false) => interval >= self.dwell.off_min,
            (false, true) => interval < self.dwell.on_min,
            (false, false) => false,
        };

        if next != self.on {
            self.on = next;
            self.last_transition_time = now;
        }
        self.on
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn dwell(&self) -> DwellTimes {
        self.dwell
    }

    pub fn last_transition_time(&self) -> Real {
        self.last_transition_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heating(now: Real) -> Hysteresis {
        Hysteresis::new(Polarity::Positive, DwellTimes::default(), now)
    }

    #[test]
    fn warm_up_window_delays_first_on() {
        let mut h = heating(0.0);
        assert!(!h.update(60.0, 65.0, 0.0));
        assert!(!h.update(60.0, 65.0, 50.0));
        assert!(h.update(60.0, 65.0, 100.0));
        assert_eq!(h.last_transition_time(), 100.0);
    }

    #[test]
    fn explicit_initial_state_skips_warm_up() {
        let mut h = heating(0.0).with_initial_state(false, -1_000.0);
        assert!(h.update(60.0, 65.0, 0.0));
    }

    #[test]
    fn on_min_holds_output_on() {
        let mut h = heating(0.0).with_initial_state(true, 0.0);
        // demand flips off immediately
        assert!(h.update(70.0, 65.0, 1.0));
        assert!(h.update(70.0, 65.0, 44.9));
        assert!(!h.update(70.0, 65.0, 45.0));
        assert_eq!(h.last_transition_time(), 45.0);
    }

    #[test]
    fn on_max_forces_off_then_off_min_holds() {
        let mut h = heating(0.0).with_initial_state(true, 0.0);
        assert!(h.update(60.0, 65.0, 1800.0));
        assert!(!h.update(60.0, 65.0, 1800.5));
        assert_eq!(h.last_transition_time(), 1800.5);

        // continuous demand, but the off floor applies
        assert!(!h.update(60.0, 65.0, 1850.0));
        assert!(!h.update(60.0, 65.0, 1890.0));
        assert!(h.update(60.0, 65.0, 1890.5));
    }

    #[test]
    fn stays_off_without_demand() {
        let mut h = heating(0.0);
        assert!(!h.update(70.0, 65.0, 500.0));
        assert_eq!(h.last_transition_time(), 0.0);
    }

    #[test]
    fn negative_polarity_cools() {
        let mut h = Hysteresis::new(Polarity::Negative, DwellTimes::default(), 0.0);
        assert!(h.update(10.0, 4.0, 100.0));
        assert!(h.update(4.0, 4.0, 110.0));
        assert!(h.update(2.0, 4.0, 140.0));
        assert!(!h.update(2.0, 4.0, 145.0));
    }

    #[test]
    fn equal_measurement_counts_as_demand() {
        assert!(Polarity::Positive.demands_on(65.0, 65.0));
        assert!(Polarity::Negative.demands_on(65.0, 65.0));
        assert!(!Polarity::Positive.demands_on(65.1, 65.0));
        assert!(!Polarity::Negative.demands_on(64.9, 65.0));
    }

    #[test]
    fn invalid_dwell_times() {
        assert!(DwellTimes::new(0.0, 10.0, 5.0).is_err());
        assert!(DwellTimes::new(5.0, -1.0, 5.0).is_err());
        assert!(DwellTimes::new(10.0, 10.0, 5.0).is_err());
        assert!(DwellTimes::new(20.0, 10.0, 5.0).is_err());
        assert!(DwellTimes::new(5.0, 10.0, 0.0).is_err());
        assert!(DwellTimes::new(Real::NAN, 10.0, 5.0).is_err());
        assert!(DwellTimes::new(45.0, 1800.0, 90.0).is_ok());
    }
}
