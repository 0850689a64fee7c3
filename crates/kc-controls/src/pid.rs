//! PID controller.
//!
//! A single-loop proportional-integral-derivative controller with:
//! - Output clamping
//! - Integrator bound derived from the output range (anti-windup)
//! - Optional clamp on the error fed to the integrator
//! - Integration and differentiation over the measured elapsed time, so
//!   jitter in the update cadence does not bias the result

use crate::error::{ControlError, ControlResult};
use kc_core::{Real, clamp_symmetric, ensure_finite};
use serde::{Deserialize, Serialize};

/// PID gains.
///
/// Units: `kp` is output per process-variable unit, `ki` output per
/// (unit · second), `kd` output per (unit / second).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: Real,
    /// Integral gain.
    pub ki: Real,
    /// Derivative gain.
    pub kd: Real,
}

impl PidGains {
    pub fn new(kp: Real, ki: Real, kd: Real) -> Self {
        Self { kp, ki, kd }
    }
}

/// PID controller with its integrator and sample history.
///
/// One instance belongs to exactly one control loop; `update` is the only
/// mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pid {
    gains: PidGains,
    output_min: Real,
    output_max: Real,
    /// `|(output_max - output_min) / ki|`, or 0 when `ki == 0`.
    integrator_limit: Real,
    integrator_error_limit: Option<Real>,
    integrator: Real,
    last_sample_time: Option<Real>,
    last_error: Real,
}

impl Pid {
    /// Create a new PID controller.
    ///
    /// # Arguments
    ///
    /// * `gains` - Proportional, integral and derivative gains
    /// * `output_min` - Minimum output
    /// * `output_max` - Maximum output
    ///
    /// # Errors
    ///
    /// Returns error if any value is non-finite or `output_min >= output_max`.
    pub fn new(gains: PidGains, output_min: Real, output_max: Real) -> ControlResult<Self> {
        ensure_finite(gains.kp, "kp")?;
        ensure_finite(gains.ki, "ki")?;
        ensure_finite(gains.kd, "kd")?;
        ensure_finite(output_min, "output_min")?;
        ensure_finite(output_max, "output_max")?;
        if output_min >= output_max {
            return Err(ControlError::InvalidArg {
                what: "output_min must be less than output_max",
            });
        }

        let integrator_limit = if gains.ki == 0.0 {
            0.0
        } else {
            ((output_max - output_min) / gains.ki).abs()
        };

        Ok(Self {
            gains,
            output_min,
            output_max,
            integrator_limit,
            integrator_error_limit: None,
            integrator: 0.0,
            last_sample_time: None,
            last_error: 0.0,
        })
    }

    /// Clamp the per-sample error fed to the integrator to `±limit`.
    ///
    /// The limit is taken by magnitude.
    pub fn with_integrator_error_limit(mut self, limit: Real) -> ControlResult<Self> {
        ensure_finite(limit, "integrator_error_limit")?;
        self.integrator_error_limit = Some(limit.abs());
        Ok(self)
    }

    /// Seed the integrator. Values beyond the integrator bound are clamped.
    pub fn with_integrator(mut self, initial: Real) -> Self {
        self.integrator = if initial.is_finite() {
            clamp_symmetric(initial, self.integrator_limit)
        } else {
            0.0
        };
        self
    }

    /// Compute the controller output for one sample.
    ///
    /// # Arguments
    ///
    /// * `current` - Process variable (measured value)
    /// * `target` - Setpoint
    /// * `now` - Sample time in seconds on a monotonic clock
    ///
    /// The first sample has no elapsed time to integrate or differentiate
    /// over, so it produces proportional action only. A sample taken at the
    /// same instant as (or before) the previous one is treated the same way.
    /// A non-finite error leaves the state untouched and returns `output_min`.
    pub fn update(&mut self, current: Real, target: Real, now: Real) -> Real {
        let error = target - current;
        if !error.is_finite() {
            return self.output_min;
        }
        let dt = self.last_sample_time.map(|last| now - last);
        self.last_sample_time = Some(now);

        let raw = match dt {
            Some(dt) if dt > 0.0 => {
                let integrator_error = match self.integrator_error_limit {
                    Some(limit) => clamp_symmetric(error, limit),
                    None => error,
                };
                self.integrator = clamp_symmetric(
                    self.integrator + integrator_error * dt,
                    self.integrator_limit,
                );
                let derivative = (error - self.last_error) / dt;

                let p_term = self.gains.kp * error;
                let i_term = self.gains.ki * self.integrator;
                let d_term = self.gains.kd * derivative;
                p_term + i_term + d_term
            }
            _ => self.gains.kp * error,
        };

        self.last_error = error;
        raw.clamp(self.output_min, self.output_max)
    }

    /// Forget the sample history; the next update behaves like the first one.
    pub fn reset(&mut self) {
        self.integrator = 0.0;
        self.last_sample_time = None;
        self.last_error = 0.0;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn output_min(&self) -> Real {
        self.output_min
    }

    pub fn output_max(&self) -> Real {
        self.output_max
    }

    pub fn integrator(&self) -> Real {
        self.integrator
    }

    pub fn integrator_limit(&self) -> Real {
        self.integrator_limit
    }

    pub fn integrator_error_limit(&self) -> Option<Real> {
        self.integrator_error_limit
    }

    pub fn last_sample_time(&self) -> Option<Real> {
        self.last_sample_time
    }
}



#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> impl Strategy<Value = (Real, Real, Real)> {
        (-500.0..500.0_f64, -500.0..500.0_f64, 0.0..30.0_f64)
    }

    proptest! {
        #[test]
        fn output_stays_within_bounds(
            kp in -20.0..20.0_f64,
            ki in -5.0..5.0_f64,
            kd in -20.0..20.0_f64,
            min in -100.0..50.0_f64,
            span in 0.1..200.0_f64,
            samples in prop::collection::vec(sample(), 1..40),
        ) {
            let max = min + span;
            let mut pid = Pid::new(PidGains::new(kp, ki, kd), min, max).unwrap();
            let mut now = 0.0;
            for (current, target, dt) in samples {
                now += dt;
                let output = pid.update(current, target, now);
                prop_assert!(output >= min && output <= max);
            }
        }

        #[test]
        fn integrator_never_exceeds_derived_bound(
            ki in -5.0..5.0_f64,
            span in 0.1..200.0_f64,
            initial in -1.0e4..1.0e4_f64,
            error_limit in prop::option::of(0.0..10.0_f64),
            samples in prop::collection::vec(sample(), 1..40),
        ) {
            let mut pid = Pid::new(PidGains::new(1.0, ki, 0.5), 0.0, span)
                .unwrap()
                .with_integrator(initial);
            if let Some(limit) = error_limit {
                pid = pid.with_integrator_error_limit(limit).unwrap();
            }
            let bound = if ki == 0.0 { 0.0 } else { (span / ki).abs() };

            let mut now = 0.0;
            for (current, target, dt) in samples {
                now += dt;
                pid.update(current, target, now);
                prop_assert!(pid.integrator().abs() <= bound * (1.0 + 1e-12));
                if ki == 0.0 {
                    prop_assert_eq!(pid.integrator(), 0.0);
                }
            }
        }

        #[test]
        fn first_sample_matches_clamped_proportional(
            kp in -20.0..20.0_f64,
            current in -500.0..500.0_f64,
            target in -500.0..500.0_f64,
            now in 0.0..1.0e6_f64,
        ) {
            let mut pid = Pid::new(PidGains::new(kp, 0.7, 3.0), 0.0, 100.0)
                .unwrap()
                .with_integrator(25.0);
            let expected = (kp * (target - current)).clamp(0.0, 100.0);
            prop_assert_eq!(pid.update(current, target, now), expected);
        }
    }
}
