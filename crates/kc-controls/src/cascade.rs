//! Cascade composition of controllers.
//!
//! A [`Cascade`] is an optional outer PID in front of an [`InnerStage`]:
//!
//! ```text
//! setpoint ─► outer PID ─► inner setpoint ─► inner stage ─► actuator output
//!               ▲                              ▲
//!        primary measurement          secondary measurement
//! ```
//!
//! The outer PID's output range is the allowed range of the inner setpoint,
//! so its `output_max` is the highest target the inner stage can ever see.
//! Without an outer stage the inner stage is driven by the setpoint and the
//! primary measurement directly.
//!
//! The cascade adds no state of its own; it only fixes the evaluation order
//! (outer before inner, every cycle).

use crate::error::{ControlError, ControlResult};
use crate::hysteresis::Hysteresis;
use crate::output::ActuatorOutput;
use crate::pid::Pid;
use kc_core::{Real, round_to};

/// The stage that drives the actuator.
#[derive(Debug, Clone, PartialEq)]
pub enum InnerStage {
    /// Analog drive from a PID controller.
    Pid(Pid),
    /// On/off drive from a hysteresis controller.
    Hysteresis(Hysteresis),
}

impl InnerStage {
    /// Run one sample of the stage.
    pub fn step(&mut self, measured: Real, setpoint: Real, now: Real) -> ActuatorOutput {
        match self {
            Self::Pid(pid) => ActuatorOutput::Power(pid.update(measured, setpoint, now)),
            Self::Hysteresis(h) => ActuatorOutput::Switch(h.update(measured, setpoint, now)),
        }
    }

    /// Integrator value, for stages that have one.
    pub fn integrator(&self) -> Option<Real> {
        match self {
            Self::Pid(pid) => Some(pid.integrator()),
            Self::Hysteresis(_) => None,
        }
    }

    /// Output that leaves the actuator disengaged.
    pub fn safe_output(&self) -> ActuatorOutput {
        match self {
            Self::Pid(_) => ActuatorOutput::Power(0.0),
            Self::Hysteresis(_) => ActuatorOutput::Switch(false),
        }
    }
}

impl From<Pid> for InnerStage {
    fn from(pid: Pid) -> Self {
        Self::Pid(pid)
    }
}

impl From<Hysteresis> for InnerStage {
    fn from(h: Hysteresis) -> Self {
        Self::Hysteresis(h)
    }
}

/// What one stage saw and produced during a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTrace {
    pub target: Real,
    pub actual: Real,
    pub output: ActuatorOutput,
    pub integrator: Option<Real>,
}

/// Result of one cascade cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeStep {
    /// Outer stage, when the loop is cascaded. Its output is the inner target.
    pub outer: Option<StageTrace>,
    pub inner: StageTrace,
}

impl CascadeStep {
    /// Value to write to the actuator.
    pub fn output(&self) -> ActuatorOutput {
        self.inner.output
    }
}

/// Outer PID (optional) feeding an inner stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    outer: Option<Pid>,
    inner: InnerStage,
    precision: Option<u32>,
}

impl Cascade {
    /// A single-stage loop.
    pub fn single(inner: impl Into<InnerStage>) -> Self {
        Self {
            outer: None,
            inner: inner.into(),
            precision: None,
        }
    }

    /// A two-stage loop; `outer`'s output range bounds the inner setpoint.
    pub fn new(outer: Pid, inner: impl Into<InnerStage>) -> Self {
        Self {
            outer: Some(outer),
            inner: inner.into(),
            precision: None,
        }
    }

    /// Round the inner setpoint and analog outputs to `places` decimals.
    pub fn with_precision(mut self, places: u32) -> Self {
        self.precision = Some(places);
        self
    }

    pub fn is_cascaded(&self) -> bool {
        self.outer.is_some()
    }

    pub fn outer(&self) -> Option<&Pid> {
        self.outer.as_ref()
    }

    pub fn inner(&self) -> &InnerStage {
        &self.inner
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    /// Highest setpoint the inner stage can receive, when cascaded.
    pub fn max_inner_setpoint(&self) -> Option<Real> {
        self.outer.as_ref().map(Pid::output_max)
    }

    pub fn safe_output(&self) -> ActuatorOutput {
        self.inner.safe_output()
    }

    /// Run one cycle.
    ///
    /// # Arguments
    ///
    /// * `setpoint` - Externally configured target
    /// * `primary` - Measurement compared against `setpoint`
    /// * `secondary` - Measurement for the inner stage of a cascaded loop
    /// * `now` - Sample time in seconds
    ///
    /// # Errors
    ///
    /// Returns error if the loop is cascaded and `secondary` is missing.
    pub fn step(
        &mut self,
        setpoint: Real,
        primary: Real,
        secondary: Option<Real>,
        now: Real,
    ) -> ControlResult<CascadeStep> {
        let precision = self.precision;

        let (outer, inner_target, inner_actual) = match self.outer.as_mut() {
            Some(outer_pid) => {
                let actual = secondary.ok_or(ControlError::InvalidArg {
                    what: "cascaded loop requires an inner measurement",
                })?;
                let raw = outer_pid.update(primary, setpoint, now);
                let target = round_within(
                    raw,
                    precision,
                    outer_pid.output_min(),
                    outer_pid.output_max(),
                );
                let trace = StageTrace {
                    target: setpoint,
                    actual: primary,
                    output: ActuatorOutput::Power(target),
                    integrator: Some(outer_pid.integrator()),
                };
                (Some(trace), target, actual)
            }
            None => (None, setpoint, primary),
        };

        let output = match (self.inner.step(inner_actual, inner_target, now), &self.inner) {
            (ActuatorOutput::Power(v), InnerStage::Pid(pid)) => {
                let (min, max) = (pid.output_min(), pid.output_max());
                ActuatorOutput::Power(round_within(v, precision, min, max))
            }
            (output, _) => output,
        };

        Ok(CascadeStep {
            outer,
            inner: StageTrace {
                target: inner_target,
                actual: inner_actual,
                output,
                integrator: self.inner.integrator(),
            },
        })
    }
}

fn round_within(v: Real, precision: Option<u32>, min: Real, max: Real) -> Real {
    match precision {
        Some(places) => round_to(v, places).clamp(min, max),
        None => v,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::pid::PidGains;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn inner_never_sees_setpoint_above_max(
            kp in 0.0..100.0_f64,
            ki in 0.0..10.0_f64,
            kd in 0.0..10.0_f64,
            max_set in 30.0..100.0_f64,
            precision in prop::option::of(0u32..4),
            samples in prop::collection::vec(
                (0.0..150.0_f64, 0.0..150.0_f64, 0.0..120.0_f64, 0.5..10.0_f64),
                1..50,
            ),
        ) {
            let outer = Pid::new(PidGains::new(kp, ki, kd), 0.0, max_set).unwrap();
            let inner = Pid::new(PidGains::new(5.0, 0.25, 0.0), 0.0, 100.0).unwrap();
            let mut cascade = Cascade::new(outer, inner);
            if let Some(places) = precision {
                cascade = cascade.with_precision(places);
            }

            let mut now = 0.0;
            for (setpoint, primary, secondary, dt) in samples {
                now += dt;
                let step = cascade.step(setpoint, primary, Some(secondary), now).unwrap();
                prop_assert!(step.inner.target <= max_set);
                prop_assert!(step.inner.target >= 0.0);
                let out = step.output().as_power();
                prop_assert!((0.0..=100.0).contains(&out));
            }
        }
    }
}
