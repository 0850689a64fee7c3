//! Control primitives for kettle-control.
//!
//! This crate holds the control-theory core: the controllers, the way they
//! compose, and the narrow collaborator traits through which a loop reads its
//! inputs and drives its actuator.
//!
//! # Architecture
//!
//! - [`Pid`] computes a clamped P+I+D output with anti-windup over measured,
//!   possibly irregular, sample intervals
//! - [`Hysteresis`] is an on/off controller with minimum/maximum on-time and
//!   minimum off-time
//! - [`Cascade`] wires an optional outer PID in front of an [`InnerStage`]
//!   (a PID or a hysteresis controller)
//! - [`MeasurementProvider`], [`SetpointSource`] and [`Actuator`] are the
//!   boundary to sensors and actuators
//!
//! Controllers never read the clock themselves; every update receives `now`
//! in seconds, so the same code runs against wall time and simulated time.

pub mod actuator;
pub mod cascade;
pub mod error;
pub mod hysteresis;
pub mod measured;
pub mod output;
pub mod pid;
pub mod sampled;

pub use actuator::{Actuator, RecordingActuator};
pub use cascade::{Cascade, CascadeStep, InnerStage, StageTrace};
pub use error::{ControlError, ControlResult};
pub use hysteresis::{DwellTimes, Hysteresis, Polarity};
pub use measured::{FixedSetpoint, MeasurementProvider, SensorCache, SensorChannel, SetpointSource};
pub use output::ActuatorOutput;
pub use pid::{Pid, PidGains};
pub use sampled::{GUARD_MARGIN_S, SampleConfig};
