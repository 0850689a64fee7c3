//! Actuator collaborator.
//!
//! The loop writes exactly one [`ActuatorOutput`] per cycle and forces the
//! safe value when it stops.

use crate::error::ControlResult;
use crate::output::ActuatorOutput;

/// Anything that can be driven by a control loop.
pub trait Actuator {
    /// Drive the actuator. Writes are expected to be idempotent.
    fn write_output(&mut self, output: ActuatorOutput) -> ControlResult<()>;
}

/// In-memory actuator that keeps every value written to it.
///
/// Useful for dry runs and for checking what a loop would have done.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingActuator {
    history: Vec<ActuatorOutput>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent value written, if any.
    pub fn last(&self) -> Option<ActuatorOutput> {
        self.history.last().copied()
    }

    pub fn history(&self) -> &[ActuatorOutput] {
        &self.history
    }
}

impl Actuator for RecordingActuator {
    fn write_output(&mut self, output: ActuatorOutput) -> ControlResult<()> {
        self.history.push(output);
        Ok(())
    }
}
