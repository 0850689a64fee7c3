//! Measurement and setpoint collaborators.
//!
//! A control loop never reaches into a global sensor cache. The sensors it
//! reads are named by [`SensorChannel`] and resolved through an injected
//! [`MeasurementProvider`]; the target comes from a [`SetpointSource`].

use std::collections::HashMap;
use std::fmt;

use crate::error::{ControlError, ControlResult};
use kc_core::Real;
use serde::{Deserialize, Serialize};

/// Logical sensor channel a loop reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorChannel(pub String);

impl SensorChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SensorChannel {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SensorChannel {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of process-variable readings.
pub trait MeasurementProvider {
    /// Current value of the process variable on `channel`.
    fn read_measured_value(&self, channel: &SensorChannel) -> ControlResult<Real>;
}

/// Source of the externally configured target value.
pub trait SetpointSource {
    fn read_setpoint(&self) -> ControlResult<Real>;
}

/// Last known value per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorCache {
    values: HashMap<SensorChannel, Real>,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the latest reading for a channel.
    pub fn set(&mut self, channel: impl Into<SensorChannel>, value: Real) {
        self.values.insert(channel.into(), value);
    }

    pub fn get(&self, channel: &SensorChannel) -> Option<Real> {
        self.values.get(channel).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl MeasurementProvider for SensorCache {
    fn read_measured_value(&self, channel: &SensorChannel) -> ControlResult<Real> {
        let value = self.get(channel).ok_or_else(|| ControlError::MissingSensor {
            channel: channel.to_string(),
        })?;
        if !value.is_finite() {
            return Err(ControlError::Collaborator {
                what: format!("sensor '{channel}' reported {value}"),
            });
        }
        Ok(value)
    }
}

/// A setpoint that never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSetpoint(pub Real);

impl SetpointSource for FixedSetpoint {
    fn read_setpoint(&self) -> ControlResult<Real> {
        Ok(self.0)
    }
}
