//! Actuator output values.

use kc_core::Real;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Drive level of a fully engaged actuator, in percent.
pub const FULL_POWER: Real = 100.0;

/// Value written to an actuator once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActuatorOutput {
    /// Analog drive in percent of full power.
    Power(Real),
    /// On/off drive.
    Switch(bool),
}

impl ActuatorOutput {
    /// Create an analog output.
    pub fn power(value: Real) -> Self {
        Self::Power(value)
    }

    /// Create an on/off output.
    pub fn switch(on: bool) -> Self {
        Self::Switch(on)
    }

    /// The safe value of the same kind: 0 % or off.
    pub fn safe(&self) -> Self {
        match self {
            Self::Power(_) => Self::Power(0.0),
            Self::Switch(_) => Self::Switch(false),
        }
    }

    /// Drive level in percent. A closed switch drives at full power.
    pub fn as_power(&self) -> Real {
        match self {
            Self::Power(v) => *v,
            Self::Switch(true) => FULL_POWER,
            Self::Switch(false) => 0.0,
        }
    }

    /// Whether the actuator is driven at all.
    pub fn is_engaged(&self) -> bool {
        self.as_power() > 0.0
    }
}

impl Default for ActuatorOutput {
    fn default() -> Self {
        Self::Power(0.0)
    }
}

impl From<Real> for ActuatorOutput {
    fn from(value: Real) -> Self {
        Self::Power(value)
    }
}

impl From<bool> for ActuatorOutput {
    fn from(on: bool) -> Self {
        Self::Switch(on)
    }
}

impl fmt::Display for ActuatorOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Power(v) => write!(f, "{v:.2}%"),
            Self::Switch(true) => write!(f, "ON"),
            Self::Switch(false) => write!(f, "OFF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_value_keeps_kind() {
        assert_eq!(ActuatorOutput::power(42.0).safe(), ActuatorOutput::Power(0.0));
        assert_eq!(ActuatorOutput::switch(true).safe(), ActuatorOutput::Switch(false));
    }

    #[test]
    fn switch_maps_to_full_power() {
        assert_eq!(ActuatorOutput::from(true).as_power(), 100.0);
        assert_eq!(ActuatorOutput::from(false).as_power(), 0.0);
        assert!(!ActuatorOutput::default().is_engaged());
        assert!(ActuatorOutput::from(0.5).is_engaged());
    }

    #[test]
    fn display() {
        assert_eq!(ActuatorOutput::power(17.5).to_string(), "17.50%");
        assert_eq!(ActuatorOutput::switch(true).to_string(), "ON");
    }
}
