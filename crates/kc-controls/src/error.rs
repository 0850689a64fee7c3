//! Error types for control operations.

use kc_core::KcError;
use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Controller parameters that cannot form a valid controller.
    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    /// A sensor channel was required but not available.
    #[error("Missing sensor: {channel}")]
    MissingSensor { channel: String },

    /// A sensor, setpoint source or actuator failed.
    #[error("Collaborator error: {what}")]
    Collaborator { what: String },
}

impl From<KcError> for ControlError {
    fn from(e: KcError) -> Self {
        ControlError::InvalidConfig {
            what: e.to_string(),
        }
    }
}
