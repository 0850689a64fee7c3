//! Error types for running control loops.

use kc_controls::ControlError;
use kc_project::{ProjectError, ValidationError};
use thiserror::Error;

/// Errors that end a loop or prevent it from starting.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Loop {loop_id}: update interval of {interval_s}s is too short")]
    Overrun { loop_id: String, interval_s: f64 },

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    #[error("Loop {loop_id}: {message}")]
    Thread { loop_id: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl RuntimeError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for RuntimeError {
    fn from(e: ValidationError) -> Self {
        Self::config(e.to_string())
    }
}
