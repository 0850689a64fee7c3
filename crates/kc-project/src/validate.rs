//! Plant validation logic.
//!
//! Everything that would stop a loop from starting is rejected here, before
//! any actuator is touched.

use crate::schema::{ControllerDef, HysteresisDef, LoopDef, PidDef, Plant};
use std::collections::HashSet;

/// Smallest usable output ceiling, in percent.
pub const MIN_MAX_OUTPUT_PCT: f64 = 5.0;

/// Most decimal places an output may be rounded to.
pub const MAX_PRECISION: u32 = 9;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Loop {loop_id}: an inner sensor must be selected")]
    MissingInnerSensor { loop_id: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_plant(plant: &Plant) -> Result<(), ValidationError> {
    if plant.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: plant.version,
        });
    }

    let mut sensor_ids = HashSet::new();
    for sensor in &plant.sensors {
        if !sensor_ids.insert(sensor.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: sensor.id.clone(),
                context: "sensors".to_string(),
            });
        }
    }

    let mut loop_ids = HashSet::new();
    for def in &plant.loops {
        if !loop_ids.insert(def.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: def.id.clone(),
                context: "loops".to_string(),
            });
        }
        validate_loop(plant, def, &sensor_ids)?;
    }

    Ok(())
}

fn validate_loop(
    plant: &Plant,
    def: &LoopDef,
    sensor_ids: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let ctx = |field: &str| format!("loops.{}.{}", def.id, field);

    if !sensor_ids.contains(def.sensor.as_str()) {
        return Err(ValidationError::MissingReference {
            id: def.sensor.clone(),
            context: ctx("sensor"),
        });
    }

    positive(&ctx("update_interval_s"), def.update_interval_s)?;
    positive(&ctx("notification_timeout_ms"), def.notification_timeout_ms)?;
    if let Some(places) = def.precision
        && places > MAX_PRECISION
    {
        return Err(ValidationError::InvalidValue {
            field: ctx("precision"),
            value: places.to_string(),
            reason: format!("must be at most {MAX_PRECISION}"),
        });
    }

    if let Some(inner) = def.inner_sensor() {
        if inner.trim().is_empty() {
            return Err(ValidationError::MissingInnerSensor {
                loop_id: def.id.clone(),
            });
        }
        if !sensor_ids.contains(inner) {
            return Err(ValidationError::MissingReference {
                id: inner.to_string(),
                context: ctx("controller.inner_sensor"),
            });
        }
    }

    match &def.controller {
        ControllerDef::Pid {
            pid,
            max_output_pct,
        } => {
            validate_pid(&ctx("controller"), pid)?;
            validate_max_output(&ctx("controller.max_output_pct"), *max_output_pct)?;
        }
        ControllerDef::CascadePid {
            inner,
            outer,
            max_inner_setpoint,
            max_output_pct,
            ..
        } => {
            validate_pid(&ctx("controller.inner"), inner)?;
            validate_pid(&ctx("controller.outer"), outer)?;
            validate_max_setpoint(
                plant,
                &ctx("controller.max_inner_setpoint"),
                *max_inner_setpoint,
            )?;
            validate_max_output(&ctx("controller.max_output_pct"), *max_output_pct)?;
        }
        ControllerDef::Hysteresis { hysteresis } => {
            validate_hysteresis(&ctx("controller"), hysteresis)?;
        }
        ControllerDef::CascadeHysteresis {
            outer,
            max_setpoint,
            hysteresis,
            ..
        } => {
            validate_pid(&ctx("controller.outer"), outer)?;
            validate_max_setpoint(plant, &ctx("controller.max_setpoint"), *max_setpoint)?;
            validate_hysteresis(&ctx("controller.hysteresis"), hysteresis)?;
        }
    }

    Ok(())
}

fn validate_pid(prefix: &str, pid: &PidDef) -> Result<(), ValidationError> {
    finite(&format!("{prefix}.kp"), pid.kp)?;
    finite(&format!("{prefix}.ki"), pid.ki)?;
    finite(&format!("{prefix}.kd"), pid.kd)?;
    finite(&format!("{prefix}.integrator_initial"), pid.integrator_initial)?;
    if let Some(limit) = pid.integrator_error_limit {
        let field = format!("{prefix}.integrator_error_limit");
        finite(&field, limit)?;
        if limit < 0.0 {
            return Err(invalid(&field, limit, "must be non-negative"));
        }
    }
    Ok(())
}

fn validate_max_output(field: &str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value < MIN_MAX_OUTPUT_PCT {
        return Err(invalid(field, value, "max output must be at least 5%"));
    }
    Ok(())
}

fn validate_max_setpoint(
    plant: &Plant,
    field: &str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        finite(field, value)?;
        let floor = plant.unit.freezing_point();
        if value <= floor {
            return Err(invalid(
                field,
                value,
                &format!("must be above {floor:.0}{}", plant.unit.symbol()),
            ));
        }
    }
    Ok(())
}

fn validate_hysteresis(prefix: &str, h: &HysteresisDef) -> Result<(), ValidationError> {
    positive(&format!("{prefix}.on_min_s"), h.on_min_s)?;
    positive(&format!("{prefix}.on_max_s"), h.on_max_s)?;
    if h.on_min_s >= h.on_max_s {
        return Err(invalid(
            &format!("{prefix}.on_max_s"),
            h.on_max_s,
            "maximum on time must be greater than the minimum on time",
        ));
    }
    positive(&format!("{prefix}.off_min_s"), h.off_min_s)?;
    Ok(())
}

fn finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite"))
    }
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value <= 0.0 {
        return Err(invalid(field, value, "must be positive"));
    }
    Ok(())
}

fn invalid(field: &str, value: f64, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
