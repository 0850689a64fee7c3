//! Plant configuration schema.
//!
//! A plant file lists the sensors available to the controller and the
//! control loops that run against them:
//!
//! ```yaml
//! version: 1
//! name: Brewhouse
//! unit: celsius
//! sensors:
//!   - id: mash
//!     name: Mash tun
//!   - id: rims
//!     name: RIMS tube
//! loops:
//!   - id: mash
//!     name: Mash temperature
//!     sensor: mash
//!     update_interval_s: 2.5
//!     controller:
//!       type: CascadePid
//!       inner_sensor: rims
//!       inner: { kp: 5.0, ki: 0.25, kd: 0.0 }
//!       outer: { kp: 5.0, ki: 2.0, kd: 1.0 }
//!       max_inner_setpoint: 75.0
//! ```

use kc_core::TemperatureUnit;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plant {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub unit: TemperatureUnit,
    #[serde(default)]
    pub sensors: Vec<SensorDef>,
    #[serde(default)]
    pub loops: Vec<LoopDef>,
}

impl Plant {
    pub fn find_loop(&self, id: &str) -> Option<&LoopDef> {
        self.loops.iter().find(|l| l.id == id)
    }

    pub fn find_sensor(&self, id: &str) -> Option<&SensorDef> {
        self.sensors.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorDef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopDef {
    pub id: String,
    pub name: String,
    /// Sensor compared against the setpoint.
    pub sensor: String,
    #[serde(default = "default_update_interval_s")]
    pub update_interval_s: f64,
    /// How long an operator-facing warning stays visible.
    #[serde(default = "default_notification_timeout_ms")]
    pub notification_timeout_ms: f64,
    #[serde(default)]
    pub overrun_policy: OverrunPolicyDef,
    /// Decimal places for the inner setpoint and analog output.
    #[serde(default = "default_precision")]
    pub precision: Option<u32>,
    pub controller: ControllerDef,
}

impl LoopDef {
    /// Sensor feeding the inner stage, for cascaded controllers.
    pub fn inner_sensor(&self) -> Option<&str> {
        match &self.controller {
            ControllerDef::CascadePid { inner_sensor, .. }
            | ControllerDef::CascadeHysteresis { inner_sensor, .. } => Some(inner_sensor),
            _ => None,
        }
    }
}

/// What to do when a cycle cannot finish within its update interval.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverrunPolicyDef {
    /// Report a warning and keep running.
    #[default]
    Warn,
    /// Report a fatal error and stop the loop.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ControllerDef {
    Pid {
        #[serde(flatten)]
        pid: PidDef,
        #[serde(default = "default_max_output_pct")]
        max_output_pct: f64,
    },
    CascadePid {
        inner_sensor: String,
        inner: PidDef,
        outer: PidDef,
        /// Highest target the outer loop may hand to the inner loop.
        /// Defaults to the unit system's ceiling.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_inner_setpoint: Option<f64>,
        #[serde(default = "default_max_output_pct")]
        max_output_pct: f64,
    },
    Hysteresis {
        #[serde(flatten)]
        hysteresis: HysteresisDef,
    },
    CascadeHysteresis {
        inner_sensor: String,
        outer: PidDef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_setpoint: Option<f64>,
        hysteresis: HysteresisDef,
    },
}

impl ControllerDef {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Pid { .. } => "PID",
            Self::CascadePid { .. } => "Cascade PID",
            Self::Hysteresis { .. } => "Hysteresis",
            Self::CascadeHysteresis { .. } => "Cascade hysteresis",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PidDef {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    #[serde(default)]
    pub integrator_initial: f64,
    /// Clamp on the error fed to the integrator. Derived from the unit
    /// system when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrator_error_limit: Option<f64>,
}

impl PidDef {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integrator_initial: 0.0,
            integrator_error_limit: None,
        }
    }

    /// Gains for a single-stage kettle loop.
    pub fn single_default() -> Self {
        Self::new(10.0, 2.0, 1.0)
    }

    /// Gains for the inner stage of a cascade.
    pub fn inner_default() -> Self {
        Self::new(5.0, 0.25, 0.0)
    }

    /// Gains for the outer stage of a cascade.
    pub fn outer_default() -> Self {
        Self::new(5.0, 2.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionDef {
    /// On below the setpoint (heating).
    #[default]
    Positive,
    /// On above the setpoint (cooling).
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HysteresisDef {
    #[serde(default)]
    pub action: ActionDef,
    #[serde(default = "default_on_min_s")]
    pub on_min_s: f64,
    #[serde(default = "default_on_max_s")]
    pub on_max_s: f64,
    #[serde(default = "default_off_min_s")]
    pub off_min_s: f64,
}

impl Default for HysteresisDef {
    fn default() -> Self {
        Self {
            action: ActionDef::default(),
            on_min_s: default_on_min_s(),
            on_max_s: default_on_max_s(),
            off_min_s: default_off_min_s(),
        }
    }
}

pub fn default_update_interval_s() -> f64 {
    2.5
}

pub fn default_notification_timeout_ms() -> f64 {
    5000.0
}

pub fn default_precision() -> Option<u32> {
    Some(2)
}

pub fn default_max_output_pct() -> f64 {
    100.0
}

fn default_on_min_s() -> f64 {
    45.0
}

fn default_on_max_s() -> f64 {
    1800.0
}

fn default_off_min_s() -> f64 {
    90.0
}
