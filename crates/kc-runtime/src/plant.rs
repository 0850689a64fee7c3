//! Simulated kettle for running loops offline.
//!
//! Two lumped thermal nodes, integrated with explicit Euler sub-steps:
//!
//! ```text
//! dT_e/dt = rate * p/100 - k_c (T_e - T_k) - k_e (T_e - T_a)
//! dT_k/dt = r * k_c (T_e - T_k) - k_k (T_k - T_a)
//! ```
//!
//! `T_e` is the element (or RIMS tube) node, `T_k` the kettle, `T_a` ambient
//! and `r` the element-to-kettle heat capacity ratio. A negative `rate`
//! models a chiller.
//!
//! [`SimulatedPlant`] is a shared handle that serves as measurement provider,
//! setpoint source and actuator; [`SimClock`] advances its virtual time.

use crate::clock::{Clock, Wake};
use crate::driver::LoopIo;
use crate::error::{RuntimeError, RuntimeResult};
use crate::stop::StopSignal;
use kc_controls::output::FULL_POWER;
use kc_controls::{
    Actuator, ActuatorOutput, ControlError, ControlResult, MeasurementProvider, SensorChannel,
    SetpointSource,
};
use kc_core::Real;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Largest Euler step taken when advancing the model.
pub const MAX_SUBSTEP_S: Real = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalParams {
    /// Element heating rate at full power with no losses, degrees per second.
    pub heater_rate: Real,
    /// Element-to-kettle exchange coefficient, 1/s.
    pub coupling: Real,
    /// Element heat capacity over kettle heat capacity.
    pub capacity_ratio: Real,
    /// Element-to-ambient loss coefficient, 1/s.
    pub element_loss: Real,
    /// Kettle-to-ambient loss coefficient, 1/s.
    pub kettle_loss: Real,
}

impl ThermalParams {
    /// A chiller with the same dynamics as `self`.
    pub fn cooling(mut self) -> Self {
        self.heater_rate = -self.heater_rate.abs();
        self
    }

    fn validate(&self) -> RuntimeResult<()> {
        let values = [
            ("heater_rate", self.heater_rate),
            ("coupling", self.coupling),
            ("capacity_ratio", self.capacity_ratio),
            ("element_loss", self.element_loss),
            ("kettle_loss", self.kettle_loss),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(RuntimeError::config(format!(
                    "plant parameter {name} must be finite"
                )));
            }
        }
        if self.coupling < 0.0 || self.element_loss < 0.0 || self.kettle_loss < 0.0 {
            return Err(RuntimeError::config(
                "plant exchange coefficients must be non-negative",
            ));
        }
        if self.capacity_ratio <= 0.0 {
            return Err(RuntimeError::config(
                "plant capacity ratio must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for ThermalParams {
    fn default() -> Self {
        Self {
            heater_rate: 0.5,
            coupling: 0.05,
            capacity_ratio: 0.1,
            element_loss: 0.002,
            kettle_loss: 0.0005,
        }
    }
}

/// Which node a sensor channel reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimNode {
    Element,
    Kettle,
}

/// Two-node thermal model.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalPlant {
    params: ThermalParams,
    ambient: Real,
    element: Real,
    kettle: Real,
}

impl ThermalPlant {
    /// Both nodes start at `ambient`.
    pub fn new(params: ThermalParams, ambient: Real) -> RuntimeResult<Self> {
        params.validate()?;
        if !ambient.is_finite() {
            return Err(RuntimeError::config("ambient temperature must be finite"));
        }
        Ok(Self {
            params,
            ambient,
            element: ambient,
            kettle: ambient,
        })
    }

    pub fn with_temperatures(mut self, element: Real, kettle: Real) -> Self {
        self.element = element;
        self.kettle = kettle;
        self
    }

    pub fn params(&self) -> &ThermalParams {
        &self.params
    }

    pub fn ambient(&self) -> Real {
        self.ambient
    }

    pub fn element(&self) -> Real {
        self.element
    }

    pub fn kettle(&self) -> Real {
        self.kettle
    }

    pub fn temperature(&self, node: SimNode) -> Real {
        match node {
            SimNode::Element => self.element,
            SimNode::Kettle => self.kettle,
        }
    }

    /// Node temperature derivatives at `power_pct` drive.
    pub fn derivatives(&self, power_pct: Real) -> (Real, Real) {
        let p = &self.params;
        let drive = p.heater_rate * power_pct.clamp(0.0, FULL_POWER) / FULL_POWER;
        let exchange = p.coupling * (self.element - self.kettle);
        let d_element = drive - exchange - p.element_loss * (self.element - self.ambient);
        let d_kettle = p.capacity_ratio * exchange - p.kettle_loss * (self.kettle - self.ambient);
        (d_element, d_kettle)
    }

    /// Advance by `dt` seconds with constant drive.
    pub fn step(&mut self, dt: Real, power_pct: Real) {
        let mut remaining = dt;
        while remaining > 0.0 {
            let h = remaining.min(MAX_SUBSTEP_S);
            let (d_element, d_kettle) = self.derivatives(power_pct);
            self.element += d_element * h;
            self.kettle += d_kettle * h;
            remaining -= h;
        }
    }
}

#[derive(Debug)]
struct SimState {
    plant: ThermalPlant,
    time: Real,
    horizon: Option<Real>,
    setpoint: Real,
    power: Real,
    last_output: Option<ActuatorOutput>,
    writes: usize,
    channels: HashMap<SensorChannel, SimNode>,
}

impl SimState {
    fn advance_to(&mut self, t: Real) {
        if t > self.time {
            self.plant.step(t - self.time, self.power);
            self.time = t;
        }
    }
}

/// Shared handle to a simulated plant. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlant {
    pub fn new(plant: ThermalPlant) -> Self {
        let setpoint = plant.ambient();
        Self {
            state: Arc::new(Mutex::new(SimState {
                plant,
                time: 0.0,
                horizon: None,
                setpoint,
                power: 0.0,
                last_output: None,
                writes: 0,
                channels: HashMap::new(),
            })),
        }
    }

    /// Expose `node` as sensor `channel`.
    pub fn with_channel(self, channel: impl Into<SensorChannel>, node: SimNode) -> Self {
        self.lock().channels.insert(channel.into(), node);
        self
    }

    /// Stop virtual time at `seconds`; sleeping past it reports a stop.
    pub fn with_horizon(self, seconds: Real) -> Self {
        self.lock().horizon = Some(seconds);
        self
    }

    pub fn with_setpoint(self, setpoint: Real) -> Self {
        self.set_setpoint(setpoint);
        self
    }

    pub fn set_setpoint(&self, setpoint: Real) {
        self.lock().setpoint = setpoint;
    }

    pub fn time(&self) -> Real {
        self.lock().time
    }

    pub fn plant(&self) -> ThermalPlant {
        self.lock().plant.clone()
    }

    pub fn power(&self) -> Real {
        self.lock().power
    }

    pub fn last_output(&self) -> Option<ActuatorOutput> {
        self.lock().last_output
    }

    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            state: Arc::clone(&self.state),
        }
    }

    /// Measurement, setpoint and actuator all backed by this plant.
    pub fn io(&self) -> LoopIo {
        LoopIo::new(self.clone(), self.clone(), self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MeasurementProvider for SimulatedPlant {
    fn read_measured_value(&self, channel: &SensorChannel) -> ControlResult<Real> {
        let state = self.lock();
        let node = state
            .channels
            .get(channel)
            .ok_or_else(|| ControlError::MissingSensor {
                channel: channel.to_string(),
            })?;
        Ok(state.plant.temperature(*node))
    }
}

impl SetpointSource for SimulatedPlant {
    fn read_setpoint(&self) -> ControlResult<Real> {
        Ok(self.lock().setpoint)
    }
}

impl Actuator for SimulatedPlant {
    fn write_output(&mut self, output: ActuatorOutput) -> ControlResult<()> {
        let mut state = self.lock();
        state.power = output.as_power().clamp(0.0, FULL_POWER);
        state.last_output = Some(output);
        state.writes += 1;
        Ok(())
    }
}

/// Virtual time of a [`SimulatedPlant`]. Sleeping advances the model.
#[derive(Debug, Clone)]
pub struct SimClock {
    state: Arc<Mutex<SimState>>,
}

impl Clock for SimClock {
    fn now(&self) -> Real {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .time
    }

    fn sleep_until(&mut self, deadline: Real, stop: &StopSignal) -> Wake {
        if stop.is_stopped() {
            return Wake::Stopped;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.horizon {
            Some(horizon) if deadline > horizon => {
                state.advance_to(horizon);
                Wake::Stopped
            }
            _ => {
                state.advance_to(deadline);
                Wake::Elapsed
            }
        }
    }
}
