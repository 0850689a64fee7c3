//! Compilation of loop definitions into runnable loops.

use kc_controls::output::FULL_POWER;
use kc_controls::{Cascade, DwellTimes, Hysteresis, Pid, PidGains, Polarity, SampleConfig};
use kc_core::{Real, TemperatureUnit};
use kc_project::schema::{ActionDef, ControllerDef, HysteresisDef, LoopDef, PidDef, Plant};
use kc_project::validate_plant;

use crate::clock::Clock;
use crate::driver::{ControlLoop, LoopIo, LoopSettings};
use crate::error::{RuntimeError, RuntimeResult};
use crate::report::TracingReporter;

/// Integrator error clamp of a PID that drives the actuator directly.
pub const DRIVE_ERROR_LIMIT: Real = 1.0;

/// Build the controller for `def`.
///
/// `now` is the start of the hysteresis warm-up window.
pub fn compile_cascade(unit: TemperatureUnit, def: &LoopDef, now: Real) -> RuntimeResult<Cascade> {
    let cascade = match &def.controller {
        ControllerDef::Pid {
            pid,
            max_output_pct,
        } => Cascade::single(drive_pid(pid, *max_output_pct)?),
        ControllerDef::CascadePid {
            inner,
            outer,
            max_inner_setpoint,
            max_output_pct,
            ..
        } => Cascade::new(
            setpoint_pid(unit, outer, *max_inner_setpoint)?,
            drive_pid(inner, *max_output_pct)?,
        ),
        ControllerDef::Hysteresis { hysteresis } => {
            Cascade::single(hysteresis_stage(hysteresis, now)?)
        }
        ControllerDef::CascadeHysteresis {
            outer,
            max_setpoint,
            hysteresis,
            ..
        } => Cascade::new(
            setpoint_pid(unit, outer, *max_setpoint)?,
            hysteresis_stage(hysteresis, now)?,
        ),
    };

    Ok(match def.precision {
        Some(places) => cascade.with_precision(places),
        None => cascade,
    })
}

/// Timing and sensor wiring of `def`.
pub fn compile_settings(def: &LoopDef) -> RuntimeResult<LoopSettings> {
    let sample = SampleConfig::new(def.update_interval_s)?;
    let mut settings = LoopSettings::new(sample, def.sensor.as_str())
        .with_overrun_policy(def.overrun_policy.into());
    if let Some(inner) = def.inner_sensor() {
        settings = settings.with_inner_sensor(inner);
    }
    Ok(settings)
}

/// Validate `plant` and bind loop `loop_id` to its collaborators.
///
/// Notifications go to a [`TracingReporter`] carrying the loop's
/// notification timeout.
pub fn compile_loop(
    plant: &Plant,
    loop_id: &str,
    io: LoopIo,
    clock: Box<dyn Clock + Send>,
) -> RuntimeResult<ControlLoop> {
    validate_plant(plant)?;
    let def = plant
        .find_loop(loop_id)
        .ok_or_else(|| RuntimeError::config(format!("unknown loop: {loop_id}")))?;

    let cascade = compile_cascade(plant.unit, def, clock.now())?;
    let settings = compile_settings(def)?;
    tracing::debug!(
        loop_id,
        kind = def.controller.kind_name(),
        interval_s = def.update_interval_s,
        "Compiled loop"
    );

    let reporter = TracingReporter::new(def.id.clone(), def.notification_timeout_ms);
    Ok(ControlLoop::new(def.id.clone(), settings, cascade, io, clock)?.with_reporter(reporter))
}

fn gains(def: &PidDef) -> PidGains {
    PidGains::new(def.kp, def.ki, def.kd)
}

/// PID producing the actuator drive, in percent.
fn drive_pid(def: &PidDef, max_output_pct: Real) -> RuntimeResult<Pid> {
    let pid = Pid::new(gains(def), 0.0, max_output_pct.min(FULL_POWER))?
        .with_integrator_error_limit(def.integrator_error_limit.unwrap_or(DRIVE_ERROR_LIMIT))?
        .with_integrator(def.integrator_initial);
    Ok(pid)
}

/// PID producing the inner setpoint of a cascade.
///
/// Its range starts at the freezing point, and its integrator error clamp is
/// one Celsius degree in the plant's unit.
fn setpoint_pid(
    unit: TemperatureUnit,
    def: &PidDef,
    max_setpoint: Option<Real>,
) -> RuntimeResult<Pid> {
    let max = max_setpoint.unwrap_or_else(|| unit.default_max_setpoint());
    let limit = def
        .integrator_error_limit
        .unwrap_or_else(|| unit.celsius_degree());
    let pid = Pid::new(gains(def), unit.freezing_point(), max)?
        .with_integrator_error_limit(limit)?
        .with_integrator(def.integrator_initial);
    Ok(pid)
}

fn hysteresis_stage(def: &HysteresisDef, now: Real) -> RuntimeResult<Hysteresis> {
    let dwell = DwellTimes::new(def.on_min_s, def.on_max_s, def.off_min_s)?;
    let polarity = match def.action {
        ActionDef::Positive => Polarity::Positive,
        ActionDef::Negative => Polarity::Negative,
    };
    Ok(Hysteresis::new(polarity, dwell, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_controls::InnerStage;
    use kc_project::plant_template;

    fn loop_def(plant: &Plant, id: &str) -> LoopDef {
        plant.find_loop(id).unwrap().clone()
    }

    #[test]
    fn single_pid_caps_output() {
        let plant = plant_template(TemperatureUnit::Celsius);
        let mut def = loop_def(&plant, "hlt");
        if let ControllerDef::Pid { max_output_pct, .. } = &mut def.controller {
            *max_output_pct = 250.0;
        }
        let cascade = compile_cascade(plant.unit, &def, 0.0).unwrap();
        assert!(!cascade.is_cascaded());
        match cascade.inner() {
            InnerStage::Pid(pid) => {
                assert_eq!(pid.output_min(), 0.0);
                assert_eq!(pid.output_max(), 100.0);
                assert_eq!(pid.integrator_error_limit(), Some(1.0));
            }
            other => panic!("Expected PID, got {other:?}"),
        }
        assert_eq!(cascade.precision(), Some(2));
    }

    #[test]
    fn cascade_outer_range_follows_unit() {
        let celsius = plant_template(TemperatureUnit::Celsius);
        let cascade = compile_cascade(celsius.unit, &loop_def(&celsius, "mash"), 0.0).unwrap();
        let outer = cascade.outer().unwrap();
        assert_eq!(outer.output_min(), 0.0);
        assert_eq!(outer.output_max(), 75.0);
        assert_eq!(outer.integrator_error_limit(), Some(1.0));

        let fahrenheit = plant_template(TemperatureUnit::Fahrenheit);
        let cascade =
            compile_cascade(fahrenheit.unit, &loop_def(&fahrenheit, "mash"), 0.0).unwrap();
        let outer = cascade.outer().unwrap();
        assert_eq!(outer.output_min(), 32.0);
        assert_eq!(outer.output_max(), 168.0);
        assert_eq!(outer.integrator_error_limit(), Some(1.8));
    }

    #[test]
    fn hysteresis_warm_up_starts_at_compile_time() {
        let plant = plant_template(TemperatureUnit::Celsius);
        let cascade = compile_cascade(plant.unit, &loop_def(&plant, "chiller"), 42.0).unwrap();
        match cascade.inner() {
            InnerStage::Hysteresis(h) => {
                assert_eq!(h.last_transition_time(), 42.0);
                assert_eq!(h.polarity(), Polarity::Negative);
            }
            other => panic!("Expected hysteresis, got {other:?}"),
        }
    }

    #[test]
    fn settings_carry_inner_sensor() {
        let plant = plant_template(TemperatureUnit::Celsius);
        let settings = compile_settings(&loop_def(&plant, "mash")).unwrap();
        assert_eq!(settings.inner_sensor.as_ref().map(|c| c.as_str()), Some("rims"));
        assert_eq!(settings.sample.update_interval, 2.5);

        let settings = compile_settings(&loop_def(&plant, "hlt")).unwrap();
        assert!(settings.inner_sensor.is_none());
    }

    #[test]
    fn precision_can_be_disabled() {
        let plant = plant_template(TemperatureUnit::Celsius);
        let mut def = loop_def(&plant, "hlt");
        def.precision = None;
        let cascade = compile_cascade(plant.unit, &def, 0.0).unwrap();
        assert_eq!(cascade.precision(), None);
    }
}
