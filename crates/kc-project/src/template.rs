//! Starter plant with one loop of every controller kind.

use crate::migrate::LATEST_VERSION;
use crate::schema::*;
use kc_core::TemperatureUnit;

pub fn plant_template(unit: TemperatureUnit) -> Plant {
    let sensor = |id: &str, name: &str| SensorDef {
        id: id.to_string(),
        name: name.to_string(),
    };
    let control_loop = |id: &str, name: &str, sensor: &str, controller: ControllerDef| LoopDef {
        id: id.to_string(),
        name: name.to_string(),
        sensor: sensor.to_string(),
        update_interval_s: default_update_interval_s(),
        notification_timeout_ms: default_notification_timeout_ms(),
        overrun_policy: OverrunPolicyDef::Warn,
        precision: default_precision(),
        controller,
    };

    Plant {
        version: LATEST_VERSION,
        name: "Brewhouse".to_string(),
        unit,
        sensors: vec![
            sensor("hlt", "Hot liquor tank"),
            sensor("mash", "Mash tun"),
            sensor("rims", "RIMS tube"),
            sensor("fermenter", "Fermenter"),
            sensor("glycol", "Glycol jacket"),
        ],
        loops: vec![
            control_loop(
                "hlt",
                "Hot liquor tank",
                "hlt",
                ControllerDef::Pid {
                    pid: PidDef::single_default(),
                    max_output_pct: default_max_output_pct(),
                },
            ),
            control_loop(
                "mash",
                "Mash temperature",
                "mash",
                ControllerDef::CascadePid {
                    inner_sensor: "rims".to_string(),
                    inner: PidDef::inner_default(),
                    outer: PidDef::outer_default(),
                    max_inner_setpoint: Some(unit.default_max_setpoint()),
                    max_output_pct: default_max_output_pct(),
                },
            ),
            control_loop(
                "chiller",
                "Fermenter chiller",
                "fermenter",
                ControllerDef::Hysteresis {
                    hysteresis: HysteresisDef {
                        action: ActionDef::Negative,
                        ..HysteresisDef::default()
                    },
                },
            ),
            control_loop(
                "mash_element",
                "Mash element (on/off)",
                "mash",
                ControllerDef::CascadeHysteresis {
                    inner_sensor: "rims".to_string(),
                    outer: PidDef::single_default(),
                    max_setpoint: Some(unit.default_max_setpoint()),
                    hysteresis: HysteresisDef::default(),
                },
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_plant;

    #[test]
    fn template_is_valid_in_both_units() {
        validate_plant(&plant_template(TemperatureUnit::Celsius)).unwrap();
        validate_plant(&plant_template(TemperatureUnit::Fahrenheit)).unwrap();
    }

    #[test]
    fn template_covers_every_controller_kind() {
        let plant = plant_template(TemperatureUnit::Celsius);
        let kinds: Vec<_> = plant.loops.iter().map(|l| l.controller.kind_name()).collect();
        assert_eq!(
            kinds,
            vec!["PID", "Cascade PID", "Hysteresis", "Cascade hysteresis"]
        );
    }
}
