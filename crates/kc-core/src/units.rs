// kc-core/src/units.rs

use crate::numeric::{Real, round_to};
use uom::si::f64::{
    TemperatureInterval as UomTemperatureInterval,
    ThermodynamicTemperature as UomThermodynamicTemperature,
};

pub type TempInterval = UomTemperatureInterval;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn celsius(v: Real) -> Temperature {
    use uom::si::thermodynamic_temperature::degree_celsius;
    Temperature::new::<degree_celsius>(v)
}

#[inline]
pub fn fahrenheit(v: Real) -> Temperature {
    use uom::si::thermodynamic_temperature::degree_fahrenheit;
    Temperature::new::<degree_fahrenheit>(v)
}

#[inline]
pub fn celsius_interval(v: Real) -> TempInterval {
    use uom::si::temperature_interval::degree_celsius;
    TempInterval::new::<degree_celsius>(v)
}

/// Unit system a plant is configured in.
///
/// Only bounds and defaults depend on it; controllers operate on plain
/// numbers in whatever unit the sensors report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }

    /// Build a temperature from a value expressed in this unit.
    pub fn temperature(self, v: Real) -> Temperature {
        match self {
            Self::Celsius => celsius(v),
            Self::Fahrenheit => fahrenheit(v),
        }
    }

    /// Express a temperature in this unit.
    pub fn value_of(self, t: Temperature) -> Real {
        use uom::si::thermodynamic_temperature::{degree_celsius, degree_fahrenheit};
        match self {
            Self::Celsius => t.get::<degree_celsius>(),
            Self::Fahrenheit => t.get::<degree_fahrenheit>(),
        }
    }

    /// Express a temperature difference in this unit.
    pub fn interval_value_of(self, dt: TempInterval) -> Real {
        use uom::si::temperature_interval::{degree_celsius, degree_fahrenheit};
        match self {
            Self::Celsius => dt.get::<degree_celsius>(),
            Self::Fahrenheit => dt.get::<degree_fahrenheit>(),
        }
    }

    /// Freezing point of water; the floor of an outer-loop setpoint.
    pub fn freezing_point(self) -> Real {
        round_to(self.value_of(celsius(0.0)), 9)
    }

    /// Size of one Celsius degree in this unit (1.0 or 1.8).
    pub fn celsius_degree(self) -> Real {
        round_to(self.interval_value_of(celsius_interval(1.0)), 9)
    }

    /// Default ceiling for a setpoint computed by an outer loop.
    pub fn default_max_setpoint(self) -> Real {
        match self {
            Self::Celsius => 75.0,
            Self::Fahrenheit => 168.0,
        }
    }
}

/// Convert a temperature value between unit systems.
pub fn convert_temperature(v: Real, from: TemperatureUnit, to: TemperatureUnit) -> Real {
    if from == to {
        return v;
    }
    to.value_of(from.temperature(v))
}
