// nest_exporter - Prometheus metrics exporter for Nest thermostats
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::client::{Conditions, HvacState, Thermostat};
use crate::units::TemperatureUnit;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

pub const NAMESPACE: &str = "nest";

type GaugeFamily<L> = Family<L, Gauge<f64, AtomicU64>>;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ThermostatLabels {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LocationLabels {
    pub location_id: String,
    pub location: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ConditionLabels {
    pub location_id: String,
    pub location: String,
    pub description: String,
}

/// Holder for metrics that can be set from thermostat state.
///
/// All metrics are created and registered upon call to `ThermostatMetrics::new()`. Metrics
/// share the prefix of the registry they are registered with and have `id` and `name`
/// labels identifying the thermostat.
#[derive(Debug)]
pub struct ThermostatMetrics {
    unit: TemperatureUnit,
    ambient_temperature: GaugeFamily<ThermostatLabels>,
    target_temperature: GaugeFamily<ThermostatLabels>,
    humidity: GaugeFamily<ThermostatLabels>,
    heating: GaugeFamily<ThermostatLabels>,
    leaf: GaugeFamily<ThermostatLabels>,
    online: GaugeFamily<ThermostatLabels>,
}

impl ThermostatMetrics {
    pub fn new(reg: &mut Registry, unit: TemperatureUnit) -> Self {
        let ambient_temperature = GaugeFamily::<ThermostatLabels>::default();
        let target_temperature = GaugeFamily::<ThermostatLabels>::default();
        let humidity = GaugeFamily::<ThermostatLabels>::default();
        let heating = GaugeFamily::<ThermostatLabels>::default();
        let leaf = GaugeFamily::<ThermostatLabels>::default();
        let online = GaugeFamily::<ThermostatLabels>::default();

        reg.register(
            "thermostat_ambient_temperature_degrees",
            format!("Inside temperature in {}", unit),
            ambient_temperature.clone(),
        );
        reg.register(
            "thermostat_target_temperature_degrees",
            format!("Target temperature in {}", unit),
            target_temperature.clone(),
        );
        reg.register("thermostat_humidity_percent", "Inside relative humidity (0-100)", humidity.clone());
        reg.register("thermostat_heating", "Is the thermostat heating (0 or 1)", heating.clone());
        reg.register("thermostat_leaf", "Is the thermostat in energy saving mode (0 or 1)", leaf.clone());
        reg.register("thermostat_online", "Is the thermostat online (0 or 1)", online.clone());

        Self {
            unit,
            ambient_temperature,
            target_temperature,
            humidity,
            heating,
            leaf,
            online,
        }
    }

    /// Set metrics for each of the provided thermostats.
    ///
    /// Temperatures and humidity missing from the API response are not set.
    pub fn observe(&self, thermostats: &[Thermostat]) {
        for t in thermostats {
            let labels = ThermostatLabels {
                id: t.device_id.clone(),
                name: t.name.clone(),
            };

            if let Some(v) = t.ambient_temperature {
                self.ambient_temperature.get_or_create(&labels).set(self.unit.from_celsius(v));
            }
            if let Some(v) = t.target_temperature {
                self.target_temperature.get_or_create(&labels).set(self.unit.from_celsius(v));
            }
            if let Some(v) = t.humidity {
                self.humidity.get_or_create(&labels).set(v);
            }

            self.heating
                .get_or_create(&labels)
                .set(as_gauge(t.hvac_state == HvacState::Heating));
            self.leaf.get_or_create(&labels).set(as_gauge(t.has_leaf));
            self.online.get_or_create(&labels).set(as_gauge(t.is_online));
        }
    }
}

/// Holder for metrics that can be set from current weather conditions.
#[derive(Debug)]
pub struct WeatherMetrics {
    unit: TemperatureUnit,
    temperature: GaugeFamily<LocationLabels>,
    humidity: GaugeFamily<LocationLabels>,
    pressure: GaugeFamily<LocationLabels>,
    condition: GaugeFamily<ConditionLabels>,
}

impl WeatherMetrics {
    pub fn new(reg: &mut Registry, unit: TemperatureUnit) -> Self {
        let temperature = GaugeFamily::<LocationLabels>::default();
        let humidity = GaugeFamily::<LocationLabels>::default();
        let pressure = GaugeFamily::<LocationLabels>::default();
        let condition = GaugeFamily::<ConditionLabels>::default();

        reg.register(
            "weather_temperature_degrees",
            format!("Outside temperature in {}", unit),
            temperature.clone(),
        );
        reg.register("weather_humidity_percent", "Outside relative humidity (0-100)", humidity.clone());
        reg.register("weather_pressure_hectopascals", "Outside pressure in hectopascals", pressure.clone());
        reg.register("weather_condition", "Current weather conditions, one per description", condition.clone());

        Self {
            unit,
            temperature,
            humidity,
            pressure,
            condition,
        }
    }

    /// Set metrics from the provided conditions if the relevant value exists.
    pub fn observe(&self, conditions: &Conditions) {
        let labels = LocationLabels {
            location_id: conditions.location_id.to_string(),
            location: conditions.location.clone(),
        };

        if let Some(v) = conditions.main.temperature {
            self.temperature.get_or_create(&labels).set(self.unit.from_celsius(v));
        }
        if let Some(v) = conditions.main.humidity {
            self.humidity.get_or_create(&labels).set(v);
        }
        if let Some(v) = conditions.main.pressure {
            self.pressure.get_or_create(&labels).set(v);
        }

        for w in &conditions.weather {
            self.condition
                .get_or_create(&ConditionLabels {
                    location_id: labels.location_id.clone(),
                    location: labels.location.clone(),
                    description: w.description.clone(),
                })
                .set(1.0);
        }
    }
}

fn as_gauge(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
