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

//! Prometheus metrics exporter for Nest thermostats and OpenWeatherMap
//!
//! ## Features
//!
//! `nest_exporter` fetches the state of all thermostats accessible with a [Nest API] token and,
//! optionally, the current weather for a location from the [OpenWeatherMap API] and emits them
//! as Prometheus metrics. Both APIs are queried each time the exporter is scraped, there is no
//! background polling. If either API fails or does not respond within the configured timeout,
//! the scrape fails with an HTTP 500 response.
//!
//! Temperatures are reported in celsius by default or fahrenheit when `--temperature-unit
//! fahrenheit` is used. The following metrics are emitted when available.
//!
//! * `nest_thermostat_ambient_temperature_degrees{id=$ID, name=$NAME}` - Inside temperature.
//! * `nest_thermostat_target_temperature_degrees{id=$ID, name=$NAME}` - Target temperature.
//! * `nest_thermostat_humidity_percent{id=$ID, name=$NAME}` - Inside relative humidity (0-100).
//! * `nest_thermostat_heating{id=$ID, name=$NAME}` - 1 if the thermostat is heating, 0 otherwise.
//! * `nest_thermostat_leaf{id=$ID, name=$NAME}` - 1 if energy saving mode is on, 0 otherwise.
//! * `nest_thermostat_online{id=$ID, name=$NAME}` - 1 if the thermostat is online, 0 otherwise.
//! * `nest_weather_temperature_degrees{location_id=$LOC, location=$NAME}` - Outside temperature.
//! * `nest_weather_humidity_percent{location_id=$LOC, location=$NAME}` - Outside relative humidity.
//! * `nest_weather_pressure_hectopascals{location_id=$LOC, location=$NAME}` - Outside pressure.
//! * `nest_weather_condition{location_id=$LOC, location=$NAME, description=$DESC}` - Current
//!   weather conditions, e.g. "light rain".
//!
//! [Nest API]: https://developers.nest.com/
//! [OpenWeatherMap API]: https://openweathermap.org/current
//!
//! ## Build
//!
//! `nest_exporter` is a Rust program and must be built from source using a [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/nest_exporter.git && cd nest_exporter
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! A Nest API token is required. Weather metrics are only collected if an OpenWeatherMap token
//! is also provided. Every flag can be set with an environment variable prefixed with
//! `PRONESTHEUS_` instead.
//!
//! ```text
//! ./nest_exporter --nest-api-token $NEST_TOKEN --weather-api-token $OWM_TOKEN --weather-api-location-id 2759794
//! ```
//!
//! or
//!
//! ```text
//! PRONESTHEUS_NEST_API_TOKEN=$NEST_TOKEN ./nest_exporter --temperature-unit fahrenheit
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9999` at `/metrics` by default. Add the host running
//! `nest_exporter` as a target under the Prometheus `scrape_configs` section. Since each scrape
//! makes requests to both APIs, use a scrape timeout longer than `--scrape-timeout`.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: nest_exporter
//!   scrape_interval: 60s
//!   static_configs:
//!   - targets: ['example:9999']
//! ```
//!

pub mod client;
pub mod config;
pub mod http;
pub mod metrics;
pub mod units;
