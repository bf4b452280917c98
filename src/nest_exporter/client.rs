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

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error;
use std::fmt;

const USER_AGENT_VALUE: &str = "Nest Prometheus Exporter (https://github.com/56quarters/nest_exporter)";
const JSON_RESPONSE: &str = "application/json";

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    Unexpected(StatusCode, Url),
}

impl ClientError {
    /// True if the upstream API did not respond within the configured timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Internal(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        // Requests to the weather API carry the token in the query string.
        ClientError::Internal(e.without_url())
    }
}

/// Client for the Nest thermostats API.
#[derive(Debug, Clone)]
pub struct NestClient {
    client: Client,
    url: Url,
    token: String,
}

impl NestClient {
    pub fn new(client: Client, url: Url, token: impl Into<String>) -> Self {
        NestClient {
            client,
            url,
            token: token.into(),
        }
    }

    /// Fetch the current state of every thermostat the token has access to, ordered by device ID.
    pub async fn thermostats(&self) -> Result<Vec<Thermostat>, ClientError> {
        tracing::debug!(message = "making thermostats request", url = %self.url);

        let res = make_request(&self.client, self.url.clone(), &self.token).await?;
        let devices = res.json::<BTreeMap<String, Thermostat>>().await?;
        Ok(devices
            .into_iter()
            .map(|(id, mut t)| {
                if t.device_id.is_empty() {
                    t.device_id = id;
                }
                t
            })
            .collect())
    }
}

/// Client for the OpenWeatherMap current weather API.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    url: Url,
    token: String,
    location_id: String,
}

impl WeatherClient {
    pub fn new(client: Client, url: Url, token: impl Into<String>, location_id: impl Into<String>) -> Self {
        WeatherClient {
            client,
            url,
            token: token.into(),
            location_id: location_id.into(),
        }
    }

    /// Fetch current conditions for the configured location, in metric units.
    pub async fn conditions(&self) -> Result<Conditions, ClientError> {
        tracing::debug!(message = "making current weather request", url = %self.url, location = %self.location_id);

        let res = make_request(&self.client, self.conditions_url(), &self.token).await?;
        Ok(res.json::<Conditions>().await?)
    }

    fn conditions_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("id", &self.location_id)
            .append_pair("appid", &self.token)
            .append_pair("units", "metric");
        url
    }
}

async fn make_request(client: &Client, url: Url, token: &str) -> Result<Response, ClientError> {
    let res = client
        .get(url.clone())
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header(ACCEPT, JSON_RESPONSE)
        .bearer_auth(token)
        .send()
        .await?;

    let status = res.status();
    if status == StatusCode::OK {
        Ok(res)
    } else {
        Err(ClientError::Unexpected(status, redacted(url)))
    }
}

fn redacted(mut url: Url) -> Url {
    url.set_query(None);
    url
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Thermostat {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "ambient_temperature_c")]
    pub ambient_temperature: Option<f64>,
    #[serde(alias = "target_temperature_c")]
    pub target_temperature: Option<f64>,
    pub humidity: Option<f64>,
    #[serde(default)]
    pub hvac_state: HvacState,
    #[serde(default)]
    pub has_leaf: bool,
    #[serde(default)]
    pub is_online: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HvacState {
    Heating,
    Cooling,
    #[default]
    #[serde(other)]
    Off,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Conditions {
    #[serde(alias = "id")]
    pub location_id: u64,
    #[serde(alias = "name", default)]
    pub location: String,
    #[serde(default)]
    pub weather: Vec<Weather>,
    pub main: MainConditions,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Weather {
    #[serde(default)]
    pub main: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MainConditions {
    #[serde(alias = "temp")]
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

#[cfg(test)]
mod test {
    use super::{ClientError, Conditions, HvacState, Thermostat, WeatherClient};
    use reqwest::{Client, StatusCode, Url};

    #[test]
    fn test_decode_thermostat() {
        let body = r#"{
            "device_id": "peyiJNo0IldT2YlIVtYaGQ",
            "name": "Hallway (Living Room)",
            "ambient_temperature_c": 21.5,
            "ambient_temperature_f": 71,
            "target_temperature_c": 20.0,
            "humidity": 40,
            "hvac_state": "heating",
            "has_leaf": true,
            "is_online": true
        }"#;

        let t: Thermostat = serde_json::from_str(body).unwrap();
        assert_eq!("peyiJNo0IldT2YlIVtYaGQ", t.device_id);
        assert_eq!("Hallway (Living Room)", t.name);
        assert_eq!(Some(21.5), t.ambient_temperature);
        assert_eq!(Some(20.0), t.target_temperature);
        assert_eq!(Some(40.0), t.humidity);
        assert_eq!(HvacState::Heating, t.hvac_state);
        assert!(t.has_leaf);
        assert!(t.is_online);
    }

    #[test]
    fn test_decode_thermostat_unknown_state() {
        let t: Thermostat = serde_json::from_str(r#"{"hvac_state": "eco", "ambient_temperature_c": null}"#).unwrap();
        assert_eq!(HvacState::Off, t.hvac_state);
        assert_eq!(None, t.ambient_temperature);
        assert!(!t.has_leaf);
    }

    #[test]
    fn test_decode_conditions() {
        let body = r#"{
            "coord": {"lon": 4.89, "lat": 52.37},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {"temp": 12.5, "feels_like": 11.0, "pressure": 1012, "humidity": 87},
            "id": 2759794,
            "name": "Amsterdam",
            "cod": 200
        }"#;

        let c: Conditions = serde_json::from_str(body).unwrap();
        assert_eq!(2759794, c.location_id);
        assert_eq!("Amsterdam", c.location);
        assert_eq!(1, c.weather.len());
        assert_eq!("light rain", c.weather[0].description);
        assert_eq!(Some(12.5), c.main.temperature);
        assert_eq!(Some(87.0), c.main.humidity);
        assert_eq!(Some(1012.0), c.main.pressure);
    }

    #[test]
    fn test_conditions_url() {
        let client = WeatherClient::new(
            Client::new(),
            Url::parse("http://api.openweathermap.org/data/2.5/weather").unwrap(),
            "secret",
            "2759794",
        );

        assert_eq!(
            "http://api.openweathermap.org/data/2.5/weather?id=2759794&appid=secret&units=metric",
            client.conditions_url().as_str()
        );
    }

    #[test]
    fn test_unexpected_error_hides_query() {
        let url = super::redacted(Url::parse("http://localhost/weather?id=1&appid=secret").unwrap());
        let err = ClientError::Unexpected(StatusCode::UNAUTHORIZED, url);
        let msg = err.to_string();

        assert!(!msg.contains("secret"));
        assert!(msg.contains("401"));
        assert!(!err.is_timeout());
    }
}
