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

use crate::units::TemperatureUnit;
use clap::Parser;
use reqwest::Url;
use std::error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_LISTEN_ADDR: &str = ":9999";
const DEFAULT_METRICS_PATH: &str = "/metrics";
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const DEFAULT_NEST_API_URL: &str = "https://developer-api.nest.com/devices/thermostats";
const DEFAULT_WEATHER_API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
// Amsterdam
const DEFAULT_WEATHER_LOCATION: &str = "2759794";

#[derive(Debug)]
pub enum ConfigError {
    MissingToken(&'static str),
    MissingLocation,
    InvalidPath(String),
    InvalidTimeout,
    InvalidUrl(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken(flag) => write!(f, "required flag --{} was not provided", flag),
            Self::MissingLocation => write!(
                f,
                "--weather-api-location-id must be set when a weather token is provided"
            ),
            Self::InvalidPath(p) => write!(
                f,
                "metrics path {:?} must start with '/' and not contain ':' or '*'",
                p
            ),
            Self::InvalidTimeout => write!(f, "--scrape-timeout must be greater than zero"),
            Self::InvalidUrl(flag, reason) => write!(f, "invalid URL for --{}: {}", flag, reason),
        }
    }
}

impl error::Error for ConfigError {}

/// Command line flags for the exporter.
///
/// Every flag can also be set with an environment variable prefixed with `PRONESTHEUS_`
/// (e.g. `PRONESTHEUS_NEST_API_TOKEN`). Flags given on the command line take precedence.
#[derive(Debug, Parser)]
#[clap(name = "nest_exporter", version = clap::crate_version!())]
pub struct ExporterOptions {
    /// Address on which to expose metrics. A bare port (":9999") listens on all interfaces.
    #[clap(
        long,
        env = "PRONESTHEUS_LISTEN_ADDR",
        default_value = DEFAULT_LISTEN_ADDR,
        value_parser = parse_listen_addr
    )]
    pub listen_addr: SocketAddr,

    /// Path under which to expose metrics.
    #[clap(long, env = "PRONESTHEUS_METRICS_PATH", default_value_t = DEFAULT_METRICS_PATH.into())]
    pub metrics_path: String,

    /// Time to wait for each remote API to respond, in milliseconds.
    #[clap(long, env = "PRONESTHEUS_SCRAPE_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    pub scrape_timeout: u64,

    /// Unit to report temperatures in.
    #[clap(
        long,
        env = "PRONESTHEUS_TEMPERATURE_UNIT",
        value_enum,
        default_value_t = TemperatureUnit::Celsius
    )]
    pub temperature_unit: TemperatureUnit,

    /// URL of the Nest thermostats API.
    #[clap(long, env = "PRONESTHEUS_NEST_API_URL", default_value_t = DEFAULT_NEST_API_URL.into())]
    pub nest_api_url: String,

    /// Authorization token for the Nest API (required).
    #[clap(long, env = "PRONESTHEUS_NEST_API_TOKEN", hide_env_values = true)]
    pub nest_api_token: Option<String>,

    /// URL of the OpenWeatherMap current weather API.
    #[clap(long, env = "PRONESTHEUS_WEATHER_API_URL", default_value_t = DEFAULT_WEATHER_API_URL.into())]
    pub weather_api_url: String,

    /// Authorization token for the OpenWeatherMap API. Weather metrics are not collected
    /// when this is not set.
    #[clap(long, env = "PRONESTHEUS_WEATHER_API_TOKEN", hide_env_values = true)]
    pub weather_api_token: Option<String>,

    /// OpenWeatherMap location ID to fetch weather for. Defaults to Amsterdam.
    #[clap(
        long,
        env = "PRONESTHEUS_WEATHER_API_LOCATION_ID",
        default_value_t = DEFAULT_WEATHER_LOCATION.into()
    )]
    pub weather_api_location_id: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, env = "PRONESTHEUS_LOG_LEVEL", default_value_t = DEFAULT_LOG_LEVEL)]
    pub log_level: Level,
}

impl ExporterOptions {
    /// Check the parsed flags and turn them into an immutable `Config`.
    ///
    /// A missing or blank Nest token is an error. A missing or blank weather token
    /// disables weather collection. URLs must be absolute HTTP(S) URLs.
    pub fn validate(&self) -> Result<Config, ConfigError> {
        let nest_token =
            non_blank(self.nest_api_token.as_deref()).ok_or(ConfigError::MissingToken("nest-api-token"))?;

        if !is_static_path(&self.metrics_path) {
            return Err(ConfigError::InvalidPath(self.metrics_path.clone()));
        }

        if self.scrape_timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let nest = NestConfig {
            url: parse_api_url("nest-api-url", &self.nest_api_url)?,
            token: nest_token.to_owned(),
        };

        let weather = match non_blank(self.weather_api_token.as_deref()) {
            None => None,
            Some(token) => {
                let location_id = self.weather_api_location_id.trim();
                if location_id.is_empty() {
                    return Err(ConfigError::MissingLocation);
                }

                Some(WeatherConfig {
                    url: parse_api_url("weather-api-url", &self.weather_api_url)?,
                    token: token.to_owned(),
                    location_id: location_id.to_owned(),
                })
            }
        };

        Ok(Config {
            listen_addr: self.listen_addr,
            metrics_path: self.metrics_path.clone(),
            timeout: Duration::from_millis(self.scrape_timeout),
            unit: self.temperature_unit,
            nest,
            weather,
        })
    }
}

/// Validated exporter configuration, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub metrics_path: String,
    pub timeout: Duration,
    pub unit: TemperatureUnit,
    pub nest: NestConfig,
    pub weather: Option<WeatherConfig>,
}

#[derive(Debug, Clone)]
pub struct NestConfig {
    pub url: Url,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub url: Url,
    pub token: String,
    pub location_id: String,
}

/// Parse a listen address, accepting the short form ":port" for all interfaces.
pub fn parse_listen_addr(s: &str) -> Result<SocketAddr, String> {
    if let Some(port) = s.strip_prefix(':') {
        return port
            .parse::<u16>()
            .map(|p| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), p))
            .map_err(|e| format!("invalid port {:?}: {}", port, e));
    }

    s.parse::<SocketAddr>().map_err(|e| format!("invalid address {:?}: {}", s, e))
}

fn parse_api_url(flag: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl(flag, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl(flag, format!("unsupported scheme {}", other))),
    }
}

/// True if the path starts with '/' and would be matched literally by the router.
/// The router treats ':' and '*' as the start of a capture.
fn is_static_path(path: &str) -> bool {
    path.starts_with('/') && !path.contains(|c: char| c == ':' || c == '*')
}

fn non_blank(val: Option<&str>) -> Option<&str> {
    val.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use super::{parse_listen_addr, ConfigError, ExporterOptions};
    use crate::units::TemperatureUnit;
    use clap::Parser;
    use std::env;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn options(args: &[&str]) -> ExporterOptions {
        for (key, _) in env::vars() {
            if key.starts_with("PRONESTHEUS_") {
                env::remove_var(key);
            }
        }

        let mut all = vec!["nest_exporter"];
        all.extend_from_slice(args);
        ExporterOptions::try_parse_from(all).unwrap()
    }

    #[test]
    fn test_parse_listen_addr_port_only() {
        let addr = parse_listen_addr(":9999").unwrap();
        assert_eq!("0.0.0.0:9999".parse::<SocketAddr>().unwrap(), addr);
    }

    #[test]
    fn test_parse_listen_addr_full() {
        let addr = parse_listen_addr("127.0.0.1:8080").unwrap();
        assert_eq!("127.0.0.1:8080".parse::<SocketAddr>().unwrap(), addr);
    }

    #[test]
    fn test_parse_listen_addr_invalid() {
        assert!(parse_listen_addr(":http").is_err());
        assert!(parse_listen_addr("localhost").is_err());
        assert!(parse_listen_addr(":70000").is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = options(&["--nest-api-token", "abc"]).validate().unwrap();

        assert_eq!("0.0.0.0:9999".parse::<SocketAddr>().unwrap(), cfg.listen_addr);
        assert_eq!("/metrics", cfg.metrics_path);
        assert_eq!(Duration::from_millis(5000), cfg.timeout);
        assert_eq!(TemperatureUnit::Celsius, cfg.unit);
        assert_eq!("https://developer-api.nest.com/devices/thermostats", cfg.nest.url.as_str());
        assert_eq!("abc", cfg.nest.token);
        assert!(cfg.weather.is_none());
    }

    #[test]
    fn test_missing_nest_token() {
        let res = options(&["--weather-api-token", "xyz"]).validate();
        assert!(matches!(res, Err(ConfigError::MissingToken("nest-api-token"))));
    }

    #[test]
    fn test_blank_nest_token() {
        let res = options(&["--nest-api-token", "  "]).validate();
        assert!(matches!(res, Err(ConfigError::MissingToken(_))));
    }

    #[test]
    fn test_weather_enabled() {
        let cfg = options(&[
            "--nest-api-token",
            "abc",
            "--weather-api-token",
            "xyz",
            "--weather-api-location-id",
            "5128581",
            "--temperature-unit",
            "fahrenheit",
        ])
        .validate()
        .unwrap();

        let weather = cfg.weather.unwrap();
        assert_eq!("xyz", weather.token);
        assert_eq!("5128581", weather.location_id);
        assert_eq!("http://api.openweathermap.org/data/2.5/weather", weather.url.as_str());
        assert_eq!(TemperatureUnit::Fahrenheit, cfg.unit);
    }

    #[test]
    fn test_blank_weather_token_disables_weather() {
        let cfg = options(&["--nest-api-token", "abc", "--weather-api-token", ""])
            .validate()
            .unwrap();
        assert!(cfg.weather.is_none());
    }

    #[test]
    fn test_weather_missing_location() {
        let res = options(&[
            "--nest-api-token",
            "abc",
            "--weather-api-token",
            "xyz",
            "--weather-api-location-id",
            "",
        ])
        .validate();
        assert!(matches!(res, Err(ConfigError::MissingLocation)));
    }

    #[test]
    fn test_invalid_metrics_path() {
        let res = options(&["--nest-api-token", "abc", "--metrics-path", "metrics"]).validate();
        assert!(matches!(res, Err(ConfigError::InvalidPath(_))));
    }

    #[test]
    fn test_metrics_path_patterns_rejected() {
        for path in ["/*rest", "/:", "/:name", "/nest/*all", "/nest/:id/metrics", "/a:b"] {
            let res = options(&["--nest-api-token", "abc", "--metrics-path", path]).validate();
            assert!(matches!(res, Err(ConfigError::InvalidPath(_))), "path {} should be rejected", path);
        }
    }

    #[test]
    fn test_metrics_path_literal_allowed() {
        for path in ["/", "/metrics", "/nest/metrics", "/nest-metrics_v1"] {
            let cfg = options(&["--nest-api-token", "abc", "--metrics-path", path]).validate().unwrap();
            assert_eq!(path, cfg.metrics_path);
        }
    }

    #[test]
    fn test_env_prefix() {
        let cmd = <ExporterOptions as clap::CommandFactory>::command();
        let token = cmd
            .get_arguments()
            .find(|a| a.get_id() == "nest_api_token")
            .and_then(|a| a.get_env())
            .map(|e| e.to_string_lossy().into_owned());
        assert_eq!(Some("PRONESTHEUS_NEST_API_TOKEN".to_owned()), token);
    }

    #[test]
    fn test_invalid_urls() {
        let res = options(&["--nest-api-token", "abc", "--nest-api-url", ""]).validate();
        assert!(matches!(res, Err(ConfigError::InvalidUrl("nest-api-url", _))));

        let res = options(&["--nest-api-token", "abc", "--nest-api-url", "ftp://example.com/"]).validate();
        assert!(matches!(res, Err(ConfigError::InvalidUrl("nest-api-url", _))));

        let res = options(&[
            "--nest-api-token",
            "abc",
            "--weather-api-token",
            "xyz",
            "--weather-api-url",
            "not a url",
        ])
        .validate();
        assert!(matches!(res, Err(ConfigError::InvalidUrl("weather-api-url", _))));
    }

    #[test]
    fn test_zero_timeout() {
        let res = options(&["--nest-api-token", "abc", "--scrape-timeout", "0"]).validate();
        assert!(matches!(res, Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_invalid_unit_rejected_by_parser() {
        let res = ExporterOptions::try_parse_from([
            "nest_exporter",
            "--nest-api-token",
            "abc",
            "--temperature-unit",
            "kelvin",
        ]);
        assert!(res.is_err());
    }
}
