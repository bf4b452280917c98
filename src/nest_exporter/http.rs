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

use crate::client::{ClientError, Conditions, NestClient, Thermostat, WeatherClient};
use crate::metrics::{ThermostatMetrics, WeatherMetrics, NAMESPACE};
use crate::units::TemperatureUnit;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Level};

const OPENMETRICS_TEXT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// State shared between scrape requests: upstream clients and the unit to report in.
#[derive(Debug)]
pub struct RequestContext {
    nest: NestClient,
    weather: Option<WeatherClient>,
    unit: TemperatureUnit,
}

impl RequestContext {
    pub fn new(nest: NestClient, weather: Option<WeatherClient>, unit: TemperatureUnit) -> Self {
        Self { nest, weather, unit }
    }

    /// Query both upstream APIs and map the results into a new registry.
    ///
    /// Both requests are made concurrently. If either fails the whole scrape fails.
    pub async fn scrape(&self) -> Result<Registry, ClientError> {
        let (thermostats, conditions) = tokio::try_join!(self.thermostats(), self.conditions())?;

        let mut reg = Registry::with_prefix(NAMESPACE);
        ThermostatMetrics::new(&mut reg, self.unit).observe(&thermostats);
        if let Some(c) = conditions {
            WeatherMetrics::new(&mut reg, self.unit).observe(&c);
        }

        Ok(reg)
    }

    async fn thermostats(&self) -> Result<Vec<Thermostat>, ClientError> {
        self.nest
            .thermostats()
            .instrument(tracing::span!(Level::DEBUG, "nest_thermostats"))
            .await
    }

    async fn conditions(&self) -> Result<Option<Conditions>, ClientError> {
        match &self.weather {
            Some(w) => w
                .conditions()
                .instrument(tracing::span!(Level::DEBUG, "weather_conditions"))
                .await
                .map(Some),
            None => Ok(None),
        }
    }
}

/// Build a router that serves metrics at `path` and nothing else.
pub fn router(context: Arc<RequestContext>, path: &str) -> Router {
    Router::new()
        .route(path, get(text_metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

pub async fn text_metrics_handler(State(context): State<Arc<RequestContext>>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    let mut buf = String::new();

    let reg = match context.scrape().await {
        Ok(reg) => reg,
        Err(e) => {
            tracing::error!(message = "failed to fetch upstream state", error = %e, timeout = e.is_timeout());
            return (StatusCode::INTERNAL_SERVER_ERROR, headers, buf);
        }
    };

    match encode(&mut buf, &reg) {
        Ok(_) => {
            tracing::debug!(message = "encoded prometheus metrics to text format", bytes = buf.len());
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(OPENMETRICS_TEXT));
            (StatusCode::OK, headers, buf)
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics to text format", error = %e);
            buf.clear();
            (StatusCode::INTERNAL_SERVER_ERROR, headers, buf)
        }
    }
}
