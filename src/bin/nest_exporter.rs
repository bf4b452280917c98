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

use clap::error::ErrorKind;
use clap::Parser;
use nest_exporter::client::{NestClient, WeatherClient};
use nest_exporter::config::ExporterOptions;
use nest_exporter::http::RequestContext;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::process;
use std::sync::Arc;
use tokio::signal::unix::{self, SignalKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = ExporterOptions::try_parse().unwrap_or_else(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
        _ => {
            let _ = e.print();
            process::exit(1)
        }
    });

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let cfg = opts.validate().unwrap_or_else(|e| {
        tracing::error!(message = "invalid configuration", error = %e);
        process::exit(1)
    });

    let http_client = Client::builder().timeout(cfg.timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let nest = NestClient::new(http_client.clone(), cfg.nest.url.clone(), &cfg.nest.token);
    let weather = match &cfg.weather {
        Some(w) => {
            tracing::info!(message = "weather collection enabled", api_url = %w.url, location = %w.location_id);
            Some(WeatherClient::new(http_client, w.url.clone(), &w.token, &w.location_id))
        }
        None => {
            tracing::info!("weather collection disabled, no weather API token provided");
            None
        }
    };

    let context = Arc::new(RequestContext::new(nest, weather, cfg.unit));
    let app = nest_exporter::http::router(context, &cfg.metrics_path);
    let server = axum::Server::try_bind(&cfg.listen_addr).unwrap_or_else(|e| {
        tracing::error!(message = "error binding to address", address = %cfg.listen_addr, error = %e);
        process::exit(1)
    });

    tracing::info!(
        message = "server started",
        address = %cfg.listen_addr,
        path = %cfg.metrics_path,
        nest_api_url = %cfg.nest.url,
        unit = %cfg.unit,
    );

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
