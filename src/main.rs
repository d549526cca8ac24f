// SPDX-License-Identifier: Apache-2.0
use actix_web::{web, App, HttpServer};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;

use admingate::config::AppConfig;
use admingate::handlers::{configure, AppState};
use admingate::logging::init_from_env;
use admingate::middleware::AccessGate;
use admingate::transport::AwcTransport;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_from_env("admingate");

    let config = AppConfig::load().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        std::io::Error::other(e)
    })?;

    info!(
        upstream = %config.api_base_url,
        bind = %config.bind_address,
        login_path = %config.gate.login_path,
        home_path = %config.gate.home_path,
        allow_list = ?config.gate.allow_list.prefixes(),
        "Starting admingate"
    );
    if !config.production {
        warn!("Not in production mode, session cookies will not be marked Secure");
    }
    if config.suggest_url.is_none() {
        info!("No tag suggestion service configured, suggestions disabled");
    }

    let bind_address = config.bind_address.clone();

    HttpServer::new(move || {
        let transport = AwcTransport::new(config.upstream_timeout());
        let state = web::Data::new(AppState::new(config.clone(), transport));
        let gate_config = config.gate.clone();
        let routes_config = config.clone();

        App::new()
            .wrap(AccessGate::new(gate_config))
            .wrap(TracingLogger::default())
            .app_data(state)
            .configure(move |cfg| configure::<AwcTransport>(cfg, &routes_config))
    })
    .bind(bind_address)?
    .client_request_timeout(Duration::from_secs(60))
    .workers(4)
    .run()
    .await
}
