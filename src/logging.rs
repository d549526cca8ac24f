// SPDX-License-Identifier: Apache-2.0
use std::env;
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry,
};

/// Selects the log output format (`json` or `pretty`)
pub const LOG_FORMAT_ENV: &str = "ADMINGATE_LOG_FORMAT";

fn env_filter(default_directives: String) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let filter_level = env::var("RUST_LOG").unwrap_or(default_directives);
        EnvFilter::new(filter_level)
    })
}

/// Initialize Bunyan (JSON) tracing for the application
pub fn init_tracing<Sink>(name: &str, sink: Sink)
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    // Skip setting LogTracer if it's already been set
    let _ = LogTracer::init();

    let formatting_layer = BunyanFormattingLayer::new(name.into(), sink);

    let subscriber = Registry::default()
        .with(env_filter(format!("{}=info,actix_web=info", name)))
        .with(JsonStorageLayer)
        .with(formatting_layer);

    set_global_default(subscriber).expect("Failed to set tracing subscriber");
    tracing::info!("Tracing initialized with Bunyan formatter");
}

/// Initialize a more readable console logger for development
pub fn init_console_tracing(name: &str) {
    let _ = LogTracer::init();

    let subscriber = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(env_filter(format!("{}=debug,actix_web=info", name)))
        .finish();

    set_global_default(subscriber).expect("Failed to set tracing subscriber");
    tracing::info!("Console tracing initialized");
}

/// Picks the formatter from `ADMINGATE_LOG_FORMAT`; JSON unless `pretty`.
pub fn init_from_env(name: &str) {
    match env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("pretty") | Ok("console") => init_console_tracing(name),
        _ => init_tracing(name, std::io::stdout),
    }
}
