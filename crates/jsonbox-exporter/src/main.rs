//! jsonbox exporter
//!
//! - Probe endpoint: /probe?module=...&target=...
//! - Modules come from a strict YAML config, compiled once at boot
//! - `--config.check` validates the config and exits

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use jsonbox_exporter::{app_state, config, router};

#[derive(Debug, Parser)]
#[command(name = "jsonbox-exporter", version, about = "Turns JSON API responses into Prometheus metrics")]
struct Args {
    /// JSON exporter configuration file.
    #[arg(long = "config.file", default_value = "config.yml")]
    config_file: String,

    /// The address to listen on for HTTP requests.
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:7979")]
    listen_address: SocketAddr,

    /// Validate the config file and then exit.
    #[arg(long = "config.check")]
    config_check: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long = "log.level", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting jsonbox-exporter");
    tracing::info!(file = %args.config_file, "loading config file");

    let state = match config::load_from_file(&args.config_file).and_then(app_state::AppState::new) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(err = %e, "error loading config");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(modules = state.cfg().modules.len(), "loaded config file");

    if args.config_check {
        return ExitCode::SUCCESS;
    }

    let app = router::build_router(state);

    let listener = match tokio::net::TcpListener::bind(args.listen_address).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(err = %e, listen = %args.listen_address, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(listen = %args.listen_address, "jsonbox-exporter listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(err = %e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(err = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
