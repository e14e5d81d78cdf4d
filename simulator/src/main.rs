#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # cpe-sim
//!
//! In-memory cellular gateway firmware for developing against `cpectl`
//! without hardware.
//!
//! ## API surface
//!
//! | Method | Path                  | Description                            |
//! |--------|-----------------------|----------------------------------------|
//! | GET    | `/api/health`         | Liveness probe                         |
//! | POST   | `/cgi-bin/http.cgi`   | JSON command envelope (path configurable) |
//! | POST   | `/cgi-bin/upload.cgi` | Multipart firmware upload (path configurable) |

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use cpe_sim::{app, AppState, Config};

/// In-memory cellular gateway firmware endpoint.
#[derive(Parser)]
#[command(name = "cpe-sim", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    config: Option<String>,
    /// Pre-load the SMS inbox with a welcome message.
    #[arg(long)]
    seed_sms: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cpe-sim: configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("cpe-sim v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Device: {} ({})", config.device.model, config.device.serial);
    info!("Listening on {}", config.server.listen);

    if config.auth.password == "admin" {
        warn!("Using default password, set CPESIM_PASSWORD or update config");
    }

    let state = AppState::new(config);
    if cli.seed_sms {
        // "Welcome to cpe-sim" in base64
        state
            .device
            .lock()
            .await
            .receive_sms("10086", "V2VsY29tZSB0byBjcGUtc2lt");
    }

    let listener = match TcpListener::bind(&state.config.server.listen).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {e}", state.config.server.listen);
            std::process::exit(1);
        }
    };

    info!(
        "Command endpoint {}, upload endpoint {}",
        state.config.server.endpoint_path, state.config.server.upload_path
    );
    info!("Server ready");

    if let Err(e) = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        std::process::exit(1);
    }
    info!("Goodbye");
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}
