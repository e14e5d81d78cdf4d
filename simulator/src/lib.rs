#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

//! cpe-sim library: an in-memory cellular gateway firmware endpoint.
//!
//! - `auth`: login tokens, digest verification, lockout, single session
//! - `device`: command dispatch over settings tables, SMS and Wi-Fi
//! - `config`: TOML + env-var configuration
//! - `routes`: command, upload and health handlers
//!
//! [`spawn`] runs the router on a background task, which is how the client
//! crate's integration tests use it.

pub mod auth;
pub mod cmd;
pub mod config;
pub mod device;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::error;

pub use config::Config;
pub use state::AppState;

/// Build the router for `state`. Endpoint paths come from the config.
pub fn app(state: AppState) -> Router {
    let server = &state.config.server;
    Router::new()
        .route("/api/health", get(routes::health::health))
        .route(&server.endpoint_path, post(routes::command::command))
        .route(
            &server.upload_path,
            post(routes::upload::upload).layer(DefaultBodyLimit::max(server.max_upload_size)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}

/// Bind `state.config.server.listen` and serve on a background task.
///
/// Returns the bound address (useful with port 0) and the server task. Keep a
/// clone of `state` to inspect or seed the device while it runs.
pub async fn spawn(state: AppState) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(&state.config.server.listen).await?;
    let addr = listener.local_addr()?;
    let router = app(state);
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("simulator stopped: {e}");
        }
    });
    Ok((addr, task))
}
