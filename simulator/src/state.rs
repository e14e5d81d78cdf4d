//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::device::DeviceState;

/// Shared application state for the simulator.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// The simulated device. One lock for everything, like a single-threaded CGI.
    pub device: Arc<Mutex<DeviceState>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let device = DeviceState::new(&config);
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            device: Arc::new(Mutex::new(device)),
        }
    }
}
