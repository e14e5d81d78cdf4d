#![allow(dead_code)]

use std::sync::Arc;

use cpe_sim::{AppState, Config as SimConfig};
use cpectl::{CommandClient, SessionStore};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "mypassword";

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Simulator config on an ephemeral port with a known password.
pub fn sim_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.server.listen = "127.0.0.1:0".into();
    config.auth.password = PASSWORD.into();
    config
}

/// Start a simulator and return its base URL plus a handle on its state.
pub async fn start_simulator(config: SimConfig) -> (String, AppState) {
    init_logging();
    let state = AppState::new(config);
    let (addr, _task) = cpe_sim::spawn(state.clone()).await.expect("simulator failed to bind");
    (format!("http://{addr}"), state)
}

pub fn client_for(base_url: &str) -> CommandClient {
    let url = base_url.parse().expect("valid base url");
    CommandClient::new(base_url, Arc::new(SessionStore::new(url))).expect("client builds")
}

/// A client already logged in to the simulator at `base_url`.
pub async fn logged_in_client(base_url: &str) -> CommandClient {
    let client = client_for(base_url);
    let outcome = client.auth().login(USERNAME, PASSWORD).await.expect("login request");
    assert!(outcome.is_success(), "login failed: {outcome:?}");
    client
}

/// A base URL nothing listens on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}
