#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

//! cpectl library: command and session client for cellular gateways (CPE)
//! that expose a single JSON-over-HTTP command endpoint.
//!
//! - `session`: session id slot, cookie mirror and optional on-disk copy
//! - `digest` / `encoding`: SHA-256 and UTF-8-safe base64
//! - `client`: envelope dispatch, defensive parsing, auth-expiry broadcast
//! - `auth`: challenge/response login, logout, auth probe, password change
//! - `services`: typed wrappers for network, SMS, system and Wi-Fi pages
//! - `cmd`: the firmware's command codes
//! - `config`: TOML + env-var configuration for the CLI

pub mod auth;
pub mod client;
pub mod cmd;
pub mod config;
pub mod digest;
pub mod encoding;
pub mod services;
pub mod session;

pub use auth::LoginOutcome;
pub use client::{AuthExpired, ClientError, ClientOptions, CommandClient, CommandResponse, Method};
pub use config::{Config, ConfigError};
pub use session::SessionStore;
