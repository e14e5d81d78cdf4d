//! HTTP route handlers.
//!
//! - [`command`]: the JSON command endpoint, one envelope per request
//! - [`upload`]: multipart firmware upload
//! - [`health`]: unauthenticated liveness probe

pub mod command;
pub mod health;
pub mod upload;
