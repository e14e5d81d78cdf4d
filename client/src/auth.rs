//! Login, logout and session checks.
//!
//! Login is a challenge/response exchange:
//!
//! 1. fetch a single-use token anonymously (`cmd::LOGIN_TOKEN`)
//! 2. hash `sha256(token + password)` (token first, the firmware checks the same order)
//! 3. submit username, hash and token (`cmd::LOGIN`)
//!
//! On success the returned `sessionId` is stored in the client's
//! [`SessionStore`](crate::session::SessionStore). Failures are reported as a
//! [`LoginOutcome`] so callers can show lockout counters or the
//! "already logged in elsewhere" case.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::client::{ClientError, CommandClient, CommandResponse, Method};
use crate::cmd;
use crate::digest::sha256_hex;
use crate::encoding::b64_encode_utf8;

/// Message the firmware returns when single-login is enforced and another
/// session holds the account.
pub const ALREADY_LOGGED_IN: &str = "ALREADY_LOGIN";

/// Message reported when no login token could be obtained.
pub const INIT_FAILED: &str = "LOGIN_INIT_FAILED";

/// Result of [`Auth::login`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Logged in; the session id is already stored.
    Success {
        session_id: String,
        response: CommandResponse,
    },
    /// Another session holds the account.
    AlreadyLoggedIn(CommandResponse),
    /// Wrong credentials, lockout, or any other refusal. The response carries
    /// the firmware's attempt counters unmodified.
    Rejected(CommandResponse),
    /// The login token could not be fetched; no login was attempted.
    InitFailed,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn response(&self) -> Option<&CommandResponse> {
        match self {
            Self::Success { response, .. }
            | Self::AlreadyLoggedIn(response)
            | Self::Rejected(response) => Some(response),
            Self::InitFailed => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::InitFailed => Some(INIT_FAILED),
            other => other.response().and_then(CommandResponse::message),
        }
    }

    /// Login attempts left before lockout, when the device reports it.
    pub fn remaining_attempts(&self) -> Option<u64> {
        self.response()?.u64_field("remainTimes")
    }

    /// Seconds until the account unlocks, when the device reports it.
    pub fn lock_seconds(&self) -> Option<u64> {
        self.response()?.u64_field("lockTime")
    }
}

/// Authentication operations bound to a [`CommandClient`].
pub struct Auth<'a> {
    client: &'a CommandClient,
}

impl CommandClient {
    pub fn auth(&self) -> Auth<'_> {
        Auth { client: self }
    }
}

impl Auth<'_> {
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ClientError> {
        let Some(token) = self.fetch_token().await else {
            return Ok(LoginOutcome::InitFailed);
        };

        let passwd = sha256_hex(&format!("{token}{password}"));
        let payload = json!({
            "username": username,
            "passwd": passwd,
            "token": token,
            "sessionId": self.client.session().get(),
            "isAutoUpgrade": "0",
            "isSingleLogin": "1",
        });
        let response = self.client.request(cmd::LOGIN, Method::Post, &payload).await?;

        if response.message() == Some(ALREADY_LOGGED_IN) {
            info!(username, "login refused: account in use by another session");
            return Ok(LoginOutcome::AlreadyLoggedIn(response));
        }

        let session_id = response
            .str_field("sessionId")
            .filter(|id| response.success() && !id.is_empty())
            .map(str::to_string);
        match session_id {
            Some(session_id) => {
                self.client.session().set(&session_id);
                info!(username, "logged in");
                Ok(LoginOutcome::Success {
                    session_id,
                    response,
                })
            }
            None => {
                warn!(
                    username,
                    message = response.message().unwrap_or_default(),
                    "login rejected"
                );
                Ok(LoginOutcome::Rejected(response))
            }
        }
    }

    async fn fetch_token(&self) -> Option<String> {
        match self
            .client
            .request_anonymous(cmd::LOGIN_TOKEN, Method::Get, &())
            .await
        {
            Ok(resp) if resp.success() => {
                let token = resp.str_field("token").filter(|t| !t.is_empty());
                if token.is_none() {
                    warn!("login token response carried no token");
                }
                token.map(str::to_string)
            }
            Ok(resp) => {
                warn!(
                    message = resp.message().unwrap_or_default(),
                    "device refused to issue a login token"
                );
                None
            }
            Err(e) => {
                warn!("login token request failed: {e}");
                None
            }
        }
    }

    /// Tell the device we are leaving, then forget the session locally.
    ///
    /// The device call is best-effort; the local session is cleared even when
    /// it fails. Always returns `true`.
    pub async fn logout(&self) -> bool {
        match self.client.request(cmd::LOGOUT, Method::Post, &()).await {
            Ok(resp) if resp.success() => debug!("device acknowledged logout"),
            Ok(resp) => debug!(
                message = resp.message().unwrap_or_default(),
                "device did not acknowledge logout"
            ),
            Err(e) => warn!("logout request failed, clearing local session anyway: {e}"),
        }
        self.client.session().clear();
        true
    }

    /// Probe the session. Only an explicit `NO_AUTH` counts as logged out;
    /// transport errors keep the current state.
    pub async fn check_auth_status(&self) -> bool {
        match self.client.request(cmd::AUTH_PROBE, Method::Get, &()).await {
            Ok(resp) => !resp.is_no_auth(),
            Err(e) => {
                debug!("auth probe failed, assuming session still valid: {e}");
                true
            }
        }
    }

    /// Change the account password. The firmware expects the new password
    /// base64-encoded, not hashed.
    pub async fn modify_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> Result<CommandResponse, ClientError> {
        let payload = json!({
            "username": username,
            "passwd": b64_encode_utf8(new_password),
        });
        let response = self
            .client
            .request(cmd::MODIFY_PASSWORD, Method::Post, &payload)
            .await?;
        if !response.success() {
            warn!(
                username,
                message = response.message().unwrap_or_default(),
                "password change rejected"
            );
        }
        Ok(response)
    }
}
