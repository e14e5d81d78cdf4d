//! Firmware-side login: token issuance, digest verification, lockout and the
//! single active session.
//!
//! A login token is a random uuid, valid for `token_ttl_secs` and consumed by
//! the first login that presents it, successful or not. The expected digest is
//! `sha256(token + password)` in lowercase hex.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine as _;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;

pub const NO_AUTH: &str = "NO_AUTH";
pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
pub const LOCKED: &str = "LOCKED";
pub const ALREADY_LOGIN: &str = "ALREADY_LOGIN";
pub const BAD_CREDENTIALS: &str = "BAD_CREDENTIALS";

struct ActiveSession {
    id: String,
    last_seen: Instant,
}

/// Authentication state for one simulated device.
pub struct AuthState {
    config: AuthConfig,
    password: String,
    tokens: HashMap<String, Instant>,
    session: Option<ActiveSession>,
    remaining: u32,
    locked_until: Option<Instant>,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            password: config.password.clone(),
            remaining: config.max_attempts,
            config,
            tokens: HashMap::new(),
            session: None,
            locked_until: None,
        }
    }

    /// Issue a fresh single-use login token.
    pub fn issue_token(&mut self) -> Value {
        let ttl = Duration::from_secs(self.config.token_ttl_secs);
        self.tokens.retain(|_, issued| issued.elapsed() < ttl);
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), Instant::now());
        json!({ "success": true, "token": token })
    }

    pub fn login(&mut self, body: &Map<String, Value>) -> Value {
        let field = |key: &str| body.get(key).and_then(Value::as_str).unwrap_or_default();

        if let Some(until) = self.locked_until {
            let now = Instant::now();
            if until > now {
                return json!({
                    "success": false,
                    "message": LOCKED,
                    "remainTimes": 0,
                    "lockTime": until.duration_since(now).as_secs().max(1),
                });
            }
            self.locked_until = None;
            self.remaining = self.config.max_attempts;
        }

        let token = field("token");
        let ttl = Duration::from_secs(self.config.token_ttl_secs);
        match self.tokens.remove(token) {
            Some(issued) if issued.elapsed() < ttl => {}
            _ => {
                warn!("login with unknown or expired token");
                return json!({ "success": false, "message": TOKEN_INVALID });
            }
        }

        let expected = sha256_hex(&format!("{token}{}", self.password));
        let user_ok =
            constant_time_eq(self.config.username.as_bytes(), field("username").as_bytes());
        let pass_ok = constant_time_eq(expected.as_bytes(), field("passwd").as_bytes());
        if !(user_ok && pass_ok) {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.locked_until =
                    Some(Instant::now() + Duration::from_secs(self.config.lock_secs));
                warn!("account locked for {}s", self.config.lock_secs);
                return json!({
                    "success": false,
                    "message": LOCKED,
                    "remainTimes": 0,
                    "lockTime": self.config.lock_secs,
                });
            }
            warn!(remaining = self.remaining, "login failed");
            return json!({
                "success": false,
                "message": BAD_CREDENTIALS,
                "remainTimes": self.remaining,
            });
        }

        let single = field("isSingleLogin") == "1";
        let presented = field("sessionId");
        if single && self.has_live_session() {
            if let Some(active) = &self.session {
                if active.id != presented {
                    info!("login refused, another session is active");
                    return json!({ "success": false, "message": ALREADY_LOGIN });
                }
            }
        }

        self.remaining = self.config.max_attempts;
        let id = Uuid::new_v4().simple().to_string();
        self.session = Some(ActiveSession {
            id: id.clone(),
            last_seen: Instant::now(),
        });
        info!("login succeeded");
        json!({ "success": true, "sessionId": id })
    }

    /// Validate `session_id` and refresh its idle timer.
    pub fn touch(&mut self, session_id: &str) -> bool {
        if !self.has_live_session() {
            self.session = None;
            return false;
        }
        match &mut self.session {
            Some(active)
                if !session_id.is_empty()
                    && constant_time_eq(active.id.as_bytes(), session_id.as_bytes()) =>
            {
                active.last_seen = Instant::now();
                true
            }
            _ => false,
        }
    }

    pub fn logout(&mut self) {
        self.session = None;
    }

    /// Replace the password with the base64-decoded `passwd`. Returns `false`
    /// when it does not decode to a non-empty UTF-8 string.
    pub fn set_password(&mut self, encoded: &str) -> bool {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        match decoded {
            Some(password) if !password.is_empty() => {
                self.password = password;
                info!("password changed");
                true
            }
            _ => false,
        }
    }

    pub fn active_sessions(&self) -> usize {
        usize::from(self.has_live_session())
    }

    fn has_live_session(&self) -> bool {
        let ttl = Duration::from_secs(self.config.session_ttl_secs);
        self.session.as_ref().is_some_and(|s| s.last_seen.elapsed() < ttl)
    }
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `input`.
pub fn sha256_hex(input: &str) -> String {
    use std::fmt::Write as _;
    Sha256::digest(input.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
///
/// Always iterates over the full length of `expected` regardless of `provided`
/// length, so an attacker cannot determine the secret length from response times.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for (i, e) in expected.iter().enumerate() {
        let p = provided.get(i).copied().unwrap_or(0xff);
        diff |= e ^ p;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            password: "mypassword".into(),
            max_attempts: 3,
            ..AuthConfig::default()
        }
    }

    fn token(state: &mut AuthState) -> String {
        state.issue_token()["token"].as_str().unwrap().to_string()
    }

    fn login_body(token: &str, passwd: &str, session_id: &str) -> Map<String, Value> {
        let Value::Object(map) = json!({
            "username": "admin",
            "passwd": passwd,
            "token": token,
            "sessionId": session_id,
            "isSingleLogin": "1",
        }) else {
            unreachable!()
        };
        map
    }

    fn good_login(state: &mut AuthState, session_id: &str) -> Value {
        let t = token(state);
        let passwd = sha256_hex(&format!("{t}mypassword"));
        state.login(&login_body(&t, &passwd, session_id))
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret!"));
        assert!(!constant_time_eq(b"secret", b""));
    }

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex("abcmypassword"),
            "b69f34bde862c67192607c92ee0512c9bb85a5f8ee9fc294fe1b0f382c192a56"
        );
    }

    #[test]
    fn test_login_success_issues_session() {
        let mut state = AuthState::new(config());
        let resp = good_login(&mut state, "");
        assert_eq!(resp["success"], json!(true));
        let id = resp["sessionId"].as_str().unwrap().to_string();
        assert!(state.touch(&id));
        assert!(!state.touch("someone-else"));
        assert!(!state.touch(""));
    }

    #[test]
    fn test_token_is_single_use() {
        let mut state = AuthState::new(config());
        let t = token(&mut state);
        let passwd = sha256_hex(&format!("{t}mypassword"));
        assert_eq!(state.login(&login_body(&t, &passwd, ""))["success"], json!(true));
        state.logout();
        let again = state.login(&login_body(&t, &passwd, ""));
        assert_eq!(again["message"], json!(TOKEN_INVALID));
    }

    #[test]
    fn test_lockout_after_max_attempts() {
        let mut state = AuthState::new(config());
        for expected_remaining in [2, 1] {
            let t = token(&mut state);
            let resp = state.login(&login_body(&t, "wrong", ""));
            assert_eq!(resp["remainTimes"], json!(expected_remaining));
        }
        let t = token(&mut state);
        let resp = state.login(&login_body(&t, "wrong", ""));
        assert_eq!(resp["message"], json!(LOCKED));
        assert_eq!(resp["lockTime"], json!(300));

        // Even the right password is refused while locked.
        let resp = good_login(&mut state, "");
        assert_eq!(resp["message"], json!(LOCKED));
    }

    #[test]
    fn test_single_login_refuses_second_session() {
        let mut state = AuthState::new(config());
        let first = good_login(&mut state, "");
        let first_id = first["sessionId"].as_str().unwrap().to_string();

        let second = good_login(&mut state, "");
        assert_eq!(second["message"], json!(ALREADY_LOGIN));

        // The holder of the session may log in again.
        let relogin = good_login(&mut state, &first_id);
        assert_eq!(relogin["success"], json!(true));
    }

    #[test]
    fn test_idle_session_expires() {
        let mut state = AuthState::new(AuthConfig {
            session_ttl_secs: 0,
            ..config()
        });
        let resp = good_login(&mut state, "");
        let id = resp["sessionId"].as_str().unwrap().to_string();
        assert!(!state.touch(&id));
        assert_eq!(state.active_sessions(), 0);
    }

    #[test]
    fn test_set_password_requires_base64() {
        let mut state = AuthState::new(config());
        assert!(!state.set_password("not base64!"));
        assert!(!state.set_password(""));
        assert!(state.set_password("bmV3LXBhc3M=")); // "new-pass"
        let t = token(&mut state);
        let passwd = sha256_hex(&format!("{t}new-pass"));
        assert_eq!(state.login(&login_body(&t, &passwd, ""))["success"], json!(true));
    }
}
