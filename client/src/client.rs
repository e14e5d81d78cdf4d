//! Command client for the gateway's JSON endpoint.
//!
//! [`CommandClient`] is the single choke point for device communication.
//! Every operation is one HTTP `POST` to the command endpoint with a JSON
//! envelope:
//!
//! ```text
//! {"cmd": 201, "method": "GET", "sessionId": "...", ...payload}
//! {"cmd": 201, "method": "POST", "sessionId": "...", "token": "", ...payload}
//! ```
//!
//! `method` is a firmware-level field and is sent verbatim; the transport
//! verb is always `POST`.
//!
//! ## Response handling
//!
//! Bodies are parsed with [`parse_or_default`]: anything that is not a JSON
//! object becomes an empty [`CommandResponse`], so a malformed reply never
//! turns into an error. Application failures (`success: false`) are returned
//! as ordinary responses too.
//!
//! ## Session expiry
//!
//! When a response carries the `NO_AUTH` sentinel (in `message` or `result`)
//! or the HTTP status is 401/403, the client clears the [`SessionStore`] and
//! sends one [`AuthExpired`] event to every subscriber before returning the
//! parsed body. Callers never need to check the sentinel themselves.
//!
//! Transport failures (connection refused, reset, DNS) are the only errors a
//! request returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::session::SessionStore;

/// Sentinel the firmware returns for an invalid or expired session.
pub const NO_AUTH: &str = "NO_AUTH";

/// Default path of the JSON command endpoint.
pub const DEFAULT_ENDPOINT_PATH: &str = "/cgi-bin/http.cgi";

/// Default path of the multipart upload endpoint.
pub const DEFAULT_UPLOAD_PATH: &str = "/cgi-bin/upload.cgi";

const AUTH_EVENT_CAPACITY: usize = 16;

/// Logical method carried in the envelope's `method` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Broadcast when the device rejects the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthExpired {
    /// Command whose response carried the signal.
    pub cmd: u32,
    /// HTTP status of that response.
    pub status: u16,
}

/// Transport settings for a [`CommandClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub endpoint_path: String,
    pub upload_path: String,
    pub connect_timeout: Duration,
    /// Total request timeout. `None` lets requests run until the device answers.
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: None,
        }
    }
}

/// A device response: an arbitrary JSON object owned by the firmware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandResponse(Map<String, Value>);

impl CommandResponse {
    /// `true` only when the body carries `"success": true`.
    pub fn success(&self) -> bool {
        self.0.get("success").and_then(Value::as_bool) == Some(true)
    }

    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    pub fn result(&self) -> Option<&str> {
        self.str_field("result")
    }

    /// Whether the device flagged the session as invalid.
    pub fn is_no_auth(&self) -> bool {
        self.message() == Some(NO_AUTH) || self.result() == Some(NO_AUTH)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Read a counter the firmware may send either as a number or a string.
    pub fn u64_field(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize the whole body into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for CommandResponse {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Outcome of [`parse_or_default`].
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// The body was a JSON object.
    Value(Map<String, Value>),
    /// The body was empty, not JSON, or not an object; holds the fallback.
    Fallback(Map<String, Value>),
}

impl Parsed {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn into_inner(self) -> Map<String, Value> {
        match self {
            Self::Value(map) | Self::Fallback(map) => map,
        }
    }
}

/// Parse a response body, substituting an empty object for anything that is
/// not a JSON object.
pub fn parse_or_default(body: &str) -> Parsed {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Parsed::Value(map),
        _ => Parsed::Fallback(Map::new()),
    }
}

/// Build the wire envelope. Payload keys are merged last and win.
fn envelope(cmd: u32, method: Method, session_id: &str, payload: Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("cmd".into(), json!(cmd));
    body.insert("method".into(), json!(method));
    body.insert("sessionId".into(), json!(session_id));
    if method == Method::Post {
        body.insert("token".into(), json!(""));
    }
    body.extend(payload);
    Value::Object(body)
}

fn payload_object<P: Serialize + ?Sized>(
    cmd: u32,
    payload: &P,
) -> Result<Map<String, Value>, ClientError> {
    match serde_json::to_value(payload).map_err(|source| ClientError::Encode { cmd, source })? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ClientError::Encode {
            cmd,
            source: serde::ser::Error::custom("command payload must be a JSON object"),
        }),
    }
}

/// HTTP client for one gateway.
pub struct CommandClient {
    http: reqwest::Client,
    base_url: Url,
    endpoint: Url,
    upload_endpoint: Url,
    session: Arc<SessionStore>,
    auth_events: broadcast::Sender<AuthExpired>,
}

impl CommandClient {
    /// Create a client with default options. The session store's cookie jar
    /// is installed on the HTTP client.
    pub fn new(base_url: &str, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        Self::with_options(base_url, session, &ClientOptions::default())
    }

    pub fn with_options(
        base_url: &str,
        session: Arc<SessionStore>,
        options: &ClientOptions,
    ) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        let endpoint = join_path(&base_url, &options.endpoint_path)?;
        let upload_endpoint = join_path(&base_url, &options.upload_path)?;

        let mut builder = reqwest::Client::builder()
            .cookie_provider(session.cookie_jar())
            .user_agent(concat!("cpectl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(options.connect_timeout);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            http,
            base_url,
            endpoint,
            upload_endpoint,
            session,
            auth_events,
        })
    }

    /// The device's base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Register for auth-expiry notifications. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthExpired> {
        self.auth_events.subscribe()
    }

    /// Send a command carrying the current session id.
    pub async fn request<P: Serialize + ?Sized>(
        &self,
        cmd: u32,
        method: Method,
        payload: &P,
    ) -> Result<CommandResponse, ClientError> {
        let session_id = self.session.get();
        self.dispatch(cmd, method, &session_id, payload).await
    }

    /// Send a command with an empty session id (login token fetch only).
    pub async fn request_anonymous<P: Serialize + ?Sized>(
        &self,
        cmd: u32,
        method: Method,
        payload: &P,
    ) -> Result<CommandResponse, ClientError> {
        self.dispatch(cmd, method, "", payload).await
    }

    async fn dispatch<P: Serialize + ?Sized>(
        &self,
        cmd: u32,
        method: Method,
        session_id: &str,
        payload: &P,
    ) -> Result<CommandResponse, ClientError> {
        let body = envelope(cmd, method, session_id, payload_object(cmd, payload)?);
        self.session.ensure_cookie();
        debug!(cmd, method = method.as_str(), "sending command");

        let resp = self.http.post(self.endpoint.clone()).json(&body).send().await?;
        Ok(self.finish(cmd, resp).await)
    }

    /// Multipart upload with a JSON sidecar (`data`) next to the binary (`file`).
    pub async fn upload(
        &self,
        cmd: u32,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<CommandResponse, ClientError> {
        let sidecar = json!({
            "cmd": cmd,
            "sessionId": self.session.get(),
            "token": "",
        });
        let file = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new()
            .text("data", sidecar.to_string())
            .part("file", file);

        self.session.ensure_cookie();
        debug!(cmd, file_name, "uploading file");

        let resp = self
            .http
            .post(self.upload_endpoint.clone())
            .multipart(form)
            .send()
            .await?;
        Ok(self.finish(cmd, resp).await)
    }

    /// Turn an HTTP response into a [`CommandResponse`], applying the
    /// auth-expiry side effects.
    async fn finish(&self, cmd: u32, resp: reqwest::Response) -> CommandResponse {
        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(cmd, "failed to read response body: {e}");
                String::new()
            }
        };

        let parsed = parse_or_default(&body);
        if parsed.is_fallback() {
            debug!(cmd, status = status.as_u16(), "response body is not a JSON object");
        }
        let response = CommandResponse::from(parsed.into_inner());

        let denied = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
        if denied || response.is_no_auth() {
            self.expire_session(cmd, status);
        }
        response
    }

    fn expire_session(&self, cmd: u32, status: StatusCode) {
        warn!(cmd, status = status.as_u16(), "device rejected session");
        self.session.clear();
        // No subscribers is fine.
        let _ = self.auth_events.send(AuthExpired {
            cmd,
            status: status.as_u16(),
        });
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    // Strip trailing slash for consistent URL construction
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ClientError::InvalidUrl(format!(
            "{raw}: expected an http(s) URL with a host"
        )));
    }
    Ok(url)
}

fn join_path(base: &Url, path: &str) -> Result<Url, ClientError> {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}"))
        .map_err(|e| ClientError::InvalidUrl(format!("{base}/{path}: {e}")))
}

/// Errors returned by [`CommandClient`] and the services built on it.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The configured device URL is unusable.
    #[error("invalid device URL {0}")]
    InvalidUrl(String),
    /// A payload did not serialize to a JSON object.
    #[error("cannot encode payload for cmd {cmd}: {source}")]
    Encode {
        cmd: u32,
        #[source]
        source: serde_json::Error,
    },
    /// A typed read got a successful reply it could not decode.
    #[error("unexpected response to cmd {cmd}: {source}")]
    Decode {
        cmd: u32,
        #[source]
        source: serde_json::Error,
    },
    /// A typed read got `success: false` (or no `success` at all).
    #[error("device rejected cmd {cmd}: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { cmd: u32, message: Option<String> },
    /// A local file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Returns `true` for a typed read the device refused with `NO_AUTH`.
    pub fn is_no_auth(&self) -> bool {
        matches!(self, Self::Rejected { message: Some(m), .. } if m == NO_AUTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_get_has_no_token_slot() {
        let body = envelope(201, Method::Get, "sid", Map::new());
        assert_eq!(body, json!({"cmd": 201, "method": "GET", "sessionId": "sid"}));
    }

    #[test]
    fn test_envelope_post_carries_empty_token() {
        let body = envelope(201, Method::Post, "", Map::new());
        assert_eq!(body["token"], json!(""));
        assert_eq!(body["sessionId"], json!(""));
        assert_eq!(body["method"], json!("POST"));
    }

    #[test]
    fn test_envelope_payload_overrides_slots() {
        let payload = json!({"token": "abc", "apn": "internet"});
        let Value::Object(payload) = payload else { unreachable!() };
        let body = envelope(100, Method::Post, "old", payload);
        assert_eq!(body["token"], json!("abc"));
        assert_eq!(body["apn"], json!("internet"));
    }

    #[test]
    fn test_envelope_key_order() {
        let payload = json!({"a": 1});
        let Value::Object(payload) = payload else { unreachable!() };
        let body = envelope(1, Method::Post, "s", payload);
        let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["cmd", "method", "sessionId", "token", "a"]);
    }

    #[test]
    fn test_payload_unit_is_empty() {
        assert!(payload_object(1, &()).unwrap().is_empty());
    }

    #[test]
    fn test_payload_rejects_non_object() {
        assert!(matches!(
            payload_object(7, &[1, 2, 3]),
            Err(ClientError::Encode { cmd: 7, .. })
        ));
    }

    #[test]
    fn test_parse_or_default_object() {
        let parsed = parse_or_default(r#"{"success":true}"#);
        assert!(!parsed.is_fallback());
        assert_eq!(parsed.into_inner()["success"], json!(true));
    }

    #[test]
    fn test_parse_or_default_fallbacks() {
        for body in ["", "true", "[1,2]", "<html>", "{\"truncated\":"] {
            let parsed = parse_or_default(body);
            assert!(parsed.is_fallback(), "body {body:?}");
            assert!(parsed.into_inner().is_empty());
        }
    }

    #[test]
    fn test_response_no_auth_in_message_or_result() {
        let by_message =
            CommandResponse::from(parse_or_default(r#"{"message":"NO_AUTH"}"#).into_inner());
        let by_result =
            CommandResponse::from(parse_or_default(r#"{"result":"NO_AUTH"}"#).into_inner());
        let fine = CommandResponse::from(parse_or_default(r#"{"success":true}"#).into_inner());
        assert!(by_message.is_no_auth());
        assert!(by_result.is_no_auth());
        assert!(!fine.is_no_auth());
    }

    #[test]
    fn test_response_success_requires_bool_true() {
        let yes = CommandResponse::from(parse_or_default(r#"{"success":true}"#).into_inner());
        let stringly =
            CommandResponse::from(parse_or_default(r#"{"success":"true"}"#).into_inner());
        assert!(yes.success());
        assert!(!stringly.success());
        assert!(!CommandResponse::default().success());
    }

    #[test]
    fn test_response_u64_field_accepts_strings() {
        let resp = CommandResponse::from(
            parse_or_default(r#"{"remainTimes":"3","lockTime":120,"bad":"x"}"#).into_inner(),
        );
        assert_eq!(resp.u64_field("remainTimes"), Some(3));
        assert_eq!(resp.u64_field("lockTime"), Some(120));
        assert_eq!(resp.u64_field("bad"), None);
        assert_eq!(resp.u64_field("missing"), None);
    }

    #[test]
    fn test_base_url_validation() {
        assert!(parse_base_url("http://192.168.0.1/").is_ok());
        assert!(parse_base_url("192.168.0.1").is_err());
        assert!(parse_base_url("ftp://router").is_err());
    }

    #[test]
    fn test_join_path() {
        let base = parse_base_url("http://router.lan/").unwrap();
        assert_eq!(
            join_path(&base, DEFAULT_ENDPOINT_PATH).unwrap().as_str(),
            "http://router.lan/cgi-bin/http.cgi"
        );
    }
}
