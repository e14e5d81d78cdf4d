//! `POST <endpoint_path>`: the JSON command endpoint.
//!
//! The body is one envelope: `{cmd, method, sessionId, token?, ...payload}`.
//! Application failures are reported in the JSON body with HTTP 200, the way
//! the real firmware does. Only a body that is not a JSON object gets a 400.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::device::BAD_REQUEST;
use crate::AppState;

pub async fn command(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            debug!(len = body.len(), "command body is not a JSON object");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": BAD_REQUEST })),
            )
                .into_response();
        }
    };

    let reply = state.device.lock().await.handle(&envelope);
    Json(reply).into_response()
}
