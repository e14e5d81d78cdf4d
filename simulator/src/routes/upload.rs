//! `POST <upload_path>`: multipart firmware upload.
//!
//! Two parts are expected:
//!
//! - `data`: JSON sidecar `{cmd, sessionId, token}`
//! - `file`: the image bytes
//!
//! The body size cap (`server.max_upload_size`) is applied by the router.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::auth::NO_AUTH;
use crate::cmd;
use crate::device::{BAD_REQUEST, UNSUPPORTED_CMD};
use crate::AppState;

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut sidecar: Option<Value> = None;
    let mut file: Option<(String, usize)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("malformed multipart upload: {e}");
                return reply(e.status(), json!({ "success": false, "message": BAD_REQUEST }));
            }
        };
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("data") => {
                let text = field.text().await.unwrap_or_default();
                sidecar = serde_json::from_str(&text).ok();
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("firmware.bin").to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, bytes.len())),
                    Err(e) => {
                        warn!("firmware upload aborted: {e}");
                        return reply(
                            e.status(),
                            json!({ "success": false, "message": BAD_REQUEST }),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    let (Some(sidecar), Some((file_name, size))) = (sidecar, file) else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": BAD_REQUEST }),
        );
    };
    let session_id = sidecar.get("sessionId").and_then(Value::as_str).unwrap_or_default();
    let code = sidecar.get("cmd").and_then(Value::as_u64);

    let mut device = state.device.lock().await;
    if !device.auth.touch(session_id) {
        return reply(StatusCode::OK, json!({ "success": false, "message": NO_AUTH }));
    }
    if code != Some(u64::from(cmd::FIRMWARE_UPLOAD)) {
        return reply(StatusCode::OK, json!({ "success": false, "message": UNSUPPORTED_CMD }));
    }
    device.firmware_uploaded(&file_name, size);
    reply(StatusCode::OK, json!({ "success": true, "size": size }))
}
