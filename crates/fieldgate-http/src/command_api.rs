use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fieldgate_domain::{CommandError, CommandService};
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shared state for the command API handlers.
#[derive(Clone)]
pub struct CommandApiState {
    pub commands: Arc<CommandService>,
    pub bearer_token: Arc<String>,
}

/// Build the backend-facing command router.
pub fn command_router(state: CommandApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/command/:device_id", post(dispatch_command))
        .with_state(state)
}

/// Serve the command API until the token is cancelled.
pub async fn serve_command_api(
    listen_addr: &str,
    state: CommandApiState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind command API to {}", listen_addr))?;
    info!(listen_addr, "command API listening");

    axum::serve(listener, command_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("command API server failed")
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// `POST /command/{device_id}`: sign the body for the device and publish it
/// on the command topic. Auth is checked before the body is even parsed.
async fn dispatch_command(
    State(state): State<CommandApiState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&headers, &state.bearer_token) {
        warn!(device_id = %device_id, "command request with missing or invalid bearer token");
        return error_response(StatusCode::UNAUTHORIZED, "invalid or missing bearer token");
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(device_id = %device_id, error = %e, "command request with malformed body");
            return error_response(StatusCode::BAD_REQUEST, "body is not valid JSON");
        }
    };

    match state.commands.dispatch(&device_id, &payload).await {
        Ok(dispatched) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "accepted",
                "message_id": dispatched.message_id,
            })),
        )
            .into_response(),
        Err(CommandError::InvalidPayload) => {
            error_response(StatusCode::BAD_REQUEST, "payload must be a JSON object")
        }
        Err(CommandError::UnknownDevice(_)) => {
            warn!(device_id = %device_id, "command for unknown device");
            error_response(StatusCode::NOT_FOUND, "unknown device")
        }
        Err(CommandError::PublishFailed(e)) => {
            error!(device_id = %device_id, error = %e, "command publish failed");
            error_response(StatusCode::BAD_GATEWAY, "failed to publish command")
        }
        Err(CommandError::Internal(e)) => {
            error!(device_id = %device_id, error = %e, "command dispatch failed internally");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Constant-time bearer token check.
fn authorized(headers: &HeaderMap, expected: &str) -> bool {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) => token.as_bytes().ct_eq(expected.as_bytes()).into(),
        None => false,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}
