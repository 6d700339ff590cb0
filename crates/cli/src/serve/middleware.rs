//! HTTP middleware: rate limiting and API key authentication.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::json_error;
use super::state::AppState;

/// Per-IP rate limiting.
///
/// Requests that arrive without connection info (in-process tests) are not
/// limited.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ip = match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.ip(),
        None => return next.run(request).await,
    };
    match state.rate_limiter.check(ip).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(%ip, retry_after, "rate limit exceeded");
            let body = serde_json::json!({
                "success": false,
                "message": "Too many requests",
                "error": "rate limit exceeded",
                "retryAfter": retry_after,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
        }
    }
}

/// API key authentication.
///
/// With an API key configured, every request must carry either
/// `Authorization: Bearer <key>` or `X-API-Key: <key>`. `/health` and the
/// provider-facing `/webhooks/*` callbacks are exempt; the dump listing is
/// not.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let expected_key = match &state.api_key {
        Some(k) => k,
        None => return next.run(request).await,
    };

    let path = request.uri().path();
    if path == "/health" || (path.starts_with("/webhooks/") && path != "/webhooks/dumps") {
        return next.run(request).await;
    }

    let bearer = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    let authorized = match bearer.or(header_key) {
        Some(key) if key == expected_key => Ok(()),
        Some(_) => Err((StatusCode::FORBIDDEN, "Forbidden", "invalid API key")),
        None => Err((
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "authentication required",
        )),
    };
    match authorized {
        Ok(()) => next.run(request).await,
        Err((status, message, error)) => json_error(status, message, error).into_response(),
    }
}
