//! Route handlers: health, registration, registration queries, activity.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use a2p_core::RegistrationForm;
use a2p_workflow::WorkflowError;

use super::json_error;
use super::state::AppState;

/// Owner used when a registration request names none.
pub(crate) const DEFAULT_USER_ID: &str = "anonymous";

/// Long-poll defaults for `GET /registrations/watch`.
const WATCH_DEFAULT_SECS: u64 = 25;
const WATCH_MAX_SECS: u64 = 60;

const DEFAULT_DUMP_LIMIT: usize = 50;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "Not found", "no such route")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "service": "a2p",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

// ── POST /a2p ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest {
    #[serde(default)]
    pub(crate) user_id: Option<String>,
    #[serde(flatten)]
    pub(crate) form: RegistrationForm,
}

/// POST /a2p
///
/// 200 when every stage completed, 400 for an invalid form or a failed
/// stage, 500 when the store could not record progress.
pub(crate) async fn handle_register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "Invalid registration form",
                rejection.body_text(),
            )
            .into_response();
        }
    };
    let user_id = request
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

    match state.registrar.register(&user_id, request.form).await {
        Ok(outcome) => {
            let status = if outcome.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(outcome)).into_response()
        }
        Err(WorkflowError::InvalidForm(e)) => {
            json_error(StatusCode::BAD_REQUEST, "Invalid registration form", e).into_response()
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "registration aborted");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "A2P registration failed",
                e,
            )
            .into_response()
        }
    }
}

// ── Registration queries ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OwnerQuery {
    pub(crate) user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WatchQuery {
    pub(crate) user_id: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
}

fn require_user_id(user_id: Option<String>) -> Result<String, Response> {
    user_id.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "Missing query parameter",
            "userId is required",
        )
        .into_response()
    })
}

fn storage_failure(e: impl std::fmt::Display) -> Response {
    tracing::error!(error = %e, "store read failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage error", e).into_response()
}

/// GET /registrations?userId=
pub(crate) async fn handle_list_registrations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> Response {
    let user_id = match require_user_id(query.user_id) {
        Ok(u) => u,
        Err(response) => return response,
    };
    match state.store.list_by_owner(&user_id).await {
        Ok(registrations) => {
            let body = serde_json::json!({ "registrations": registrations });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => storage_failure(e),
    }
}

/// GET /registrations/{id}
pub(crate) async fn handle_get_registration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get_by_id(&id).await {
        Ok(Some(registration)) => (StatusCode::OK, Json(registration)).into_response(),
        Ok(None) => json_error(
            StatusCode::NOT_FOUND,
            "Registration not found",
            format!("no registration with id '{}'", id),
        )
        .into_response(),
        Err(e) => storage_failure(e),
    }
}

/// GET /registrations/watch?userId=&timeoutSecs=
///
/// Waits until one of the owner's registrations changes or the timeout
/// passes, then answers with the current list. `changed` tells the two
/// apart.
pub(crate) async fn handle_watch_registrations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WatchQuery>,
) -> Response {
    let user_id = match require_user_id(query.user_id) {
        Ok(u) => u,
        Err(response) => return response,
    };
    let wait = Duration::from_secs(
        query
            .timeout_secs
            .unwrap_or(WATCH_DEFAULT_SECS)
            .min(WATCH_MAX_SECS),
    );

    let mut rx = match state.store.subscribe_by_owner(&user_id).await {
        Ok(rx) => rx,
        Err(e) => return storage_failure(e),
    };
    let _ = rx.borrow_and_update();

    let changed = matches!(tokio::time::timeout(wait, rx.changed()).await, Ok(Ok(())));
    let registrations = rx.borrow().clone();
    let body = serde_json::json!({
        "changed": changed,
        "registrations": registrations,
    });
    (StatusCode::OK, Json(body)).into_response()
}

// ── Audit and activity ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct DumpQuery {
    pub(crate) limit: Option<usize>,
}

/// GET /webhooks/dumps?limit=
pub(crate) async fn handle_list_dumps(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DumpQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_DUMP_LIMIT);
    match state.store.list_webhook_dumps(limit).await {
        Ok(dumps) => (StatusCode::OK, Json(serde_json::json!({ "dumps": dumps }))).into_response(),
        Err(e) => storage_failure(e),
    }
}

/// GET /activity
pub(crate) async fn handle_activity(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = serde_json::json!({
        "capacity": state.activity.capacity(),
        "entries": state.activity.recent(),
    });
    (StatusCode::OK, Json(body))
}
