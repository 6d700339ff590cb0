//! Provider callback routes.
//!
//! Every callback is dumped before it is interpreted. The provider gets a
//! 200 as soon as the dump is written, whether or not the event matched a
//! registration; only a failed dump answers 500 so the callback is
//! redelivered.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde_json::{Map, Value};

use a2p_core::EventKind;
use a2p_workflow::{IngestReport, WorkflowError};

use super::json_error;
use super::state::AppState;

/// Messaging-service callback kinds registered by the messaging service
/// stage.
const CALLBACK_KINDS: &[&str] = &["inbound", "fallback", "status"];

/// A callback body, JSON or `application/x-www-form-urlencoded`.
///
/// Form fields become a flat JSON object of strings. Any other content
/// type is parsed as JSON.
pub(crate) struct WebhookBody(pub(crate) Value);

impl<S> FromRequest<S> for WebhookBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| {
                    json_error(StatusCode::BAD_REQUEST, "Invalid callback", e.body_text())
                        .into_response()
                })?;
            let object: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(WebhookBody(Value::Object(object)));
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            json_error(StatusCode::BAD_REQUEST, "Invalid callback", e.body_text()).into_response()
        })?;
        let value = serde_json::from_slice(&bytes).map_err(|e| {
            json_error(StatusCode::BAD_REQUEST, "Invalid callback", e).into_response()
        })?;
        Ok(WebhookBody(value))
    }
}

fn ingested(result: Result<IngestReport, WorkflowError>) -> Response {
    match result {
        Ok(report) => {
            let body = serde_json::json!({
                "success": true,
                "dumpId": report.dump_id,
                "digest": report.digest,
                "updated": report.updated,
                "unmatched": report.unmatched,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to record callback",
            e,
        )
        .into_response(),
    }
}

/// POST /webhooks/a2p/brand
pub(crate) async fn handle_brand_webhook(
    State(state): State<Arc<AppState>>,
    WebhookBody(payload): WebhookBody,
) -> Response {
    ingested(state.ingestor.ingest_status(EventKind::Brand, payload).await)
}

/// POST /webhooks/a2p/campaign
pub(crate) async fn handle_campaign_webhook(
    State(state): State<Arc<AppState>>,
    WebhookBody(payload): WebhookBody,
) -> Response {
    ingested(
        state
            .ingestor
            .ingest_status(EventKind::Campaign, payload)
            .await,
    )
}

/// POST /webhooks/twilio/{kind}
pub(crate) async fn handle_twilio_callback(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    WebhookBody(payload): WebhookBody,
) -> Response {
    if !CALLBACK_KINDS.contains(&kind.as_str()) {
        return json_error(
            StatusCode::NOT_FOUND,
            "Not found",
            format!("unknown callback kind '{}'", kind),
        )
        .into_response();
    }
    ingested(state.ingestor.record_callback(&kind, payload).await)
}
