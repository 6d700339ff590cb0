//! `a2p serve` -- HTTP JSON API for A2P 10DLC registration.
//!
//! Security features:
//! - CORS headers on all responses (permissive)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication via `A2P_API_KEY`
//!
//! Endpoints:
//! - GET  /health                      - Server status (exempt from auth)
//! - POST /a2p                         - Run a registration through all five stages
//! - GET  /registrations?userId=       - An owner's registrations, newest first
//! - GET  /registrations/watch         - Long-poll for changes to an owner's registrations
//! - GET  /registrations/{id}          - One registration
//! - POST /webhooks/a2p/brand          - Brand status callback (exempt from auth)
//! - POST /webhooks/a2p/campaign       - Campaign status callback (exempt from auth)
//! - POST /webhooks/twilio/{kind}      - Messaging callbacks, recorded only (exempt from auth)
//! - GET  /webhooks/dumps?limit=       - Recent raw callbacks
//! - GET  /activity                    - Recent activity
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;
mod webhooks;

#[cfg(test)]
mod tests;

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use a2p_provider::TwilioClient;
use a2p_workflow::ActivityLog;

use crate::config::A2pConfig;
use crate::open_store;

use self::handlers::{
    handle_activity, handle_get_registration, handle_health, handle_list_dumps,
    handle_list_registrations, handle_not_found, handle_register, handle_watch_registrations,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::AppState;
use self::webhooks::{handle_brand_webhook, handle_campaign_webhook, handle_twilio_callback};

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// `{success: false, message, error}` with the given status code.
fn json_error(status: StatusCode, message: &str, error: impl Display) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "message": message,
            "error": error.to_string(),
        })),
    )
}

/// Assemble the router over `state`, with every middleware layer.
fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/a2p", post(handle_register))
        .route("/registrations", get(handle_list_registrations))
        .route("/registrations/watch", get(handle_watch_registrations))
        .route("/registrations/{id}", get(handle_get_registration))
        .route("/webhooks/a2p/brand", post(handle_brand_webhook))
        .route("/webhooks/a2p/campaign", post(handle_campaign_webhook))
        .route("/webhooks/twilio/{kind}", post(handle_twilio_callback))
        .route("/webhooks/dumps", get(handle_list_dumps))
        .route("/activity", get(handle_activity))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub async fn start_server(
    config: A2pConfig,
    port: u16,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config.data_file.as_deref())?;
    let hub = Arc::new(TwilioClient::new(
        config.credentials.clone(),
        config.endpoints.clone(),
    ));
    let activity = Arc::new(ActivityLog::new(config.activity_capacity));

    if config.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    tracing::info!(
        rate_limit = config.rate_limit,
        base_url = %config.base_url,
        "rate limit: {} requests per minute per IP",
        config.rate_limit
    );

    let state = Arc::new(AppState::new(
        store,
        hub,
        &config.base_url,
        activity,
        config.rate_limit,
        config.api_key.clone(),
    ));
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        tracing::info!("a2p listening on https://{}", addr);
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("a2p listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
