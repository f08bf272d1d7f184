//! Webhook server implementation
//!
//! One endpoint receives everything the platform sends. `GET` is the
//! subscription handshake, `POST` carries events, and every other method is
//! refused. A `/health` route sits alongside for the hosting platform.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::dispatch::{DispatchPayload, DispatchTarget};
use super::payload::{PayloadError, WebhookEnvelope};
use crate::config::Settings;

/// Shared application state. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<dyn DispatchTarget>,
}

impl AppState {
    pub fn new(settings: Settings, dispatcher: Arc<dyn DispatchTarget>) -> Self {
        Self {
            settings: Arc::new(settings),
            dispatcher,
        }
    }
}

/// Webhook error types
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Handshake token did not match
    #[error("Forbidden")]
    Forbidden,

    /// The event body could not be processed
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            WebhookError::Payload(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::error(err.to_string())),
            )
                .into_response(),
            WebhookError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(StatusResponse::error("Method not allowed")),
            )
                .into_response(),
        }
    }
}

/// Result type for webhook operations
pub type WebhookResult<T> = Result<T, WebhookError>;

/// JSON body of every webhook response except the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

/// Query parameters of the subscription handshake.
#[derive(Debug, Default, Deserialize)]
pub struct VerificationRequest {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

impl VerificationRequest {
    /// Read the handshake parameters from a request URI. A query string that
    /// cannot be decoded is treated as carrying no parameters.
    pub fn from_uri(uri: &Uri) -> Self {
        Query::<Self>::try_from_uri(uri)
            .map(|Query(request)| request)
            .unwrap_or_default()
    }
}

/// What happened while processing one event delivery.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventSummary {
    /// Comment changes seen
    pub comments: usize,
    /// Comments whose text matched the trigger phrase
    pub triggers: usize,
    /// Dispatches the API accepted
    pub dispatched: usize,
    /// Dispatches that errored or were rejected; logged, never surfaced
    pub failed: usize,
}

/// Create the webhook router with all routes
pub fn create_webhook_router(state: AppState) -> Router {
    let webhook_path = state.settings.webhook_path.clone();
    Router::new()
        .route("/health", get(health_handler))
        .route(&webhook_path, any(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint handler
///
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Webhook endpoint handler, dispatching on the request method.
pub async fn webhook_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    match method {
        Method::GET => {
            let request = VerificationRequest::from_uri(&uri);
            handle_verification(&state.settings.verify_token, request).into_response()
        }
        Method::POST => match handle_event(state.dispatcher.as_ref(), &body).await {
            Ok(summary) => {
                info!(
                    comments = summary.comments,
                    triggers = summary.triggers,
                    dispatched = summary.dispatched,
                    failed = summary.failed,
                    "Webhook processed"
                );
                Json(StatusResponse::success("Webhook processed")).into_response()
            }
            Err(err) => {
                error!(error = %err, "Error processing webhook");
                err.into_response()
            }
        },
        other => {
            debug!(method = %other, "Rejected webhook request method");
            WebhookError::MethodNotAllowed.into_response()
        }
    }
}

/// Answer the subscription handshake.
///
/// The challenge is echoed back untouched when the token matches.
pub fn handle_verification(
    expected_token: &str,
    request: VerificationRequest,
) -> WebhookResult<String> {
    if request.token.as_deref() == Some(expected_token) {
        info!(mode = ?request.mode, "Webhook verified successfully");
        Ok(request.challenge.unwrap_or_default())
    } else {
        warn!(mode = ?request.mode, "Webhook verification failed");
        Err(WebhookError::Forbidden)
    }
}

/// Process one event delivery.
///
/// Every comment whose text matches the trigger phrase is dispatched once.
/// Dispatch failures are logged and counted but never fail the delivery;
/// only a body that cannot be parsed does.
pub async fn handle_event(
    dispatcher: &dyn DispatchTarget,
    body: &[u8],
) -> WebhookResult<EventSummary> {
    debug!(body = %String::from_utf8_lossy(body), "Received webhook");

    let envelope = WebhookEnvelope::from_slice(body)?;
    let comments = envelope.comment_events()?;

    let mut summary = EventSummary {
        comments: comments.len(),
        ..Default::default()
    };

    if comments.is_empty() {
        info!("No comment events in webhook");
    }

    for comment in &comments {
        debug!(
            comment_id = ?comment.comment_id(),
            text = ?comment.normalized_text(),
            "Comment received"
        );
        if !comment.is_trigger() {
            continue;
        }

        summary.triggers += 1;
        info!(comment_id = ?comment.comment_id(), "Trigger phrase detected, sending repository dispatch");

        let payload = DispatchPayload::for_comment(comment);
        match dispatcher.dispatch(&payload).await {
            Ok(()) => {
                summary.dispatched += 1;
                info!(comment_id = ?comment.comment_id(), "Repository dispatch sent");
            }
            Err(err) => {
                summary.failed += 1;
                error!(
                    comment_id = ?comment.comment_id(),
                    error = %err,
                    "Failed to send repository dispatch"
                );
            }
        }
    }

    Ok(summary)
}
