//! GitHub repository dispatch
//!
//! A matching comment is forwarded as a `repository_dispatch` event so a
//! workflow in the target repository can pick it up. Failures are reported to
//! the caller, which only logs them.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::payload::CommentEvent;
use crate::config::GitHubSettings;

/// `event_type` the receiving workflow listens for.
pub const DISPATCH_EVENT_TYPE: &str = "instagram_fun_fact_comment";

/// User agent sent with every dispatch request.
pub const USER_AGENT: &str = "Instagram-Webhook-Handler";

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Body of a repository dispatch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub event_type: String,
    pub client_payload: ClientPayload,
}

/// Comment details handed to the workflow. Ids keep the JSON type the
/// platform used; absent ids serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPayload {
    pub comment_id: Option<Value>,
    pub user_id: Option<Value>,
    pub media_id: Option<Value>,
    /// Comment text as the user wrote it, before normalization
    pub comment_text: Option<String>,
    /// ISO-8601 UTC with millisecond precision
    pub timestamp: String,
}

impl DispatchPayload {
    /// Build the payload for a comment, stamped with the current time.
    pub fn for_comment(comment: &CommentEvent) -> Self {
        Self::for_comment_at(comment, Utc::now())
    }

    pub fn for_comment_at(comment: &CommentEvent, at: DateTime<Utc>) -> Self {
        Self {
            event_type: DISPATCH_EVENT_TYPE.to_string(),
            client_payload: ClientPayload {
                comment_id: comment.comment_id().cloned(),
                user_id: comment.from_user_id().cloned(),
                media_id: comment.media_id().cloned(),
                comment_text: comment.text.clone(),
                timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }
    }
}

/// Errors from a dispatch attempt.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request never got a response.
    #[error("dispatch request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("dispatch rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Somewhere a dispatch payload can be sent.
#[async_trait]
pub trait DispatchTarget: Send + Sync {
    /// Send one payload. Called at most once per matching comment; no retries.
    async fn dispatch(&self, payload: &DispatchPayload) -> DispatchResult<()>;
}

/// Sends payloads to the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubDispatcher {
    client: Client,
    url: String,
    token: String,
}

impl GitHubDispatcher {
    /// Create a dispatcher for the configured repository.
    pub fn new(settings: &GitHubSettings) -> DispatchResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Create a dispatcher that reuses an existing client.
    pub fn with_client(client: Client, settings: &GitHubSettings) -> Self {
        Self {
            client,
            url: settings.dispatch_url(),
            token: settings.token.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DispatchTarget for GitHubDispatcher {
    async fn dispatch(&self, payload: &DispatchPayload) -> DispatchResult<()> {
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", GITHUB_ACCEPT)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(DispatchError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(HeaderMap, DispatchPayload)>>>;

    /// Spawn a stand-in for the dispatch endpoint that records requests and
    /// answers with `status`.
    async fn spawn_github(status: u16) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/repos/{owner}/{repo}/dispatches",
                post(
                    move |State(captured): State<Captured>,
                          headers: HeaderMap,
                          Json(payload): Json<DispatchPayload>| async move {
                        captured.lock().unwrap().push((headers, payload));
                        let status = axum::http::StatusCode::from_u16(status).unwrap();
                        (status, "upstream says no")
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), captured)
    }

    fn github_settings(api_base: &str) -> GitHubSettings {
        let mut settings = Settings::default().github;
        settings.api_base = api_base.to_string();
        settings.token = "ghp_test".to_string();
        settings
    }

    fn trigger_comment() -> CommentEvent {
        serde_json::from_value(serde_json::json!({
            "id": "c1",
            "text": "  Fun Fact ",
            "from": {"id": "u1"},
            "media": {"id": "m1"}
        }))
        .unwrap()
    }

    #[test]
    fn test_payload_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let payload = DispatchPayload::for_comment_at(&trigger_comment(), at);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event_type": "instagram_fun_fact_comment",
                "client_payload": {
                    "comment_id": "c1",
                    "user_id": "u1",
                    "media_id": "m1",
                    "comment_text": "  Fun Fact ",
                    "timestamp": "2024-05-01T12:00:00.000Z"
                }
            })
        );
    }

    #[test]
    fn test_payload_with_missing_ids() {
        let comment = CommentEvent {
            text: Some("fun fact".to_string()),
            ..Default::default()
        };
        let payload = DispatchPayload::for_comment(&comment);
        assert!(payload.client_payload.comment_id.is_none());
        assert!(payload.client_payload.user_id.is_none());
        assert!(payload.client_payload.media_id.is_none());
        assert!(payload.client_payload.timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_dispatch_sends_expected_request() {
        let (base, captured) = spawn_github(204).await;
        let dispatcher = GitHubDispatcher::new(&github_settings(&base)).unwrap();
        assert_eq!(
            dispatcher.url(),
            format!("{base}/repos/domenecmiralles/scheduled_posting/dispatches")
        );

        let payload = DispatchPayload::for_comment(&trigger_comment());
        dispatcher.dispatch(&payload).await.unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (headers, received) = &captured[0];
        assert_eq!(received, &payload);
        assert_eq!(headers["authorization"], "Bearer ghp_test");
        assert_eq!(headers["accept"], "application/vnd.github.v3+json");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["user-agent"], "Instagram-Webhook-Handler");
    }

    #[tokio::test]
    async fn test_dispatch_reports_rejection() {
        let (base, captured) = spawn_github(401).await;
        let dispatcher = GitHubDispatcher::new(&github_settings(&base)).unwrap();

        let err = dispatcher
            .dispatch(&DispatchPayload::for_comment(&trigger_comment()))
            .await
            .unwrap_err();

        match err {
            DispatchError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "upstream says no");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_reports_transport_failure() {
        // Bind then drop to get a port nobody is listening on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dispatcher = GitHubDispatcher::new(&github_settings(&format!("http://{addr}"))).unwrap();
        let err = dispatcher
            .dispatch(&DispatchPayload::for_comment(&trigger_comment()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }
}
