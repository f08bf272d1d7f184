//! Instagram comment webhook
//!
//! Receives comment notifications, looks for the trigger phrase and forwards
//! matches to GitHub as repository dispatch events.

pub mod dispatch;
pub mod payload;
pub mod server;

pub use dispatch::{
    DispatchError, DispatchPayload, DispatchResult, DispatchTarget, GitHubDispatcher,
};
pub use payload::{CommentEvent, PayloadError, WebhookEnvelope, TRIGGER_PHRASE};
pub use server::{
    create_webhook_router, health_handler, AppState, StatusResponse, WebhookError, WebhookResult,
};
