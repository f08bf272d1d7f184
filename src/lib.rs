//! comment-dispatch - Instagram comment webhook to GitHub repository dispatch
//!
//! The library exposes the webhook server pieces so they can be embedded in
//! another axum application or driven from integration tests.

pub mod config;
pub mod logging;
pub mod webhook;
