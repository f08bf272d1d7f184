//! Runtime settings for the webhook receiver.
//!
//! Settings are layered with the `config` crate: built-in defaults, an
//! optional TOML file, `COMMENT_DISPATCH__*` environment variables, and
//! finally the well-known unprefixed variables the hosting platform sets
//! (`PORT`, `WEBHOOK_VERIFY_TOKEN`, `GITHUB_TOKEN`).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Verification token used when none is configured.
pub const DEFAULT_VERIFY_TOKEN: &str = "instagram_webhook_secret_2024";

/// Prefix for structured environment overrides (`COMMENT_DISPATCH__GITHUB__OWNER`).
const ENV_PREFIX: &str = "COMMENT_DISPATCH";

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration file path is not valid UTF-8.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// A value was read but cannot be used.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    /// A source could not be parsed or deserialized.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

/// Where repository dispatch calls go and how they authenticate.
#[derive(Clone, Deserialize)]
pub struct GitHubSettings {
    /// Token sent as `Authorization: Bearer <token>`. May be empty.
    pub token: String,
    /// API root, overridable for GitHub Enterprise or tests
    pub api_base: String,
    pub owner: String,
    pub repo: String,
}

impl GitHubSettings {
    /// Full URL of the repository dispatch endpoint.
    pub fn dispatch_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/dispatches",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }
}

impl fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("token", &redact(&self.token))
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish()
    }
}

/// Complete settings for one running server.
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub bind_address: String,
    pub port: u16,
    /// Path the webhook endpoint is mounted on
    pub webhook_path: String,
    /// Shared secret the platform echoes back during the subscription handshake
    pub verify_token: String,
    pub github: GitHubSettings,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("webhook_path", &self.webhook_path)
            .field("verify_token", &redact(&self.verify_token))
            .field("github", &self.github)
            .finish()
    }
}

/// A set-but-empty variable counts as unset, so the layer below still applies.
fn non_empty(env: &HashMap<String, String>, key: &str) -> Option<String> {
    env.get(key).filter(|value| !value.is_empty()).cloned()
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            webhook_path: "/api/webhook".to_string(),
            verify_token: DEFAULT_VERIFY_TOKEN.to_string(),
            github: GitHubSettings {
                token: String::new(),
                api_base: "https://api.github.com".to_string(),
                owner: "domenecmiralles".to_string(),
                repo: "scheduled_posting".to_string(),
            },
        }
    }
}

impl Settings {
    /// Load settings from the process environment and an optional TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is given but missing, or if any source
    /// holds a value of the wrong type (e.g. a non-numeric `PORT`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Same as [`Settings::load`] but reads variables from `env` instead of
    /// the process environment.
    pub fn load_with_env(
        path: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let mut builder = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", defaults.port as i64)?
            .set_default("webhook_path", defaults.webhook_path)?
            .set_default("verify_token", defaults.verify_token)?
            .set_default("github.token", defaults.github.token)?
            .set_default("github.api_base", defaults.github.api_base)?
            .set_default("github.owner", defaults.github.owner)?
            .set_default("github.repo", defaults.github.repo)?;

        if let Some(path) = path {
            let path_str = path
                .to_str()
                .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path_str.to_string()));
            }
            builder = builder.add_source(File::with_name(path_str));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env.clone().into_iter().collect())),
            )
            .set_override_option("port", non_empty(&env, "PORT"))?
            .set_override_option("verify_token", non_empty(&env, "WEBHOOK_VERIFY_TOKEN"))?
            .set_override_option("github.token", non_empty(&env, "GITHUB_TOKEN"))?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.webhook_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "webhook_path must start with '/': {}",
                self.webhook_path
            )));
        }
        if self.webhook_path == "/health" {
            return Err(ConfigError::InvalidValue(
                "webhook_path cannot be /health".to_string(),
            ));
        }
        Ok(())
    }

    /// True when the verification token was never configured.
    pub fn uses_default_verify_token(&self) -> bool {
        self.verify_token == DEFAULT_VERIFY_TOKEN
    }

    /// Get the full bind address (ip:port)
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
