//! Orchestrator configuration.
//!
//! Holds the requesting application's client credentials, the identity
//! provider endpoint and the endpoints of every target application.
//! Configuration is loaded from environment variables with demo defaults
//! and is immutable once the orchestrator is built.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use xaa_auth::{normalize_audience, AppId, AppRegistration};

/// Default per-hop timeout.
pub const DEFAULT_HOP_TIMEOUT_MS: u64 = 10_000;

/// Default base URL of the demo service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required value.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// A base URL plus path joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Base URL for the service (e.g., "https://todo0.example.com").
    pub base_url: String,
}

impl ServiceEndpoint {
    /// Endpoint at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}

/// Where and how to reach one target application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEndpoint {
    /// Authorization server identifier requested as `audience`
    pub audience: String,

    /// URL of the target's JWT-bearer token endpoint
    pub token_url: String,

    /// Base of the target's resource API
    pub api: ServiceEndpoint,
}

impl TargetEndpoint {
    /// Endpoints of `app` hosted under `base`: `/{app}/oauth2/token` and
    /// `/{app}/api`.
    pub fn hosted(base: &ServiceEndpoint, app: AppId, audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            token_url: base.url(&format!("/{}/oauth2/token", app)),
            api: ServiceEndpoint::new(base.url(&format!("/{}/api", app))),
        }
    }
}

/// Delegation orchestrator configuration.
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// Application running the orchestrator.
    pub app: AppId,

    /// Client id registered with the identity provider.
    pub client_id: String,

    /// Client secret signing client assertions.
    pub client_secret: String,

    /// Identity provider token exchange URL; also the client assertion audience.
    pub token_exchange_url: String,

    /// Target applications.
    pub targets: HashMap<AppId, TargetEndpoint>,

    /// Timeout applied to each hop, in milliseconds.
    pub hop_timeout_ms: u64,

    /// Whether downstream access tokens are cached.
    pub cache_tokens: bool,
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("app", &self.app)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_exchange_url", &self.token_exchange_url)
            .field("targets", &self.targets)
            .field("hop_timeout_ms", &self.hop_timeout_ms)
            .field("cache_tokens", &self.cache_tokens)
            .finish()
    }
}

fn env_key(app: AppId, suffix: &str) -> String {
    format!("{}_{}", app.as_str().to_uppercase(), suffix)
}

impl OrchestratorConfig {
    /// Configuration for `app` with every other application as a target,
    /// all hosted under `base_url`.
    pub fn hosted(registration: &AppRegistration, base_url: &str) -> Self {
        let base = ServiceEndpoint::new(base_url);
        let targets = AppId::ALL
            .into_iter()
            .filter(|app| *app != registration.app)
            .map(|app| {
                let audience = AppRegistration::demo(app).authorization_server;
                (app, TargetEndpoint::hosted(&base, app, audience))
            })
            .collect();

        Self {
            app: registration.app,
            client_id: registration.client_id.clone(),
            client_secret: registration.client_secret.clone(),
            token_exchange_url: base.url("/token-exchange"),
            targets,
            hop_timeout_ms: DEFAULT_HOP_TIMEOUT_MS,
            cache_tokens: false,
        }
    }

    /// Load configuration for `app` from environment variables.
    ///
    /// Environment variables (`{APP}` is the upper-cased app name):
    /// - `XAA_BASE_URL`: base URL of the hosted apps (default: http://localhost:8080)
    /// - `XAA_TOKEN_EXCHANGE_URL`: token exchange URL (default: `{XAA_BASE_URL}/token-exchange`)
    /// - `{APP}_CLIENT_ID` / `{APP}_CLIENT_SECRET`: this app's credentials
    /// - `{APP}_AUTH_SERVER`: a target's authorization server id
    /// - `XAA_HOP_TIMEOUT_MS`: per-hop timeout (default: 10000)
    /// - `XAA_CACHE_TOKENS`: cache access tokens (default: false)
    pub fn from_env(app: AppId) -> Result<Self, ConfigError> {
        let base_url = std::env::var("XAA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let demo = AppRegistration::demo(app);

        let mut config = Self::hosted(&demo, &base_url);
        if let Ok(url) = std::env::var("XAA_TOKEN_EXCHANGE_URL") {
            config.token_exchange_url = url;
        }
        if let Ok(client_id) = std::env::var(env_key(app, "CLIENT_ID")) {
            config.client_id = client_id;
        }
        if let Ok(secret) = std::env::var(env_key(app, "CLIENT_SECRET")) {
            config.client_secret = secret;
        }
        for (target, endpoint) in config.targets.iter_mut() {
            if let Ok(audience) = std::env::var(env_key(*target, "AUTH_SERVER")) {
                endpoint.audience = audience;
            }
        }
        if let Ok(raw) = std::env::var("XAA_HOP_TIMEOUT_MS") {
            config.hop_timeout_ms = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "XAA_HOP_TIMEOUT_MS".to_string(),
                message: format!("not a number: {}", raw),
            })?;
        }
        config.cache_tokens = std::env::var("XAA_CACHE_TOKENS")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    /// Per-hop timeout as a Duration.
    pub fn hop_timeout(&self) -> Duration {
        Duration::from_millis(self.hop_timeout_ms)
    }

    /// Endpoint of `target`.
    pub fn target(&self, target: AppId) -> Option<&TargetEndpoint> {
        self.targets.get(&target)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing("client_id".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::Missing("client_secret".to_string()));
        }
        if self.hop_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "hop_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        for (app, target) in &self.targets {
            if normalize_audience(&target.audience).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: env_key(*app, "AUTH_SERVER"),
                    message: format!("not a URL audience: {}", target.audience),
                });
            }
        }
        Ok(())
    }
}
