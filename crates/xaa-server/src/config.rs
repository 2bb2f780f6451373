//! Server configuration.
//!
//! Loaded once from environment variables at startup. Every value has a
//! demo fallback so the suite runs locally without setup; deployments are
//! expected to override at least the secrets.

use std::net::SocketAddr;
use thiserror::Error;
use xaa_auth::{normalize_audience, AppId, AppRegistration};
use xaa_client::{OrchestratorConfig, ServiceEndpoint, DEFAULT_HOP_TIMEOUT_MS};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default public base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default identity provider issuer.
pub const DEFAULT_IDP_ISSUER: &str = "https://idp.xaa.dev";

const DEMO_IDP_SIGNING_SECRET: &str = "idp-demo-signing-secret-change-me";

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

    /// Configuration was valid but could not be turned into service state.
    #[error("Failed to initialize {component}: {message}")]
    Setup {
        /// Component being built.
        component: String,
        /// Error message.
        message: String,
    },
}

/// Service configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,

    /// URL this service is reachable at. Orchestrators call back into it.
    pub base_url: String,

    /// Identity provider issuer.
    pub idp_issuer: String,

    /// Secret the identity provider signs subject tokens and ID-JAGs with.
    pub idp_signing_secret: String,

    /// Timeout applied to each orchestrator hop, in milliseconds.
    pub hop_timeout_ms: u64,

    /// Whether orchestrators cache downstream access tokens.
    pub cache_tokens: bool,

    /// Every hosted application.
    pub apps: Vec<AppRegistration>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("base_url", &self.base_url)
            .field("idp_issuer", &self.idp_issuer)
            .field("idp_signing_secret", &"[REDACTED]")
            .field("hop_timeout_ms", &self.hop_timeout_ms)
            .field("cache_tokens", &self.cache_tokens)
            .field("apps", &self.apps)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::demo(SocketAddr::from(([127, 0, 0, 1], 8080)), DEFAULT_BASE_URL)
    }
}

fn app_var(app: AppId, suffix: &str) -> String {
    format!("{}_{}", app.as_str().to_uppercase(), suffix)
}

fn override_from_env(target: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

impl ServerConfig {
    /// Demo configuration serving at `base_url`.
    pub fn demo(bind_addr: SocketAddr, base_url: impl Into<String>) -> Self {
        Self {
            bind_addr,
            base_url: base_url.into(),
            idp_issuer: DEFAULT_IDP_ISSUER.to_string(),
            idp_signing_secret: DEMO_IDP_SIGNING_SECRET.to_string(),
            hop_timeout_ms: DEFAULT_HOP_TIMEOUT_MS,
            cache_tokens: false,
            apps: AppId::ALL.into_iter().map(AppRegistration::demo).collect(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables (`{APP}` is the upper-cased app name):
    /// - `XAA_BIND_ADDR`: listen address (default: 127.0.0.1:8080)
    /// - `XAA_BASE_URL`: public base URL (default: http://localhost:8080)
    /// - `XAA_IDP_ISSUER`: identity provider issuer
    /// - `XAA_IDP_SIGNING_SECRET`: identity provider signing secret
    /// - `XAA_HOP_TIMEOUT_MS`: per-hop timeout (default: 10000)
    /// - `XAA_CACHE_TOKENS`: cache downstream access tokens (default: false)
    /// - `{APP}_CLIENT_ID`, `{APP}_CLIENT_SECRET`, `{APP}_AUTH_SERVER`,
    ///   `{APP}_API_AUDIENCE`, `{APP}_TOKEN_SIGNING_SECRET`
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_addr = std::env::var("XAA_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse().map_err(|_| ConfigError::InvalidValue {
            key: "XAA_BIND_ADDR".to_string(),
            message: format!("not a socket address: {}", raw_addr),
        })?;
        let base_url = std::env::var("XAA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let mut config = Self::demo(bind_addr, base_url);
        override_from_env(&mut config.idp_issuer, "XAA_IDP_ISSUER");
        override_from_env(&mut config.idp_signing_secret, "XAA_IDP_SIGNING_SECRET");

        if let Ok(raw) = std::env::var("XAA_HOP_TIMEOUT_MS") {
            config.hop_timeout_ms = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "XAA_HOP_TIMEOUT_MS".to_string(),
                message: format!("not a number: {}", raw),
            })?;
        }
        config.cache_tokens = std::env::var("XAA_CACHE_TOKENS")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);

        for registration in config.apps.iter_mut() {
            let app = registration.app;
            override_from_env(&mut registration.client_id, &app_var(app, "CLIENT_ID"));
            override_from_env(&mut registration.client_secret, &app_var(app, "CLIENT_SECRET"));
            override_from_env(&mut registration.authorization_server, &app_var(app, "AUTH_SERVER"));
            override_from_env(&mut registration.api_audience, &app_var(app, "API_AUDIENCE"));
            override_from_env(
                &mut registration.token_signing_secret,
                &app_var(app, "TOKEN_SIGNING_SECRET"),
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// URL of the token exchange endpoint. Client assertions are addressed to it.
    pub fn token_endpoint(&self) -> String {
        ServiceEndpoint::new(self.base_url.as_str()).url("/token-exchange")
    }

    /// Registration of `app`.
    pub fn registration(&self, app: AppId) -> Option<&AppRegistration> {
        self.apps.iter().find(|r| r.app == app)
    }

    /// Orchestrator configuration for `app`, calling back into this service.
    pub fn orchestrator_config(&self, app: AppId) -> Option<OrchestratorConfig> {
        let registration = self.registration(app)?;
        let mut config = OrchestratorConfig::hosted(registration, &self.base_url);
        config.token_exchange_url = self.token_endpoint();
        config.hop_timeout_ms = self.hop_timeout_ms;
        config.cache_tokens = self.cache_tokens;
        for (target, endpoint) in config.targets.iter_mut() {
            if let Some(target_registration) = self.registration(*target) {
                endpoint.audience = target_registration.authorization_server.clone();
            }
        }
        Some(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "XAA_BASE_URL".to_string(),
                message: format!("not an http(s) URL: {}", self.base_url),
            });
        }
        if self.idp_issuer.is_empty() {
            return Err(ConfigError::Missing("XAA_IDP_ISSUER".to_string()));
        }
        if self.idp_signing_secret.is_empty() {
            return Err(ConfigError::Missing("XAA_IDP_SIGNING_SECRET".to_string()));
        }
        if self.hop_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "XAA_HOP_TIMEOUT_MS".to_string(),
                message: "must be positive".to_string(),
            });
        }

        for registration in &self.apps {
            let app = registration.app;
            if registration.client_id.is_empty() {
                return Err(ConfigError::Missing(app_var(app, "CLIENT_ID")));
            }
            if registration.client_secret.is_empty() {
                return Err(ConfigError::Missing(app_var(app, "CLIENT_SECRET")));
            }
            if registration.token_signing_secret.is_empty() {
                return Err(ConfigError::Missing(app_var(app, "TOKEN_SIGNING_SECRET")));
            }
            if normalize_audience(&registration.authorization_server).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: app_var(app, "AUTH_SERVER"),
                    message: format!("not a URL audience: {}", registration.authorization_server),
                });
            }
        }
        Ok(())
    }
}
