//! Application registry for cross-app access.
//!
//! The demo suite consists of five applications. Each one is registered with
//! the identity provider as an OAuth client and runs its own authorization
//! server that mints access tokens for its API.
//!
//! # Overview
//!
//! - [`AppId`]: typed identity of each application
//! - [`AppRegistration`]: everything configured for one application
//! - [`AudienceMap`]: allow-list mapping canonical authorization-server
//!   identifiers to applications, built once at config load
//! - [`ClientRegistry`]: OAuth clients known to the identity provider
//! - [`resolve_source_app`]: picks the acting application from an identity
//!   token audience using a fixed priority list
//!
//! # Audience format
//!
//! Audiences are canonical URLs: lowercase, with a trailing slash
//! (`https://auth.todo0.com/`). [`normalize_audience`] converts inbound values
//! at the boundary. Opaque identifiers such as `todo0-auth-server` have no
//! canonical form and never resolve.

use crate::claims::Audience;
use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtKeys;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies an application in the demo suite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppId {
    /// Todo list application
    Todo0,
    /// AI chat front-end
    Agent0,
    /// Inventory application
    Inventory,
    /// AI assistant front-end
    Jarvis,
    /// Admin portal
    Admin,
}

/// Order in which application names are matched against an audience.
///
/// The assistants come first since their client ids are the more specific
/// identities when several names appear together.
pub const SOURCE_APP_PRIORITY: [AppId; 5] = [
    AppId::Jarvis,
    AppId::Agent0,
    AppId::Inventory,
    AppId::Todo0,
    AppId::Admin,
];

impl AppId {
    /// All applications.
    pub const ALL: [AppId; 5] = [
        AppId::Todo0,
        AppId::Agent0,
        AppId::Inventory,
        AppId::Jarvis,
        AppId::Admin,
    ];

    /// Convert AppId to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppId::Todo0 => "todo0",
            AppId::Agent0 => "agent0",
            AppId::Inventory => "inventory",
            AppId::Jarvis => "jarvis",
            AppId::Admin => "admin",
        }
    }

    /// Parse AppId from string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "todo0" => Some(AppId::Todo0),
            "agent0" => Some(AppId::Agent0),
            "inventory" => Some(AppId::Inventory),
            "jarvis" => Some(AppId::Jarvis),
            "admin" => Some(AppId::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AppId {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppId::parse(s).ok_or_else(|| AuthError::ConfigError(format!("Unknown application: {}", s)))
    }
}

/// Convert an audience identifier to canonical form.
///
/// Returns `None` for anything that is not an `http(s)` URL with a host.
pub fn normalize_audience(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let rest = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))?;

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || rest.contains(char::is_whitespace) || rest.contains(['?', '#']) {
        return None;
    }

    if lowered.ends_with('/') {
        Some(lowered)
    } else {
        Some(format!("{}/", lowered))
    }
}

/// Configuration for one application.
#[derive(Clone)]
pub struct AppRegistration {
    /// Application identity
    pub app: AppId,

    /// OAuth client id registered with the identity provider
    pub client_id: String,

    /// Client secret used to sign client assertions
    pub client_secret: String,

    /// Authorization server identifier (canonical audience URL)
    pub authorization_server: String,

    /// API audience written into access tokens
    pub api_audience: String,

    /// Secret the authorization server signs access tokens with
    pub token_signing_secret: String,
}

impl AppRegistration {
    /// Demo registration with built-in fallback secrets.
    pub fn demo(app: AppId) -> Self {
        Self {
            app,
            client_id: format!("{}-client", app),
            client_secret: format!("{}-demo-client-secret-change-me", app),
            authorization_server: format!("https://auth.{}.com/", app),
            api_audience: format!("https://api.{}.com/", app),
            token_signing_secret: format!("{}-demo-signing-secret-change-me", app),
        }
    }
}

impl std::fmt::Debug for AppRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRegistration")
            .field("app", &self.app)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authorization_server", &self.authorization_server)
            .field("api_audience", &self.api_audience)
            .field("token_signing_secret", &"[REDACTED]")
            .finish()
    }
}

/// Allow-list from canonical authorization-server identifiers to apps.
#[derive(Debug, Clone, Default)]
pub struct AudienceMap {
    by_audience: HashMap<String, AppId>,
    by_app: HashMap<AppId, String>,
}

impl AudienceMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from application registrations.
    pub fn from_registrations(registrations: &[AppRegistration]) -> AuthResult<Self> {
        let mut map = Self::new();
        for registration in registrations {
            map.insert(&registration.authorization_server, registration.app)?;
        }
        Ok(map)
    }

    /// Register `audience` for `app`. Fails for non-canonicalizable values
    /// and for audiences already claimed by another app.
    pub fn insert(&mut self, audience: &str, app: AppId) -> AuthResult<()> {
        let canonical = normalize_audience(audience).ok_or_else(|| {
            AuthError::ConfigError(format!("Audience for {} is not a URL: {}", app, audience))
        })?;

        if let Some(existing) = self.by_audience.get(&canonical) {
            if *existing != app {
                return Err(AuthError::ConfigError(format!(
                    "Audience {} registered for both {} and {}",
                    canonical, existing, app
                )));
            }
        }

        self.by_audience.insert(canonical.clone(), app);
        self.by_app.insert(app, canonical);
        Ok(())
    }

    /// Resolve a requested audience to an application.
    pub fn resolve(&self, audience: &str) -> Option<AppId> {
        let canonical = normalize_audience(audience)?;
        self.by_audience.get(&canonical).copied()
    }

    /// Canonical audience of `app`.
    pub fn audience_for(&self, app: AppId) -> Option<&str> {
        self.by_app.get(&app).map(String::as_str)
    }

    /// Number of registered audiences.
    pub fn len(&self) -> usize {
        self.by_audience.len()
    }

    /// Whether no audience is registered.
    pub fn is_empty(&self) -> bool {
        self.by_audience.is_empty()
    }
}

/// An OAuth client known to the identity provider.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    /// Client id
    pub client_id: String,

    /// Application this client belongs to
    pub app: Option<AppId>,

    keys: Arc<JwtKeys>,
}

impl RegisteredClient {
    /// Register a client authenticating with an HMAC shared secret.
    pub fn new(
        client_id: impl Into<String>,
        secret: impl Into<String>,
        app: Option<AppId>,
    ) -> AuthResult<Self> {
        Ok(Self {
            client_id: client_id.into(),
            app,
            keys: Arc::new(JwtKeys::hmac(secret)?),
        })
    }

    /// Keys verifying this client's assertions.
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }
}

/// OAuth clients by client id.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, RegisteredClient>,
}

impl ClientRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from application registrations.
    pub fn from_registrations(registrations: &[AppRegistration]) -> AuthResult<Self> {
        let mut registry = Self::new();
        for registration in registrations {
            registry.register(RegisteredClient::new(
                &registration.client_id,
                &registration.client_secret,
                Some(registration.app),
            )?);
        }
        Ok(registry)
    }

    /// Add or replace a client.
    pub fn register(&mut self, client: RegisteredClient) {
        self.clients.insert(client.client_id.clone(), client);
    }

    /// Look up a client.
    pub fn get(&self, client_id: &str) -> Option<&RegisteredClient> {
        self.clients.get(client_id)
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Determine the acting application from an identity token audience.
///
/// Walks [`SOURCE_APP_PRIORITY`] and returns the first application whose
/// name appears in any audience value, so the result does not depend on
/// the order of values in the claim.
pub fn resolve_source_app(audience: &Audience) -> Option<AppId> {
    let values: Vec<String> = audience.iter().map(str::to_lowercase).collect();
    SOURCE_APP_PRIORITY
        .into_iter()
        .find(|app| values.iter().any(|value| value.contains(app.as_str())))
}
