//! HTTP application wiring.
//!
//! Builds the shared state from configuration and composes the router. One
//! process hosts the identity provider and every demo application; the
//! orchestrators reach the other applications over HTTP through
//! `ServerConfig::base_url`, exactly as separately deployed apps would.

use crate::api;
use crate::config::{ConfigError, ServerConfig};
use crate::store::ResourceStore;
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use xaa_auth::{
    AppId, AudienceMap, ClientRegistry, DownstreamMinter, ExchangeSettings, JwtKeys,
    SubjectTokenIssuer, TokenExchangeEngine,
};
use xaa_client::DelegationOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub engine: Arc<TokenExchangeEngine>,
    pub subject_issuer: Arc<SubjectTokenIssuer>,
    pub minters: Arc<HashMap<AppId, DownstreamMinter>>,
    pub orchestrators: Arc<HashMap<AppId, DelegationOrchestrator>>,
    pub store: Arc<dyn ResourceStore>,
}

fn setup_error(component: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Setup {
        component: component.to_string(),
        message: err.to_string(),
    }
}

impl AppState {
    /// Build the identity provider, one minter and one orchestrator per
    /// application from validated configuration.
    pub fn new(config: ServerConfig, store: Arc<dyn ResourceStore>) -> Result<Self, ConfigError> {
        config.validate()?;

        let idp_keys = Arc::new(
            JwtKeys::hmac(config.idp_signing_secret.as_str())
                .map_err(|e| setup_error("identity provider keys", e))?,
        );
        let clients = ClientRegistry::from_registrations(&config.apps)
            .map_err(|e| setup_error("client registry", e))?;
        let audiences = AudienceMap::from_registrations(&config.apps)
            .map_err(|e| setup_error("audience map", e))?;

        let engine = TokenExchangeEngine::new(
            ExchangeSettings {
                issuer: config.idp_issuer.clone(),
                token_endpoint: config.token_endpoint(),
            },
            idp_keys.clone(),
            clients,
            audiences,
        );
        let subject_issuer = SubjectTokenIssuer::new(config.idp_issuer.clone(), idp_keys.clone());

        let mut minters = HashMap::new();
        let mut orchestrators = HashMap::new();
        for registration in &config.apps {
            let minter = DownstreamMinter::new(registration, config.idp_issuer.clone(), idp_keys.clone())
                .map_err(|e| setup_error(&format!("{} minter", registration.app), e))?;
            minters.insert(registration.app, minter);

            let orchestrator_config = config
                .orchestrator_config(registration.app)
                .ok_or_else(|| ConfigError::Missing(format!("{} registration", registration.app)))?;
            let orchestrator = DelegationOrchestrator::new(orchestrator_config)
                .map_err(|e| setup_error(&format!("{} orchestrator", registration.app), e))?;
            orchestrators.insert(registration.app, orchestrator);
        }

        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            subject_issuer: Arc::new(subject_issuer),
            minters: Arc::new(minters),
            orchestrators: Arc::new(orchestrators),
            store,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        });

    Router::new()
        .route("/health", get(api::system::health))
        .route("/idp/login", post(api::idp::login))
        .route("/token-exchange", post(api::exchange::token_exchange))
        .route("/:app/oauth2/token", post(api::token::issue_access_token))
        .route("/:app/cross-app-access", post(api::cross_app::cross_app_access))
        .route("/:app/assistant", post(api::assistant::ask))
        .route(
            "/:app/api/items",
            get(api::resources::list_items).post(api::resources::create_item),
        )
        .layer(trace_layer)
        .with_state(state)
}
