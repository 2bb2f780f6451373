//! Delegation orchestrator.
//!
//! Runs the call chain a requesting application executes to act for a user
//! in a target application:
//!
//! 1. check the user's subject token locally (abort if expired)
//! 2. exchange it at the identity provider for a delegation token
//! 3. present the delegation token at the target's token endpoint
//! 4. call the target's resource API with the resulting access token
//!
//! Hops are strictly sequential and never retried. Any failure aborts the
//! chain with an [`OrchestrationError`] naming the hop;
//! [`DelegationOrchestrator::fetch_with_fallback`] turns that into an
//! explicit, logged fallback.

use crate::cache::AccessTokenCache;
use crate::clients::{build_http_client, AppTokenClient, IdpClient, ResourceClient};
use crate::config::OrchestratorConfig;
use crate::error::{Hop, OrchestrationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use xaa_auth::jwt::{decode_token, token_digest, token_fingerprint};
use xaa_auth::{
    client_assertion, unix_now, AccessTokenResponse, AppId, JwtKeys, SubjectClaims,
    TokenExchangeRequest, CLIENT_ASSERTION_TYPE, GRANT_TYPE_TOKEN_EXCHANGE, TOKEN_TYPE_ID_JAG,
    TOKEN_TYPE_ID_TOKEN,
};

/// Result of hops 1 and 2.
#[derive(Debug, Clone)]
pub struct Delegation {
    /// Target application
    pub target: AppId,

    /// Delegation token; `None` when the access token came from the cache
    pub id_jag_token: Option<String>,

    /// Access token for the target's API
    pub access: AccessTokenResponse,
}

/// Personalized data from a target application, or an explicit fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegatedData<T> {
    /// Data fetched on the user's behalf
    Personalized(T),
    /// The chain failed; callers serve a general answer
    Fallback {
        /// Sanitized failure reason
        reason: String,
    },
}

impl<T> DelegatedData<T> {
    /// Whether personalized data was obtained.
    pub fn is_personalized(&self) -> bool {
        matches!(self, DelegatedData::Personalized(_))
    }
}

/// Coordinates the delegation chain for one requesting application.
pub struct DelegationOrchestrator {
    config: OrchestratorConfig,
    signer: JwtKeys,
    idp: IdpClient,
    tokens: AppTokenClient,
    resources: ResourceClient,
    cache: Option<AccessTokenCache>,
}

impl std::fmt::Debug for DelegationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationOrchestrator")
            .field("config", &self.config)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl DelegationOrchestrator {
    /// Build an orchestrator from validated configuration.
    pub fn new(config: OrchestratorConfig) -> Result<Self, OrchestrationError> {
        config.validate()?;

        let signer = JwtKeys::hmac(config.client_secret.as_str())
            .map_err(|e| OrchestrationError::Configuration(e.to_string()))?;
        let http = build_http_client(config.hop_timeout())?;
        let cache = config.cache_tokens.then(AccessTokenCache::new);

        Ok(Self {
            signer,
            idp: IdpClient::new(http.clone(), config.token_exchange_url.clone()),
            tokens: AppTokenClient::new(http.clone()),
            resources: ResourceClient::new(http),
            cache,
            config,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn check_subject(&self, subject_token: &str, now: i64) -> Result<SubjectClaims, OrchestrationError> {
        let subject: SubjectClaims = decode_token(subject_token)
            .and_then(|decoded| decoded.claims())
            .map_err(|_| OrchestrationError::InvalidSubjectToken)?;

        if subject.is_expired(now) {
            warn!(subject = %token_fingerprint(subject_token), "Subject token expired, aborting delegation");
            return Err(OrchestrationError::SubjectTokenExpired);
        }
        Ok(subject)
    }

    /// Obtain an access token for `target` on behalf of the subject token's user.
    #[instrument(skip(self, subject_token), fields(app = %self.config.app, target = %target))]
    pub async fn delegate(
        &self,
        subject_token: &str,
        target: AppId,
    ) -> Result<Delegation, OrchestrationError> {
        let now = unix_now();
        let subject = self.check_subject(subject_token, now)?;
        let endpoint = self
            .config
            .target(target)
            .ok_or(OrchestrationError::UnknownTarget(target))?;

        // The subject token is only decoded here, so the cache is keyed on
        // the exact token the identity provider accepted.
        let subject_digest = token_digest(subject_token);
        if let Some(cache) = &self.cache {
            if let Some(access) = cache.get(&subject_digest, &endpoint.audience, now).await {
                debug!("Using cached access token");
                return Ok(Delegation {
                    target,
                    id_jag_token: None,
                    access,
                });
            }
        }

        // Hop 1: token exchange
        let assertion = client_assertion::generate(
            &self.config.client_id,
            &self.config.token_exchange_url,
            &self.signer,
            now,
        )
        .map_err(|e| OrchestrationError::Configuration(e.to_string()))?;

        let request = TokenExchangeRequest {
            grant_type: Some(GRANT_TYPE_TOKEN_EXCHANGE.to_string()),
            subject_token: Some(subject_token.to_string()),
            subject_token_type: Some(TOKEN_TYPE_ID_TOKEN.to_string()),
            audience: Some(endpoint.audience.clone()),
            requested_token_type: Some(TOKEN_TYPE_ID_JAG.to_string()),
            scope: None,
            client_assertion: Some(assertion.token),
            client_assertion_type: Some(CLIENT_ASSERTION_TYPE.to_string()),
        };
        let exchanged = self.idp.exchange(&request).await?;
        if exchanged.issued_token_type != TOKEN_TYPE_ID_JAG {
            return Err(OrchestrationError::InvalidResponse {
                hop: Hop::TokenExchange,
                message: format!("unexpected issued_token_type {}", exchanged.issued_token_type),
            });
        }

        if subject.is_expired(unix_now()) {
            warn!("Subject token expired mid-chain, aborting delegation");
            return Err(OrchestrationError::SubjectTokenExpired);
        }

        // Hop 2: JWT-bearer grant at the target
        let access = self
            .tokens
            .request_access_token(&endpoint.token_url, &exchanged.access_token)
            .await?;

        if let Some(cache) = &self.cache {
            cache
                .insert(&subject_digest, &endpoint.audience, access.clone(), unix_now())
                .await;
        }

        info!(
            id_jag = %token_fingerprint(&exchanged.access_token),
            access_token = %token_fingerprint(&access.access_token),
            "Delegation established"
        );

        Ok(Delegation {
            target,
            id_jag_token: Some(exchanged.access_token),
            access,
        })
    }

    /// Run the full chain and GET `path` from the target's resource API.
    #[instrument(skip(self, subject_token), fields(app = %self.config.app, target = %target))]
    pub async fn fetch_resource<T>(
        &self,
        subject_token: &str,
        target: AppId,
        path: &str,
    ) -> Result<T, OrchestrationError>
    where
        T: DeserializeOwned,
    {
        let delegation = self.delegate(subject_token, target).await?;
        let endpoint = self
            .config
            .target(target)
            .ok_or(OrchestrationError::UnknownTarget(target))?;

        // Hop 3: resource API
        self.resources
            .get(&endpoint.api.url(path), &delegation.access.access_token)
            .await
    }

    /// Run the full chain and POST `body` to `path` on the target's resource API.
    #[instrument(skip(self, subject_token, body), fields(app = %self.config.app, target = %target))]
    pub async fn post_resource<B, T>(
        &self,
        subject_token: &str,
        target: AppId,
        path: &str,
        body: &B,
    ) -> Result<T, OrchestrationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let delegation = self.delegate(subject_token, target).await?;
        let endpoint = self
            .config
            .target(target)
            .ok_or(OrchestrationError::UnknownTarget(target))?;

        self.resources
            .post(&endpoint.api.url(path), &delegation.access.access_token, body)
            .await
    }

    /// Like [`fetch_resource`](Self::fetch_resource), but any failure yields
    /// [`DelegatedData::Fallback`] and is logged.
    pub async fn fetch_with_fallback<T>(
        &self,
        subject_token: &str,
        target: AppId,
        path: &str,
    ) -> DelegatedData<T>
    where
        T: DeserializeOwned,
    {
        match self.fetch_resource(subject_token, target, path).await {
            Ok(data) => DelegatedData::Personalized(data),
            Err(err) => {
                warn!(
                    app = %self.config.app,
                    target = %target,
                    hop = err.hop().map(|h| h.as_str()).unwrap_or("local"),
                    error = %err,
                    "Cross-app data unavailable, serving fallback"
                );
                DelegatedData::Fallback {
                    reason: err.user_message(),
                }
            }
        }
    }
}
