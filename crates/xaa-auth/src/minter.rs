//! Downstream access token minting (RFC 7523 JWT-bearer grant).
//!
//! Each target application runs its own [`DownstreamMinter`]. It accepts a
//! delegation token issued by the identity provider and answers with a
//! 24-hour access token for the application's API.

use crate::claims::{
    AccessTokenClaims, IdJagClaims, ACCESS_TOKEN_LIFETIME_SECS, ACCESS_TOKEN_TYPE, DEFAULT_SCOPE,
    ID_JAG_TYPE,
};
use crate::client_assertion::generate_jti;
use crate::cross_app::{normalize_audience, AppId, AppRegistration};
use crate::error::{AuthError, AuthResult, OAuthError};
use crate::jwt::{self, JwtKeys, TokenHeader};
use crate::validator::{validate, ValidationConstraints, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// JWT-bearer authorization grant type.
pub const GRANT_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// `token_type` of downstream access token responses.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// JWT-bearer token request (form-urlencoded body).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwtBearerRequest {
    /// Must be the JWT-bearer grant URN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,

    /// The delegation token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
}

impl JwtBearerRequest {
    /// Request presenting `assertion`.
    pub fn new(assertion: impl Into<String>) -> Self {
        Self {
            grant_type: Some(GRANT_TYPE_JWT_BEARER.to_string()),
            assertion: Some(assertion.into()),
        }
    }
}

/// Standard OAuth token response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenResponse {
    /// Access token for the target API
    pub access_token: String,

    /// Always `Bearer`
    pub token_type: String,

    /// Seconds until expiry
    pub expires_in: i64,

    /// Granted scope
    pub scope: String,
}

/// Authorization server of one target application.
#[derive(Debug, Clone)]
pub struct DownstreamMinter {
    app: AppId,
    idp_issuer: String,
    idp_keys: Arc<JwtKeys>,
    authorization_server: String,
    api_audience: String,
    signing_keys: Arc<JwtKeys>,
}

impl DownstreamMinter {
    /// Build the minter for a registered application.
    ///
    /// `idp_keys` verify delegation tokens; the registration's signing
    /// secret signs the access tokens.
    pub fn new(
        registration: &AppRegistration,
        idp_issuer: impl Into<String>,
        idp_keys: Arc<JwtKeys>,
    ) -> AuthResult<Self> {
        let authorization_server = normalize_audience(&registration.authorization_server)
            .ok_or_else(|| {
                AuthError::ConfigError(format!(
                    "Authorization server of {} is not a URL",
                    registration.app
                ))
            })?;

        Ok(Self {
            app: registration.app,
            idp_issuer: idp_issuer.into(),
            idp_keys,
            authorization_server,
            api_audience: registration.api_audience.clone(),
            signing_keys: Arc::new(JwtKeys::hmac(&registration.token_signing_secret)?),
        })
    }

    /// Application this minter serves.
    pub fn app(&self) -> AppId {
        self.app
    }

    /// Canonical authorization server identifier.
    pub fn authorization_server(&self) -> &str {
        &self.authorization_server
    }

    /// Exchange a delegation token for an access token at time `now`.
    pub fn mint(
        &self,
        request: &JwtBearerRequest,
        now: i64,
    ) -> Result<AccessTokenResponse, OAuthError> {
        let result = self.try_mint(request, now);
        if let Err(err) = &result {
            warn!(
                app = %self.app,
                error = err.error_code(),
                description = err.description(),
                "Access token request rejected"
            );
        }
        result
    }

    fn try_mint(
        &self,
        request: &JwtBearerRequest,
        now: i64,
    ) -> Result<AccessTokenResponse, OAuthError> {
        match request.grant_type.as_deref() {
            Some(GRANT_TYPE_JWT_BEARER) => {}
            Some(_) => {
                return Err(OAuthError::UnsupportedGrantType(format!(
                    "grant_type must be {}",
                    GRANT_TYPE_JWT_BEARER
                )))
            }
            None => return Err(OAuthError::InvalidRequest("grant_type is required".to_string())),
        }

        let assertion = request
            .assertion
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| OAuthError::InvalidRequest("assertion is required".to_string()))?;

        let constraints = ValidationConstraints::new()
            .token_type(ID_JAG_TYPE)
            .issuer(self.idp_issuer.as_str())
            .audience(self.authorization_server.as_str());

        let delegation: IdJagClaims = validate(assertion, self.idp_keys.as_ref(), &constraints, now)
            .map_err(|e| OAuthError::InvalidGrant(format!("assertion rejected: {}", e)))?;

        if delegation.target_client != self.app.as_str() {
            return Err(OAuthError::InvalidGrant(format!(
                "assertion targets {}",
                delegation.target_client
            )));
        }

        let claims = AccessTokenClaims {
            iss: self.authorization_server.clone(),
            aud: self.api_audience.clone(),
            sub: delegation.sub,
            email: delegation.email,
            iat: now,
            exp: now + ACCESS_TOKEN_LIFETIME_SECS,
            jti: generate_jti(),
            scope: DEFAULT_SCOPE.to_string(),
            client_id: delegation.requesting_client,
        };

        let header = TokenHeader::for_signer(self.signing_keys.as_ref(), ACCESS_TOKEN_TYPE);
        let token = jwt::encode_token(&header, &claims, self.signing_keys.as_ref())
            .map_err(|e| OAuthError::ServerError(format!("failed to sign access token: {}", e)))?;

        info!(
            app = %self.app,
            client_id = %claims.client_id,
            token = %jwt::token_fingerprint(&token),
            "Issued access token"
        );

        Ok(AccessTokenResponse {
            access_token: token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: ACCESS_TOKEN_LIFETIME_SECS,
            scope: claims.scope,
        })
    }

    /// Validate an access token presented to this application's API.
    pub fn validate_access_token(
        &self,
        token: &str,
        now: i64,
    ) -> Result<AccessTokenClaims, ValidationError> {
        let constraints = ValidationConstraints::new()
            .token_type(ACCESS_TOKEN_TYPE)
            .issuer(self.authorization_server.as_str())
            .audience(self.api_audience.as_str());
        validate(token, self.signing_keys.as_ref(), &constraints, now)
    }
}
