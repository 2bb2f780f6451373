//! # Cross-App Access Protocol Core
//!
//! This crate implements OAuth 2.0 cross-app access for the demo suite
//! (todo0, inventory, agent0, jarvis and the admin portal): a user signs in
//! once at the identity provider, and one application obtains a scoped,
//! audience-restricted access token for another application's API without
//! ever handling the user's credentials.
//!
//! ## Overview
//!
//! - **Token codec** ([`jwt`]): compact JWS encode/decode behind the
//!   [`TokenSigner`]/[`TokenVerifier`] capability traits
//! - **Validation** ([`validator`]): ordered signature, time, issuer and
//!   audience checks with typed failures
//! - **Client assertions** ([`client_assertion`]): RFC 7523 client
//!   authentication
//! - **Token exchange** ([`exchange`]): RFC 8693 exchange of an identity token
//!   for an ID-JAG delegation token
//! - **Downstream minting** ([`minter`]): JWT-bearer exchange of an ID-JAG for
//!   a target application's access token
//! - **Registry** ([`cross_app`]): applications, clients and the audience
//!   allow-list
//!
//! Every operation is a pure function of its inputs and the current time
//! (Unix seconds), so none of it needs a runtime.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xaa_auth::{
//!     client_assertion, AppId, AudienceMap, ClientRegistry, ExchangeSettings, JwtKeys,
//!     RegisteredClient, SubjectTokenIssuer, TokenExchangeEngine, TokenExchangeRequest,
//!     CLIENT_ASSERTION_TYPE, GRANT_TYPE_TOKEN_EXCHANGE, TOKEN_TYPE_ID_JAG, TOKEN_TYPE_ID_TOKEN,
//! };
//!
//! let now = xaa_auth::unix_now();
//! let idp_keys = Arc::new(JwtKeys::hmac("idp-secret").unwrap());
//!
//! let mut clients = ClientRegistry::new();
//! clients.register(RegisteredClient::new("agent0-client", "client-secret", Some(AppId::Agent0)).unwrap());
//! let mut audiences = AudienceMap::new();
//! audiences.insert("https://auth.todo0.com/", AppId::Todo0).unwrap();
//!
//! let settings = ExchangeSettings {
//!     issuer: "https://idp.example.com".to_string(),
//!     token_endpoint: "https://idp.example.com/token-exchange".to_string(),
//! };
//! let engine = TokenExchangeEngine::new(settings, idp_keys.clone(), clients, audiences);
//!
//! let issuer = SubjectTokenIssuer::new("https://idp.example.com", idp_keys);
//! let (subject_token, _) = issuer.issue("agent0-client", "u1", "u1@example.com", None, now).unwrap();
//!
//! let client_keys = JwtKeys::hmac("client-secret").unwrap();
//! let assertion = client_assertion::generate(
//!     "agent0-client",
//!     "https://idp.example.com/token-exchange",
//!     &client_keys,
//!     now,
//! )
//! .unwrap();
//!
//! let response = engine
//!     .exchange(
//!         &TokenExchangeRequest {
//!             grant_type: Some(GRANT_TYPE_TOKEN_EXCHANGE.to_string()),
//!             subject_token: Some(subject_token),
//!             subject_token_type: Some(TOKEN_TYPE_ID_TOKEN.to_string()),
//!             audience: Some("https://auth.todo0.com/".to_string()),
//!             requested_token_type: Some(TOKEN_TYPE_ID_JAG.to_string()),
//!             scope: None,
//!             client_assertion: Some(assertion.token),
//!             client_assertion_type: Some(CLIENT_ASSERTION_TYPE.to_string()),
//!         },
//!         now,
//!     )
//!     .unwrap();
//! assert_eq!(response.expires_in, 300);
//! ```

pub mod claims;
pub mod client_assertion;
pub mod cross_app;
pub mod error;
pub mod exchange;
pub mod jwt;
pub mod minter;
pub mod validator;

// Re-export main types
pub use claims::{
    AccessTokenClaims, Audience, ClientAssertionClaims, IdJagClaims, RegisteredClaims,
    SubjectClaims, unix_now,
};
pub use client_assertion::{ClientAssertion, CLIENT_ASSERTION_TYPE};
pub use cross_app::{
    normalize_audience, resolve_source_app, AppId, AppRegistration, AudienceMap, ClientRegistry,
    RegisteredClient,
};
pub use error::{AuthError, AuthResult, OAuthError, OAuthErrorResponse};
pub use exchange::{
    ExchangeSettings, SubjectTokenIssuer, TokenExchangeEngine, TokenExchangeRequest,
    TokenExchangeResponse, GRANT_TYPE_TOKEN_EXCHANGE, TOKEN_TYPE_ID_JAG, TOKEN_TYPE_ID_TOKEN,
};
pub use jwt::{JwtAlgorithm, JwtKeys, KeyConfig, TokenHeader, TokenSigner, TokenVerifier};
pub use minter::{AccessTokenResponse, DownstreamMinter, JwtBearerRequest, GRANT_TYPE_JWT_BEARER};
pub use validator::{ClaimMatch, ValidationConstraints, ValidationError};
