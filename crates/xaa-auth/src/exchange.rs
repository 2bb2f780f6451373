//! Token exchange (RFC 8693) producing ID-JAG delegation tokens.
//!
//! The identity provider runs [`TokenExchangeEngine`]. A requesting
//! application presents the user's identity token plus its own client
//! assertion and names the target authorization server in `audience`; the
//! engine answers with a five-minute delegation token scoped to that target.
//!
//! Validation runs in a fixed order and the first failure is returned:
//!
//! 1. required parameters (`invalid_request`)
//! 2. grant type and token types (`unsupported_grant_type`,
//!    `unsupported_token_type`)
//! 3. subject token signature, expiry and issuer (`invalid_grant`)
//! 4. client assertion (`invalid_client`), then the subject token must have
//!    been issued to the authenticated client (`invalid_grant`)
//! 5. target audience against the allow-list (`invalid_target`)
//!
//! [`SubjectTokenIssuer`] is the login half of the identity provider.

use crate::claims::{
    IdJagClaims, SubjectClaims, DEFAULT_SCOPE, ID_JAG_LIFETIME_SECS, ID_JAG_TYPE, JWT_TYPE,
};
use crate::client_assertion::{generate_jti, verify_client_assertion};
use crate::cross_app::{resolve_source_app, AudienceMap, ClientRegistry, RegisteredClient};
use crate::error::{AuthResult, OAuthError};
use crate::jwt::{self, JwtKeys, TokenHeader};
use crate::validator::{validate, ValidationConstraints};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token exchange grant type.
pub const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Token type URN of ID-JAG delegation tokens.
pub const TOKEN_TYPE_ID_JAG: &str = "urn:ietf:params:oauth:token-type:id-jag";

/// Token type URN of identity tokens.
pub const TOKEN_TYPE_ID_TOKEN: &str = "urn:ietf:params:oauth:token-type:id_token";

/// `token_type` of a token exchange response; the issued token is not an
/// access token.
pub const TOKEN_TYPE_NOT_APPLICABLE: &str = "N_A";

/// Token exchange request (form-urlencoded body).
///
/// Every field is optional at parse time so that missing parameters surface
/// as `invalid_request` instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenExchangeRequest {
    /// Must be the token-exchange grant URN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,

    /// The user's identity token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_token: Option<String>,

    /// Must be the identity-token URN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_token_type: Option<String>,

    /// Target authorization server identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Must be the ID-JAG URN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_token_type: Option<String>,

    /// Requested scope; defaults to `read write`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client assertion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_assertion: Option<String>,

    /// Client assertion type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_assertion_type: Option<String>,
}

/// Token exchange response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenExchangeResponse {
    /// Always the ID-JAG URN
    pub issued_token_type: String,

    /// The delegation token (named per RFC 8693 convention)
    pub access_token: String,

    /// Always `N_A`
    pub token_type: String,

    /// Seconds until the delegation token expires
    pub expires_in: i64,
}

/// Identity provider settings for the exchange endpoint.
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    /// Issuer written into and expected on identity tokens
    pub issuer: String,

    /// URL client assertions must be addressed to
    pub token_endpoint: String,
}

/// Stateless token exchange engine. Shared read-only across requests.
#[derive(Debug, Clone)]
pub struct TokenExchangeEngine {
    settings: ExchangeSettings,
    idp_keys: Arc<JwtKeys>,
    clients: ClientRegistry,
    audiences: AudienceMap,
}

fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, OAuthError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest(format!("{} is required", name)))
}

impl TokenExchangeEngine {
    /// Create an engine.
    pub fn new(
        settings: ExchangeSettings,
        idp_keys: Arc<JwtKeys>,
        clients: ClientRegistry,
        audiences: AudienceMap,
    ) -> Self {
        Self {
            settings,
            idp_keys,
            clients,
            audiences,
        }
    }

    /// Identity provider issuer.
    pub fn issuer(&self) -> &str {
        &self.settings.issuer
    }

    /// Handle one token exchange request at time `now`.
    pub fn exchange(
        &self,
        request: &TokenExchangeRequest,
        now: i64,
    ) -> Result<TokenExchangeResponse, OAuthError> {
        let result = self.try_exchange(request, now);
        if let Err(err) = &result {
            if err.is_server_error() {
                tracing::error!(error = %err, "Token exchange failed");
            } else {
                warn!(
                    error = err.error_code(),
                    description = err.description(),
                    "Token exchange rejected"
                );
            }
        }
        result
    }

    fn try_exchange(
        &self,
        request: &TokenExchangeRequest,
        now: i64,
    ) -> Result<TokenExchangeResponse, OAuthError> {
        // ReceiveRequest
        let grant_type = require(&request.grant_type, "grant_type")?;
        let subject_token = require(&request.subject_token, "subject_token")?;
        let audience = require(&request.audience, "audience")?;

        // ValidateGrantShape
        if grant_type != GRANT_TYPE_TOKEN_EXCHANGE {
            return Err(OAuthError::UnsupportedGrantType(format!(
                "grant_type must be {}",
                GRANT_TYPE_TOKEN_EXCHANGE
            )));
        }
        if request.requested_token_type.as_deref() != Some(TOKEN_TYPE_ID_JAG) {
            return Err(OAuthError::UnsupportedTokenType(format!(
                "requested_token_type must be {}",
                TOKEN_TYPE_ID_JAG
            )));
        }
        if request.subject_token_type.as_deref() != Some(TOKEN_TYPE_ID_TOKEN) {
            return Err(OAuthError::UnsupportedTokenType(format!(
                "subject_token_type must be {}",
                TOKEN_TYPE_ID_TOKEN
            )));
        }

        debug!(
            subject = %jwt::token_fingerprint(subject_token),
            audience = %audience,
            "Processing token exchange"
        );

        // ValidateSubjectToken
        let constraints = ValidationConstraints::new().issuer(self.settings.issuer.as_str());
        let subject: SubjectClaims = validate(subject_token, self.idp_keys.as_ref(), &constraints, now)
            .map_err(|e| OAuthError::InvalidGrant(format!("subject token rejected: {}", e)))?;

        // ValidateClientAssertion
        let client = verify_client_assertion(
            request.client_assertion.as_deref(),
            request.client_assertion_type.as_deref(),
            &self.clients,
            &self.settings.token_endpoint,
            now,
        )?;
        if !subject.aud.contains(&client.client_id) {
            return Err(OAuthError::InvalidGrant(
                "subject token was not issued to the authenticated client".to_string(),
            ));
        }

        // ResolveTargetApplication
        let target = self
            .audiences
            .resolve(audience)
            .ok_or_else(|| OAuthError::InvalidTarget(format!("unknown audience: {}", audience)))?;
        let canonical = self
            .audiences
            .audience_for(target)
            .ok_or_else(|| OAuthError::ServerError("audience map is inconsistent".to_string()))?;

        // MintDelegationToken
        let claims = IdJagClaims {
            iss: self.settings.issuer.clone(),
            aud: canonical.to_string(),
            sub: subject.sub.clone(),
            email: subject.email.clone(),
            iat: now,
            nbf: now,
            exp: now + ID_JAG_LIFETIME_SECS,
            jti: generate_jti(),
            client_id: client.client_id.clone(),
            requesting_client: requesting_client(client, &subject),
            target_client: target.to_string(),
            scope: request
                .scope
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        };

        let header = TokenHeader::for_signer(self.idp_keys.as_ref(), ID_JAG_TYPE);
        let token = jwt::encode_token(&header, &claims, self.idp_keys.as_ref())
            .map_err(|e| OAuthError::ServerError(format!("failed to sign delegation token: {}", e)))?;

        info!(
            client_id = %claims.client_id,
            requesting_client = %claims.requesting_client,
            target_client = %claims.target_client,
            token = %jwt::token_fingerprint(&token),
            "Issued delegation token"
        );

        Ok(TokenExchangeResponse {
            issued_token_type: TOKEN_TYPE_ID_JAG.to_string(),
            access_token: token,
            token_type: TOKEN_TYPE_NOT_APPLICABLE.to_string(),
            expires_in: ID_JAG_LIFETIME_SECS,
        })
    }
}

fn requesting_client(client: &RegisteredClient, subject: &SubjectClaims) -> String {
    client
        .app
        .or_else(|| resolve_source_app(&subject.aud))
        .map(|app| app.to_string())
        .unwrap_or_else(|| client.client_id.clone())
}

/// Issues identity tokens at login.
#[derive(Debug, Clone)]
pub struct SubjectTokenIssuer {
    issuer: String,
    keys: Arc<JwtKeys>,
}

impl SubjectTokenIssuer {
    /// Create an issuer signing with `keys`.
    pub fn new(issuer: impl Into<String>, keys: Arc<JwtKeys>) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
        }
    }

    /// Issue an identity token for `subject` addressed to `client_id`.
    pub fn issue(
        &self,
        client_id: &str,
        subject: &str,
        email: &str,
        nonce: Option<&str>,
        now: i64,
    ) -> AuthResult<(String, SubjectClaims)> {
        let mut claims = SubjectClaims::new(&self.issuer, client_id, subject, email, now);
        if let Some(nonce) = nonce {
            claims = claims.with_nonce(nonce);
        }

        let header = TokenHeader::for_signer(self.keys.as_ref(), JWT_TYPE);
        let token = jwt::encode_token(&header, &claims, self.keys.as_ref())?;
        debug!(client_id, token = %jwt::token_fingerprint(&token), "Issued subject token");
        Ok((token, claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_assertion::{self, CLIENT_ASSERTION_TYPE};
    use crate::cross_app::{AppId, RegisteredClient};

    const NOW: i64 = 1_700_000_000;
    const ISSUER: &str = "https://idp.example.com";
    const ENDPOINT: &str = "https://idp.example.com/token-exchange";
    const IDP_SECRET: &str = "idp-signing-secret-with-plenty-of-length";
    const CLIENT_SECRET: &str = "app-a-client-secret-with-plenty-of-length";

    struct Fixture {
        engine: TokenExchangeEngine,
        issuer: SubjectTokenIssuer,
        client_keys: JwtKeys,
    }

    fn fixture() -> Fixture {
        let idp_keys = Arc::new(JwtKeys::hmac(IDP_SECRET).unwrap());

        let mut clients = ClientRegistry::new();
        clients.register(RegisteredClient::new("app-a", CLIENT_SECRET, None).unwrap());
        clients.register(
            RegisteredClient::new("agent0-client", CLIENT_SECRET, Some(AppId::Agent0)).unwrap(),
        );

        let mut audiences = AudienceMap::new();
        audiences.insert("https://auth.todo0.com/", AppId::Todo0).unwrap();
        audiences.insert("https://auth.inventory.com/", AppId::Inventory).unwrap();

        let settings = ExchangeSettings {
            issuer: ISSUER.to_string(),
            token_endpoint: ENDPOINT.to_string(),
        };

        Fixture {
            engine: TokenExchangeEngine::new(settings, idp_keys.clone(), clients, audiences),
            issuer: SubjectTokenIssuer::new(ISSUER, idp_keys),
            client_keys: JwtKeys::hmac(CLIENT_SECRET).unwrap(),
        }
    }

    fn request(f: &Fixture, client_id: &str, subject_token: &str, audience: &str) -> TokenExchangeRequest {
        let assertion = client_assertion::generate(client_id, ENDPOINT, &f.client_keys, NOW).unwrap();
        TokenExchangeRequest {
            grant_type: Some(GRANT_TYPE_TOKEN_EXCHANGE.to_string()),
            subject_token: Some(subject_token.to_string()),
            subject_token_type: Some(TOKEN_TYPE_ID_TOKEN.to_string()),
            audience: Some(audience.to_string()),
            requested_token_type: Some(TOKEN_TYPE_ID_JAG.to_string()),
            scope: None,
            client_assertion: Some(assertion.token),
            client_assertion_type: Some(CLIENT_ASSERTION_TYPE.to_string()),
        }
    }

    fn subject_token(f: &Fixture, client_id: &str, issued_at: i64) -> String {
        f.issuer.issue(client_id, "u1", "u1@example.com", None, issued_at).unwrap().0
    }

    fn decode_id_jag(token: &str) -> (TokenHeader, IdJagClaims) {
        let decoded = jwt::decode_token(token).unwrap();
        let claims = decoded.claims().unwrap();
        (decoded.header, claims)
    }

    #[test]
    fn test_exchange_mints_id_jag_for_requested_audience() {
        let f = fixture();
        let token = subject_token(&f, "app-a", NOW);
        let response = f
            .engine
            .exchange(&request(&f, "app-a", &token, "https://auth.todo0.com/"), NOW)
            .unwrap();

        assert_eq!(response.issued_token_type, TOKEN_TYPE_ID_JAG);
        assert_eq!(response.token_type, "N_A");
        assert_eq!(response.expires_in, 300);

        let (header, claims) = decode_id_jag(&response.access_token);
        assert_eq!(header.typ.as_deref(), Some(ID_JAG_TYPE));
        assert_eq!(claims.aud, "https://auth.todo0.com/");
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp, NOW + 300);
        assert_eq!(claims.exp - claims.iat, 300);
        assert_eq!(claims.target_client, "todo0");
        assert_eq!(claims.requesting_client, "app-a");
        assert_eq!(claims.scope, "read write");
        assert!(jwt::verify(&response.access_token, &JwtKeys::hmac(IDP_SECRET).unwrap()));
    }

    #[test]
    fn test_registered_app_becomes_requesting_client() {
        let f = fixture();
        let token = subject_token(&f, "agent0-client", NOW);
        let response = f
            .engine
            .exchange(&request(&f, "agent0-client", &token, "https://auth.inventory.com/"), NOW)
            .unwrap();

        let (_, claims) = decode_id_jag(&response.access_token);
        assert_eq!(claims.requesting_client, "agent0");
        assert_eq!(claims.client_id, "agent0-client");
        assert_eq!(claims.target_client, "inventory");
    }

    #[test]
    fn test_sequential_exchanges_yield_distinct_tokens() {
        let f = fixture();
        let token = subject_token(&f, "app-a", NOW);

        let first = f
            .engine
            .exchange(&request(&f, "app-a", &token, "https://auth.todo0.com/"), NOW)
            .unwrap();
        let second = f
            .engine
            .exchange(&request(&f, "app-a", &token, "https://auth.todo0.com/"), NOW)
            .unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert_ne!(decode_id_jag(&first.access_token).1.jti, decode_id_jag(&second.access_token).1.jti);
    }

    #[test]
    fn test_unknown_audience_is_invalid_target() {
        let f = fixture();
        let token = subject_token(&f, "app-a", NOW);

        for audience in ["https://auth.unknown.com/", "todo0-auth-server"] {
            let err = f
                .engine
                .exchange(&request(&f, "app-a", &token, audience), NOW)
                .unwrap_err();
            assert_eq!(err.error_code(), "invalid_target");
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn test_expired_subject_token_is_invalid_grant() {
        let f = fixture();
        // Issued an hour and ten seconds ago: exp == NOW - 10
        let token = subject_token(&f, "app-a", NOW - 3610);

        let err = f
            .engine
            .exchange(&request(&f, "app-a", &token, "https://auth.todo0.com/"), NOW)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_grant");
        assert!(err.description().contains("expired"));
    }

    #[test]
    fn test_subject_token_from_other_issuer_is_invalid_grant() {
        let f = fixture();
        let rogue = SubjectTokenIssuer::new(
            "https://rogue.example.com",
            Arc::new(JwtKeys::hmac(IDP_SECRET).unwrap()),
        );
        let token = rogue.issue("app-a", "u1", "u1@example.com", None, NOW).unwrap().0;

        let err = f
            .engine
            .exchange(&request(&f, "app-a", &token, "https://auth.todo0.com/"), NOW)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_grant");
    }

    #[test]
    fn test_grant_shape_errors() {
        let f = fixture();
        let token = subject_token(&f, "app-a", NOW);
        let valid = request(&f, "app-a", &token, "https://auth.todo0.com/");

        let mut wrong_grant = valid.clone();
        wrong_grant.grant_type = Some("authorization_code".to_string());
        assert_eq!(
            f.engine.exchange(&wrong_grant, NOW).unwrap_err().error_code(),
            "unsupported_grant_type"
        );

        let mut wrong_requested = valid.clone();
        wrong_requested.requested_token_type =
            Some("urn:ietf:params:oauth:token-type:access_token".to_string());
        assert_eq!(
            f.engine.exchange(&wrong_requested, NOW).unwrap_err().error_code(),
            "unsupported_token_type"
        );

        let mut wrong_subject_type = valid.clone();
        wrong_subject_type.subject_token_type = None;
        assert_eq!(
            f.engine.exchange(&wrong_subject_type, NOW).unwrap_err().error_code(),
            "unsupported_token_type"
        );

        let mut missing = valid;
        missing.subject_token = None;
        assert_eq!(
            f.engine.exchange(&missing, NOW).unwrap_err().error_code(),
            "invalid_request"
        );
    }

    #[test]
    fn test_missing_or_forged_client_assertion_is_invalid_client() {
        let f = fixture();
        let token = subject_token(&f, "app-a", NOW);

        let mut missing = request(&f, "app-a", &token, "https://auth.todo0.com/");
        missing.client_assertion = None;
        assert_eq!(f.engine.exchange(&missing, NOW).unwrap_err().error_code(), "invalid_client");

        let forger = JwtKeys::hmac("not-the-registered-client-secret-value").unwrap();
        let forged = client_assertion::generate("app-a", ENDPOINT, &forger, NOW).unwrap();
        let mut forged_request = request(&f, "app-a", &token, "https://auth.todo0.com/");
        forged_request.client_assertion = Some(forged.token);
        assert_eq!(
            f.engine.exchange(&forged_request, NOW).unwrap_err().error_code(),
            "invalid_client"
        );
    }

    #[test]
    fn test_subject_token_bound_to_authenticated_client() {
        let f = fixture();
        // Token issued to app-a, presented by agent0
        let token = subject_token(&f, "app-a", NOW);

        let err = f
            .engine
            .exchange(&request(&f, "agent0-client", &token, "https://auth.todo0.com/"), NOW)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_grant");
    }

    #[test]
    fn test_requested_scope_is_carried() {
        let f = fixture();
        let token = subject_token(&f, "app-a", NOW);
        let mut req = request(&f, "app-a", &token, "https://auth.todo0.com/");
        req.scope = Some("read".to_string());

        let response = f.engine.exchange(&req, NOW).unwrap();
        assert_eq!(decode_id_jag(&response.access_token).1.scope, "read");
    }

    #[test]
    fn test_subject_token_issuer() {
        let f = fixture();
        let (token, claims) = f
            .issuer
            .issue("app-a", "u1", "u1@example.com", Some("n-1"), NOW)
            .unwrap();

        assert_eq!(claims.exp, NOW + 3600);
        assert_eq!(claims.nonce.as_deref(), Some("n-1"));
        assert_eq!(jwt::decode_token(&token).unwrap().header.typ.as_deref(), Some(JWT_TYPE));
    }
}
