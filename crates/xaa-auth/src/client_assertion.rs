//! Client assertions (RFC 7523 `private_key_jwt` style client authentication).
//!
//! A requesting application proves its identity to a token endpoint with a
//! short-lived token it signs itself, instead of sending its secret.

use crate::claims::{Audience, ClientAssertionClaims, CLIENT_ASSERTION_LIFETIME_SECS, JWT_TYPE};
use crate::cross_app::{ClientRegistry, RegisteredClient};
use crate::error::{AuthResult, OAuthError};
use crate::jwt::{self, TokenHeader, TokenSigner};
use crate::validator::{validate, ValidationConstraints};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

/// `client_assertion_type` for JWT client assertions.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// A signed client assertion.
#[derive(Debug, Clone)]
pub struct ClientAssertion {
    /// Compact token
    pub token: String,

    /// Claims inside the token
    pub claims: ClientAssertionClaims,
}

/// Generate a token id: 128 bits from the OS CSPRNG, base64url encoded.
pub fn generate_jti() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Produce a client assertion for `client_id` addressed to `audience`.
pub fn generate(
    client_id: &str,
    audience: &str,
    signer: &dyn TokenSigner,
    now: i64,
) -> AuthResult<ClientAssertion> {
    let claims = ClientAssertionClaims {
        iss: client_id.to_string(),
        sub: client_id.to_string(),
        aud: Audience::Single(audience.to_string()),
        iat: now,
        exp: now + CLIENT_ASSERTION_LIFETIME_SECS,
        jti: generate_jti(),
    };

    let token = jwt::encode_token(&TokenHeader::for_signer(signer, JWT_TYPE), &claims, signer)?;
    Ok(ClientAssertion { token, claims })
}

/// Authenticate a client from its assertion.
///
/// The assertion must be of the JWT-bearer type, name a registered client in
/// `iss`, verify under that client's secret, have `iss == sub`, be addressed
/// to `token_endpoint` and be unexpired. Every failure is `invalid_client`.
pub fn verify_client_assertion<'a>(
    assertion: Option<&str>,
    assertion_type: Option<&str>,
    registry: &'a ClientRegistry,
    token_endpoint: &str,
    now: i64,
) -> Result<&'a RegisteredClient, OAuthError> {
    let assertion = assertion
        .filter(|a| !a.is_empty())
        .ok_or_else(|| OAuthError::InvalidClient("client_assertion is required".to_string()))?;

    match assertion_type {
        Some(CLIENT_ASSERTION_TYPE) => {}
        Some(other) => {
            return Err(OAuthError::InvalidClient(format!(
                "unsupported client_assertion_type: {}",
                other
            )))
        }
        None => {
            return Err(OAuthError::InvalidClient(
                "client_assertion_type is required".to_string(),
            ))
        }
    }

    let unverified: ClientAssertionClaims = jwt::decode_token(assertion)
        .and_then(|decoded| decoded.claims())
        .map_err(|_| OAuthError::InvalidClient("client assertion is malformed".to_string()))?;

    let client = registry
        .get(&unverified.iss)
        .ok_or_else(|| OAuthError::InvalidClient("unknown client".to_string()))?;

    let constraints = ValidationConstraints::new()
        .issuer(client.client_id.as_str())
        .audience(token_endpoint);

    let claims: ClientAssertionClaims =
        validate(assertion, client.keys(), &constraints, now).map_err(|e| {
            debug!(client_id = %client.client_id, reason = e.reason(), "Client assertion rejected");
            OAuthError::InvalidClient(format!("client assertion rejected: {}", e))
        })?;

    if claims.sub != claims.iss {
        return Err(OAuthError::InvalidClient(
            "client assertion subject must equal issuer".to_string(),
        ));
    }

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_app::AppId;
    use crate::jwt::JwtKeys;

    const NOW: i64 = 1_700_000_000;
    const ENDPOINT: &str = "https://idp.example.com/token-exchange";
    const SECRET: &str = "agent0-client-secret-long-enough-for-hs256";

    fn registry() -> ClientRegistry {
        let mut registry = ClientRegistry::new();
        registry.register(RegisteredClient::new("agent0-client", SECRET, Some(AppId::Agent0)).unwrap());
        registry
    }

    fn signer() -> JwtKeys {
        JwtKeys::hmac(SECRET).unwrap()
    }

    #[test]
    fn test_generate_claims() {
        let assertion = generate("agent0-client", ENDPOINT, &signer(), NOW).unwrap();

        assert_eq!(assertion.claims.iss, "agent0-client");
        assert_eq!(assertion.claims.sub, "agent0-client");
        assert!(assertion.claims.aud.contains(ENDPOINT));
        assert_eq!(assertion.claims.exp - assertion.claims.iat, 300);
        assert!(jwt::verify(&assertion.token, &signer()));
    }

    #[test]
    fn test_jti_is_128_bits_and_unique() {
        let a = generate_jti();
        let b = generate_jti();

        assert_ne!(a, b);
        assert_eq!(URL_SAFE_NO_PAD.decode(&a).unwrap().len(), 16);
    }

    #[test]
    fn test_two_assertions_differ() {
        let a = generate("agent0-client", ENDPOINT, &signer(), NOW).unwrap();
        let b = generate("agent0-client", ENDPOINT, &signer(), NOW).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_verify_accepts_valid_assertion() {
        let registry = registry();
        let assertion = generate("agent0-client", ENDPOINT, &signer(), NOW).unwrap();

        let client = verify_client_assertion(
            Some(&assertion.token),
            Some(CLIENT_ASSERTION_TYPE),
            &registry,
            ENDPOINT,
            NOW,
        )
        .unwrap();
        assert_eq!(client.app, Some(AppId::Agent0));
    }

    #[test]
    fn test_verify_requires_presence_and_type() {
        let registry = registry();
        let assertion = generate("agent0-client", ENDPOINT, &signer(), NOW).unwrap();

        for (token, typ) in [
            (None, Some(CLIENT_ASSERTION_TYPE)),
            (Some(""), Some(CLIENT_ASSERTION_TYPE)),
            (Some(assertion.token.as_str()), None),
            (Some(assertion.token.as_str()), Some("urn:example:other")),
        ] {
            let err = verify_client_assertion(token, typ, &registry, ENDPOINT, NOW).unwrap_err();
            assert_eq!(err.error_code(), "invalid_client");
        }
    }

    #[test]
    fn test_verify_rejects_forged_signature() {
        let registry = registry();
        let forger = JwtKeys::hmac("attacker-chosen-secret-of-enough-length").unwrap();
        let assertion = generate("agent0-client", ENDPOINT, &forger, NOW).unwrap();

        let err = verify_client_assertion(
            Some(&assertion.token),
            Some(CLIENT_ASSERTION_TYPE),
            &registry,
            ENDPOINT,
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidClient(_)));
    }

    #[test]
    fn test_verify_rejects_unknown_client_wrong_audience_and_expiry() {
        let registry = registry();

        let unknown = generate("stranger", ENDPOINT, &signer(), NOW).unwrap();
        let wrong_aud = generate("agent0-client", "https://elsewhere.example.com/token", &signer(), NOW).unwrap();
        let expired = generate("agent0-client", ENDPOINT, &signer(), NOW - 300).unwrap();

        for token in [unknown.token, wrong_aud.token, expired.token] {
            let err = verify_client_assertion(
                Some(&token),
                Some(CLIENT_ASSERTION_TYPE),
                &registry,
                ENDPOINT,
                NOW,
            )
            .unwrap_err();
            assert!(matches!(err, OAuthError::InvalidClient(_)));
        }
    }

    #[test]
    fn test_verify_rejects_subject_mismatch() {
        let registry = registry();
        let claims = ClientAssertionClaims {
            iss: "agent0-client".to_string(),
            sub: "someone-else".to_string(),
            aud: Audience::from(ENDPOINT),
            iat: NOW,
            exp: NOW + 300,
            jti: generate_jti(),
        };
        let keys = signer();
        let token = jwt::encode_token(&TokenHeader::for_signer(&keys, JWT_TYPE), &claims, &keys).unwrap();

        let err = verify_client_assertion(
            Some(&token),
            Some(CLIENT_ASSERTION_TYPE),
            &registry,
            ENDPOINT,
            NOW,
        )
        .unwrap_err();
        assert!(err.description().contains("subject"));
    }
}
