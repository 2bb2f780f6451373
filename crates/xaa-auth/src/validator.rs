//! Assertion validation
//!
//! [`validate`] is the single gate every inbound token passes through. It is
//! a pure function of the token, a verifier, the constraints and the current
//! time, and reports every failure as a [`ValidationError`]; nothing in here
//! panics on attacker-controlled input.

use crate::claims::RegisteredClaims;
use crate::error::AuthError;
use crate::jwt::{self, TokenVerifier};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Typed reasons a token is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Token is structurally invalid or its claims have the wrong shape
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Signature did not verify
    #[error("invalid signature")]
    InvalidSignature,

    /// Header `typ` is not the expected token type
    #[error("unexpected token type: {0}")]
    UnexpectedType(String),

    /// Token is at or past its expiry
    #[error("token expired")]
    Expired,

    /// Token is not valid yet
    #[error("token not yet valid")]
    NotYetValid,

    /// Issuer does not satisfy the constraint
    #[error("issuer mismatch: {0}")]
    IssuerMismatch(String),

    /// No audience value satisfies the constraint
    #[error("audience mismatch: {0}")]
    AudienceMismatch(String),
}

impl ValidationError {
    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Malformed(_) => "malformed",
            ValidationError::InvalidSignature => "invalid_signature",
            ValidationError::UnexpectedType(_) => "unexpected_type",
            ValidationError::Expired => "expired",
            ValidationError::NotYetValid => "not_yet_valid",
            ValidationError::IssuerMismatch(_) => "issuer_mismatch",
            ValidationError::AudienceMismatch(_) => "audience_mismatch",
        }
    }
}

impl From<AuthError> for ValidationError {
    fn from(err: AuthError) -> Self {
        ValidationError::Malformed(err.to_string())
    }
}

/// How a claim value is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimMatch {
    /// Value must equal the expectation
    Exact(String),
    /// Value must contain the expectation as a substring
    Contains(String),
}

impl ClaimMatch {
    fn matches(&self, value: &str) -> bool {
        match self {
            ClaimMatch::Exact(expected) => value == expected,
            ClaimMatch::Contains(needle) => value.contains(needle.as_str()),
        }
    }

    fn expected(&self) -> &str {
        match self {
            ClaimMatch::Exact(expected) | ClaimMatch::Contains(expected) => expected,
        }
    }
}

/// Constraints applied by [`validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationConstraints {
    /// Issuer constraint
    pub issuer: Option<ClaimMatch>,

    /// Audience constraint; satisfied when any audience value matches
    pub audience: Option<ClaimMatch>,

    /// Required header `typ`
    pub token_type: Option<String>,

    /// Clock skew tolerance in seconds
    pub leeway: i64,
}

impl ValidationConstraints {
    /// Constraints that only check signature and time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the issuer to equal `issuer`.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(ClaimMatch::Exact(issuer.into()));
        self
    }

    /// Require the issuer to contain `needle`.
    pub fn issuer_contains(mut self, needle: impl Into<String>) -> Self {
        self.issuer = Some(ClaimMatch::Contains(needle.into()));
        self
    }

    /// Require an audience value equal to `audience`.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(ClaimMatch::Exact(audience.into()));
        self
    }

    /// Require an audience value containing `needle`.
    pub fn audience_contains(mut self, needle: impl Into<String>) -> Self {
        self.audience = Some(ClaimMatch::Contains(needle.into()));
        self
    }

    /// Require the header `typ`.
    pub fn token_type(mut self, typ: impl Into<String>) -> Self {
        self.token_type = Some(typ.into());
        self
    }

    /// Allow `seconds` of clock skew on `exp` and `nbf`.
    pub fn leeway(mut self, seconds: i64) -> Self {
        self.leeway = seconds.max(0);
        self
    }
}

/// Validate `token` and return its claims.
///
/// Checks run in a fixed order: structure, signature, header type, claim
/// shape, expiry (`now >= exp` is expired), not-before, issuer, audience.
pub fn validate<C>(
    token: &str,
    verifier: &dyn TokenVerifier,
    constraints: &ValidationConstraints,
    now: i64,
) -> Result<C, ValidationError>
where
    C: DeserializeOwned + RegisteredClaims,
{
    let decoded = jwt::decode_token(token)?;

    if !jwt::verify_decoded(&decoded, verifier) {
        return Err(ValidationError::InvalidSignature);
    }

    if let Some(expected) = &constraints.token_type {
        let actual = decoded.header.typ.as_deref().unwrap_or_default();
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(ValidationError::UnexpectedType(actual.to_string()));
        }
    }

    let claims: C = decoded.claims()?;

    if now >= claims.expires_at().saturating_add(constraints.leeway) {
        return Err(ValidationError::Expired);
    }

    if let Some(nbf) = claims.not_before() {
        if now.saturating_add(constraints.leeway) < nbf {
            return Err(ValidationError::NotYetValid);
        }
    }

    if let Some(issuer) = &constraints.issuer {
        if !issuer.matches(claims.issuer()) {
            return Err(ValidationError::IssuerMismatch(format!(
                "expected {}",
                issuer.expected()
            )));
        }
    }

    if let Some(audience) = &constraints.audience {
        if !claims.audiences().iter().any(|aud| audience.matches(aud)) {
            return Err(ValidationError::AudienceMismatch(format!(
                "expected {}",
                audience.expected()
            )));
        }
    }

    Ok(claims)
}
