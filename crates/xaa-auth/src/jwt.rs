//! Compact token codec
//!
//! This module encodes and decodes compact JWS tokens
//! (`base64url(header).base64url(payload).signature`). Signing and
//! verification sit behind the [`TokenSigner`] and [`TokenVerifier`]
//! capability traits so callers never depend on a concrete algorithm.
//! [`JwtKeys`] implements both using the jsonwebtoken crate and supports
//! HS256, HS384, HS512, RS256, RS384, RS512, ES256 and ES384.

use crate::error::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Upper bound on accepted token length.
pub const MAX_TOKEN_LEN: usize = 16 * 1024;

/// Supported JWT algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
}

impl JwtAlgorithm {
    /// The `alg` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            JwtAlgorithm::HS256 => "HS256",
            JwtAlgorithm::HS384 => "HS384",
            JwtAlgorithm::HS512 => "HS512",
            JwtAlgorithm::RS256 => "RS256",
            JwtAlgorithm::RS384 => "RS384",
            JwtAlgorithm::RS512 => "RS512",
            JwtAlgorithm::ES256 => "ES256",
            JwtAlgorithm::ES384 => "ES384",
        }
    }

    /// Parse an `alg` header value. `none` and unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HS256" => Some(JwtAlgorithm::HS256),
            "HS384" => Some(JwtAlgorithm::HS384),
            "HS512" => Some(JwtAlgorithm::HS512),
            "RS256" => Some(JwtAlgorithm::RS256),
            "RS384" => Some(JwtAlgorithm::RS384),
            "RS512" => Some(JwtAlgorithm::RS512),
            "ES256" => Some(JwtAlgorithm::ES256),
            "ES384" => Some(JwtAlgorithm::ES384),
            _ => None,
        }
    }

    /// Whether this is a shared-secret (HMAC) algorithm.
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512
        )
    }
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
            JwtAlgorithm::RS256 => Algorithm::RS256,
            JwtAlgorithm::RS384 => Algorithm::RS384,
            JwtAlgorithm::RS512 => Algorithm::RS512,
            JwtAlgorithm::ES256 => Algorithm::ES256,
            JwtAlgorithm::ES384 => Algorithm::ES384,
        }
    }
}

/// Capability to produce signatures over a signing input.
pub trait TokenSigner: Send + Sync {
    /// Algorithm written into the token header.
    fn algorithm(&self) -> JwtAlgorithm;

    /// Optional key identifier written into the token header.
    fn key_id(&self) -> Option<&str> {
        None
    }

    /// Sign `header_segment.payload_segment`, returning a base64url signature.
    fn sign(&self, signing_input: &[u8]) -> AuthResult<String>;
}

/// Capability to check signatures over a signing input.
pub trait TokenVerifier: Send + Sync {
    /// Returns `Ok(true)` only when `signature` is valid for `signing_input`
    /// under `algorithm`. A verifier must return `Ok(false)` for algorithms
    /// it was not configured for.
    fn verify(
        &self,
        algorithm: JwtAlgorithm,
        signing_input: &[u8],
        signature: &str,
    ) -> AuthResult<bool>;
}

/// Key material configuration.
#[derive(Clone)]
pub struct KeyConfig {
    /// Secret key for HMAC algorithms (HS256, HS384, HS512)
    pub secret: Option<String>,

    /// Private key (PEM) for RSA/EC algorithms
    pub private_key: Option<String>,

    /// Public key (PEM) for RSA/EC algorithms
    pub public_key: Option<String>,

    /// Algorithm to use
    pub algorithm: JwtAlgorithm,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("public_key", &self.public_key.is_some())
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl KeyConfig {
    /// HS256 configuration from a shared secret.
    pub fn hmac(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            private_key: None,
            public_key: None,
            algorithm: JwtAlgorithm::HS256,
        }
    }
}

/// Signing and verification keys for one algorithm.
///
/// A `JwtKeys` built from a public key alone can verify but not sign.
pub struct JwtKeys {
    algorithm: JwtAlgorithm,
    key_id: Option<String>,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtKeys {
    /// Create keys from configuration.
    pub fn new(config: &KeyConfig) -> AuthResult<Self> {
        let decoding_key = Self::create_decoding_key(config)?;
        let encoding_key = if config.algorithm.is_symmetric() || config.private_key.is_some() {
            Some(Self::create_encoding_key(config)?)
        } else {
            None
        };

        Ok(Self {
            algorithm: config.algorithm,
            key_id: None,
            encoding_key,
            decoding_key,
        })
    }

    /// Create HS256 keys from a shared secret.
    pub fn hmac(secret: impl Into<String>) -> AuthResult<Self> {
        Self::new(&KeyConfig::hmac(secret))
    }

    /// Attach a key identifier that is written into issued token headers.
    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_id = Some(kid.into());
        self
    }

    /// Whether these keys can sign.
    pub fn can_sign(&self) -> bool {
        self.encoding_key.is_some()
    }

    fn create_encoding_key(config: &KeyConfig) -> AuthResult<EncodingKey> {
        match config.algorithm {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => {
                let secret = config
                    .secret
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Secret required for HMAC".to_string()))?;
                Ok(EncodingKey::from_secret(secret.as_bytes()))
            }
            JwtAlgorithm::RS256 | JwtAlgorithm::RS384 | JwtAlgorithm::RS512 => {
                let key = config
                    .private_key
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Private key required for RSA".to_string()))?;
                EncodingKey::from_rsa_pem(key.as_bytes())
                    .map_err(|e| AuthError::ConfigError(format!("Invalid RSA private key: {}", e)))
            }
            JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => {
                let key = config
                    .private_key
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Private key required for EC".to_string()))?;
                EncodingKey::from_ec_pem(key.as_bytes())
                    .map_err(|e| AuthError::ConfigError(format!("Invalid EC private key: {}", e)))
            }
        }
    }

    fn create_decoding_key(config: &KeyConfig) -> AuthResult<DecodingKey> {
        match config.algorithm {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => {
                let secret = config
                    .secret
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Secret required for HMAC".to_string()))?;
                Ok(DecodingKey::from_secret(secret.as_bytes()))
            }
            JwtAlgorithm::RS256 | JwtAlgorithm::RS384 | JwtAlgorithm::RS512 => {
                let key = config
                    .public_key
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Public key required for RSA".to_string()))?;
                DecodingKey::from_rsa_pem(key.as_bytes())
                    .map_err(|e| AuthError::ConfigError(format!("Invalid RSA public key: {}", e)))
            }
            JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => {
                let key = config
                    .public_key
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Public key required for EC".to_string()))?;
                DecodingKey::from_ec_pem(key.as_bytes())
                    .map_err(|e| AuthError::ConfigError(format!("Invalid EC public key: {}", e)))
            }
        }
    }
}

impl TokenSigner for JwtKeys {
    fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, signing_input: &[u8]) -> AuthResult<String> {
        let key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| AuthError::ConfigError("Keys are verification-only".to_string()))?;
        jsonwebtoken::crypto::sign(signing_input, key, self.algorithm.into())
            .map_err(|e| AuthError::Internal(format!("Token signing failed: {}", e)))
    }
}

impl TokenVerifier for JwtKeys {
    fn verify(
        &self,
        algorithm: JwtAlgorithm,
        signing_input: &[u8],
        signature: &str,
    ) -> AuthResult<bool> {
        // Only the configured algorithm is acceptable; this closes the
        // HMAC-with-public-key confusion.
        if algorithm != self.algorithm {
            return Ok(false);
        }
        Ok(jsonwebtoken::crypto::verify(
            signature,
            signing_input,
            &self.decoding_key,
            self.algorithm.into(),
        )
        .unwrap_or(false))
    }
}

/// JOSE header of a compact token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    /// Signing algorithm
    pub alg: String,

    /// Media type of the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl TokenHeader {
    /// Header for tokens produced by `signer` with the given `typ`.
    pub fn for_signer(signer: &dyn TokenSigner, typ: &str) -> Self {
        Self {
            alg: signer.algorithm().as_str().to_string(),
            typ: Some(typ.to_string()),
            kid: signer.key_id().map(String::from),
        }
    }
}

/// A structurally valid, not yet verified, compact token.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// Decoded header
    pub header: TokenHeader,

    /// Decoded payload (always a JSON object)
    pub payload: serde_json::Value,

    /// `header_segment.payload_segment` as received
    pub signing_input: String,

    /// Signature segment as received
    pub signature: String,
}

impl DecodedToken {
    /// Deserialize the payload into a typed claim set.
    pub fn claims<C: DeserializeOwned>(&self) -> AuthResult<C> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| AuthError::MalformedToken(format!("Unexpected claim shape: {}", e)))
    }

    /// Parsed header algorithm, if recognised.
    pub fn algorithm(&self) -> Option<JwtAlgorithm> {
        JwtAlgorithm::parse(&self.header.alg)
    }
}

/// Encode a JSON-serializable value as a base64url segment.
fn encode_segment<T: Serialize + ?Sized>(value: &T) -> AuthResult<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| AuthError::Internal(format!("Segment serialization failed: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment(segment: &str, name: &str) -> AuthResult<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken(format!("{} is not valid base64url", name)))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::MalformedToken(format!("{} is not valid JSON", name)))?;
    if !value.is_object() {
        return Err(AuthError::MalformedToken(format!("{} is not a JSON object", name)));
    }
    Ok(value)
}

/// Sign the two leading segments of a token.
pub fn sign(
    header_segment: &str,
    payload_segment: &str,
    signer: &dyn TokenSigner,
) -> AuthResult<String> {
    let signing_input = format!("{}.{}", header_segment, payload_segment);
    signer.sign(signing_input.as_bytes())
}

/// Encode and sign a claim set.
pub fn encode_token<C: Serialize>(
    header: &TokenHeader,
    claims: &C,
    signer: &dyn TokenSigner,
) -> AuthResult<String> {
    if header.alg != signer.algorithm().as_str() {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "header alg {} does not match signer alg {}",
            header.alg,
            signer.algorithm().as_str()
        )));
    }
    let header_segment = encode_segment(header)?;
    let payload_segment = encode_segment(claims)?;
    let signature = sign(&header_segment, &payload_segment, signer)?;
    Ok(format!("{}.{}.{}", header_segment, payload_segment, signature))
}

/// Split and decode a compact token without verifying it.
///
/// Fails with [`AuthError::MalformedToken`] unless the token has exactly
/// three dot-separated segments whose first two are base64url JSON objects.
pub fn decode_token(token: &str) -> AuthResult<DecodedToken> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(AuthError::MalformedToken("token too large".to_string()));
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header_value = decode_segment(segments[0], "header")?;
    let header: TokenHeader = serde_json::from_value(header_value)
        .map_err(|_| AuthError::MalformedToken("header is missing alg".to_string()))?;
    let payload = decode_segment(segments[1], "payload")?;

    Ok(DecodedToken {
        header,
        payload,
        signing_input: format!("{}.{}", segments[0], segments[1]),
        signature: segments[2].to_string(),
    })
}

/// Check a token's signature.
///
/// Returns `false` for malformed tokens, unknown algorithms and bad
/// signatures alike.
pub fn verify(token: &str, verifier: &dyn TokenVerifier) -> bool {
    match decode_token(token) {
        Ok(decoded) => verify_decoded(&decoded, verifier),
        Err(_) => false,
    }
}

/// Check the signature of an already decoded token.
pub fn verify_decoded(decoded: &DecodedToken, verifier: &dyn TokenVerifier) -> bool {
    let Some(algorithm) = decoded.algorithm() else {
        return false;
    };
    verifier
        .verify(algorithm, decoded.signing_input.as_bytes(), &decoded.signature)
        .unwrap_or(false)
}

/// Full SHA-256 of the token, hex encoded. Usable as a lookup key for
/// state tied to one exact token.
pub fn token_digest(token: &str) -> String {
    hex_encode(&Sha256::digest(token.as_bytes()))
}

/// Short, non-reversible token identifier for logs.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex_encode(&digest[..8])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
