//! JWT session tokens
//!
//! HS256 tokens carrying the subject identity, its role, and an absolute
//! expiry instant. Issuing and validating a token are both side-effect
//! free; marking a session online is the orchestrator's job.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::types::WicketError;

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identity (login key / email)
    pub sub: String,
    /// Role tag for authorization decisions
    pub role: Role,
    /// Absolute expiry, seconds since the Unix epoch
    pub exp: u64,
    /// Issued-at, seconds since the Unix epoch
    pub iat: u64,
}

/// Input for token generation
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub subject: String,
    pub role: Role,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Issues and validates HS256 session tokens with a server-held secret
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a validator from a shared secret
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, WicketError> {
        if secret.is_empty() {
            return Err(WicketError::Config("JWT secret must not be empty".into()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        })
    }

    /// Dev-mode validator with a fixed insecure secret
    pub fn new_dev() -> Self {
        let secret = "dev-only-insecure-secret";
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds: 3600,
        }
    }

    /// Generate a signed token for the given subject and role
    pub fn generate_token(&self, input: TokenInput) -> Result<String, WicketError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: input.subject,
            role: input.role,
            exp: now + self.expiry_seconds,
            iat: now,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| WicketError::Auth(format!("Failed to sign token: {e}")))
    }

    /// Validate a token: signature, structure, and expiry.
    ///
    /// A token is invalid at or after its embedded expiry instant (no
    /// leeway), and valid at any instant strictly before it.
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => {
                // The library treats exp == now as still valid; the session
                // contract says a token dies at its expiry instant.
                let now = chrono::Utc::now().timestamp() as u64;
                if data.claims.exp <= now {
                    return TokenValidationResult {
                        valid: false,
                        claims: None,
                        error: Some("token expired".into()),
                    };
                }

                TokenValidationResult {
                    valid: true,
                    claims: Some(data.claims),
                    error: None,
                }
            }
            Err(e) => TokenValidationResult {
                valid: false,
                claims: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
