//! Signed, expiring bearer tokens.
//!
//! Tokens are HS256 JWTs. The codec is built once at startup from the
//! process-wide [`SigningKey`] and shared read-only by every request.

use std::fmt;
use std::time::Duration;

use boutique_crypto::SigningKey;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Token issuance settings.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Value of the `iss` claim, checked on parse.
    pub issuer: String,
    /// Lifetime of every issued token.
    pub ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "boutique".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (username).
    pub sub: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiration (Unix seconds). The token is expired from this instant on.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// Role hints. Advisory only, the principal store is authoritative.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

/// Why a token failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Authentic token, past its expiry.
    #[error("token expired")]
    Expired,

    /// Anything else: bad signature, bad structure, missing claims,
    /// wrong issuer.
    #[error("malformed token")]
    Malformed,
}

/// Why a token could not be issued.
#[derive(Debug, Error)]
pub enum IssueError {
    /// Subject is empty.
    #[error("token subject cannot be empty")]
    EmptySubject,

    /// Signing failed.
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issues and parses bearer tokens.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: TokenConfig,
}

impl TokenCodec {
    /// Creates a codec signing with `key`.
    pub fn new(key: &SigningKey, config: TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);
        // Expiry is checked by `parse_at` so that "at expiry" counts as expired.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
            config,
        }
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Issues a token for `subject`, valid from now for the configured TTL.
    pub fn issue(&self, subject: &str, roles: &[String]) -> Result<String, IssueError> {
        self.issue_at(subject, roles, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> Result<String, IssueError> {
        if subject.is_empty() {
            return Err(IssueError::EmptySubject);
        }

        let iat = now.timestamp();
        let ttl = i64::try_from(self.config.ttl.as_secs()).unwrap_or(i64::MAX);

        let claims = TokenClaims {
            sub: subject.to_string(),
            iat,
            exp: iat.saturating_add(ttl),
            iss: self.config.issuer.clone(),
            roles: roles.to_vec(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verifies a token and returns its claims.
    pub fn parse(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.parse_at(token, Utc::now())
    }

    /// Verifies a token as if the current time were `now`.
    ///
    /// Expiry is only reported for tokens whose signature checks out.
    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!(kind = ?e.kind(), "Token rejected");
                TokenError::Malformed
            })?;

        let claims = data.claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Returns `true` if the token parses and names `expected_subject`.
    pub fn is_valid(&self, token: &str, expected_subject: &str) -> bool {
        self.is_valid_at(token, expected_subject, Utc::now())
    }

    /// [`TokenCodec::is_valid`] evaluated at `now`.
    pub fn is_valid_at(&self, token: &str, expected_subject: &str, now: DateTime<Utc>) -> bool {
        matches!(self.parse_at(token, now), Ok(claims) if claims.sub == expected_subject)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("keys", &"[REDACTED]")
            .field("config", &self.config)
            .finish()
    }
}
