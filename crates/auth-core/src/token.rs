// Stateless bearer tokens
// Decision: HS256 JWTs; the only server state is the signing secret
// Decision: Decode failures, bad signatures and expiry all collapse into one rejection for the caller

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

use crate::config::TokenConfig;
use crate::error::{AuthError, Result};

/// Scheme prefix of the Authorization header (case-sensitive)
pub const BEARER_PREFIX: &str = "Bearer ";

const REJECTION: &str = "invalid or expired token";

/// JWT claims carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues and verifies bearer tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: StdDuration,
}

impl TokenCodec {
    /// Fails when the configured lifetime cannot be added to the current time
    pub fn new(config: &TokenConfig) -> Result<Self> {
        expiry_after(Utc::now(), config.ttl)?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            default_ttl: config.ttl,
        })
    }

    /// Lifetime used by `issue_default`
    pub fn default_ttl(&self) -> StdDuration {
        self.default_ttl
    }

    /// Sign claims `{sub, iat: now, exp: now + ttl}`
    pub fn issue(&self, subject: &str, ttl: StdDuration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expiry_after(now, ttl)?.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("failed to encode token: {}", e)))
    }

    pub fn issue_default(&self, subject: &str) -> Result<String> {
        self.issue(subject, self.default_ttl)
    }

    /// Validate signature and expiry. Valid iff the signature matches and `now < exp`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            AuthError::invalid(REJECTION)
        })?;

        // jsonwebtoken accepts exp == now; we do not
        if data.claims.exp <= Utc::now().timestamp() {
            tracing::debug!(sub = %data.claims.sub, "bearer token expired");
            return Err(AuthError::invalid(REJECTION));
        }

        Ok(data.claims)
    }
}

/// `now + ttl`, or an internal failure when it leaves chrono's range
fn expiry_after(now: DateTime<Utc>, ttl: StdDuration) -> Result<DateTime<Utc>> {
    Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            AuthError::internal(format!("lifetime of {}s is out of range", ttl.as_secs()))
        })
}

/// Extract the raw token from `Authorization: Bearer <token>`.
///
/// The prefix must match exactly; the header length is checked before slicing.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::malformed("authorization header is not visible ASCII"))?;

    if value.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    if value.len() < BEARER_PREFIX.len() {
        return Err(AuthError::malformed("authorization header shorter than scheme"));
    }

    match (
        value.get(..BEARER_PREFIX.len()),
        value.get(BEARER_PREFIX.len()..),
    ) {
        (Some(prefix), Some(token)) if prefix == BEARER_PREFIX && !token.is_empty() => Ok(token),
        (Some(prefix), _) if prefix == BEARER_PREFIX => {
            Err(AuthError::malformed("bearer token is empty"))
        }
        _ => Err(AuthError::malformed("authorization scheme is not Bearer")),
    }
}
