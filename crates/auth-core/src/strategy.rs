// Authentication strategies, one per credential scheme
// Decision: A strategy only reads the request head; bodies are never consumed during authentication
// Decision: Each strategy owns its rejection response so browser routes can redirect while API routes answer 401

use async_trait::async_trait;
use axum::{
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::api_key::{ApiKeySet, API_KEY_HEADER};
use crate::error::{AuthError, Result};
use crate::identity::{Identity, Scheme};
use crate::session::{SessionStore, SESSION_COOKIE};
use crate::token::{bearer_token, TokenCodec};
use crate::verifier::CredentialVerifier;

/// Login page that browser-facing strategies send unauthenticated callers to
pub const LOGIN_PATH: &str = "/login";

/// Resolves a request into an identity or a rejection
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn scheme(&self) -> Scheme;

    async fn authenticate(&self, parts: &Parts) -> Result<Identity>;

    /// Response sent instead of the handler when authentication fails
    fn reject(&self, err: &AuthError) -> Response {
        (err.status(), err.public_message()).into_response()
    }
}

/// `302 Found` to a local path
pub fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn session_cookie_value(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

fn redirect_or_fail(err: &AuthError) -> Response {
    if err.is_unauthorized() {
        redirect_found(LOGIN_PATH)
    } else {
        (err.status(), err.public_message()).into_response()
    }
}

/// Session cookie set by the username/password login
pub struct SessionCookieStrategy {
    sessions: Arc<SessionStore>,
}

impl SessionCookieStrategy {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl AuthStrategy for SessionCookieStrategy {
    fn scheme(&self) -> Scheme {
        Scheme::SessionCookie
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Identity> {
        let value = session_cookie_value(parts).ok_or(AuthError::MissingCredential)?;
        let session = self.sessions.load_checked(&value)?;
        session
            .identity()
            .cloned()
            .ok_or_else(|| AuthError::invalid("session is not signed in"))
    }

    fn reject(&self, err: &AuthError) -> Response {
        redirect_or_fail(err)
    }
}

/// Session cookie produced by the delegated login; other sessions are refused
pub struct DelegatedSessionStrategy {
    sessions: Arc<SessionStore>,
}

impl DelegatedSessionStrategy {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl AuthStrategy for DelegatedSessionStrategy {
    fn scheme(&self) -> Scheme {
        Scheme::DelegatedLogin
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Identity> {
        let value = session_cookie_value(parts).ok_or(AuthError::MissingCredential)?;
        let session = self.sessions.load_checked(&value)?;
        let identity = session
            .identity()
            .ok_or_else(|| AuthError::invalid("session is not signed in"))?;

        if identity.issued_by() != Scheme::DelegatedLogin {
            return Err(AuthError::invalid("session was not issued by delegated login"));
        }
        if identity.is_expired_at(Utc::now()) {
            return Err(AuthError::Expired);
        }
        Ok(identity.clone())
    }

    fn reject(&self, err: &AuthError) -> Response {
        redirect_or_fail(err)
    }
}

/// `Authorization: Bearer <jwt>`
pub struct BearerTokenStrategy {
    tokens: Arc<TokenCodec>,
}

impl BearerTokenStrategy {
    pub fn new(tokens: Arc<TokenCodec>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthStrategy for BearerTokenStrategy {
    fn scheme(&self) -> Scheme {
        Scheme::BearerToken
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Identity> {
        let token = bearer_token(&parts.headers)?;
        let claims = self.tokens.verify(token)?;

        let expires_at = chrono::DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::invalid("token expiry out of range"))?;
        Ok(Identity::new(claims.sub, Scheme::BearerToken).with_expiry(expires_at))
    }

    fn reject(&self, err: &AuthError) -> Response {
        let message = match err {
            AuthError::MissingCredential => "Authentication required",
            e if e.is_unauthorized() => "Invalid or expired token",
            e => e.public_message(),
        };
        (err.status(), Json(json!({ "error": message }))).into_response()
    }
}

/// `X-API-Key: <key>`
pub struct ApiKeyStrategy {
    keys: Arc<ApiKeySet>,
}

impl ApiKeyStrategy {
    pub fn new(keys: Arc<ApiKeySet>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl AuthStrategy for ApiKeyStrategy {
    fn scheme(&self) -> Scheme {
        Scheme::ApiKey
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Identity> {
        let key = match parts.headers.get(API_KEY_HEADER) {
            None => return Err(AuthError::MissingCredential),
            Some(value) => value
                .to_str()
                .map_err(|_| AuthError::malformed("api key is not visible ASCII"))?,
        };
        let subject = self.keys.verify(key)?;
        Ok(Identity::new(subject, Scheme::ApiKey))
    }

    fn reject(&self, err: &AuthError) -> Response {
        if err.is_unauthorized() {
            (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: missing or invalid API key",
            )
                .into_response()
        } else {
            (err.status(), err.public_message()).into_response()
        }
    }
}
