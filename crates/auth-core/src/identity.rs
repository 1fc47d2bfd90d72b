// Resolved principal for an authenticated request
// Decision: Fields are private; an Identity is built once by a strategy and only read afterwards

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credential scheme that produced an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Username/password login backed by a session cookie
    SessionCookie,
    /// Stateless signed bearer token
    BearerToken,
    /// Static API key
    ApiKey,
    /// Third-party login backed by a session cookie
    DelegatedLogin,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::SessionCookie => "session_cookie",
            Scheme::BearerToken => "bearer_token",
            Scheme::ApiKey => "api_key",
            Scheme::DelegatedLogin => "delegated_login",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated principal attached to the request context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    issued_by: Scheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(subject: impl Into<String>, issued_by: Scheme) -> Self {
        Self {
            subject: subject.into(),
            display_name: None,
            email: None,
            issued_by,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Unique within the issuing scheme
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn issued_by(&self) -> Scheme {
        self.issued_by
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True once `expires_at` has been reached. Identities without expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}
