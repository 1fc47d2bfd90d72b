// Signed session cookies
// Decision: The cookie carries the whole payload, signed with HMAC-SHA256 over its encoded form
// Decision: A server-side registry of live session ids makes invalidation stick even if the old cookie is replayed
// Decision: Cookie Max-Age is derived from the payload's expires_at so both expiry signals agree
//
// Wire format: base64url(json(payload)) "." base64url(hmac_sha256(key, first part))

use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::SessionConfig;
use crate::crypto::{generate_random_id, Signer};
use crate::error::{AuthError, Result};
use crate::identity::Identity;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Values held by a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionValues {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl SessionValues {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            authenticated: true,
            identity: Some(identity),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    id: String,
    values: SessionValues,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// A session as seen by request handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    pub values: SessionValues,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    signature: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Signature of the last serialized form
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Identity of a signed-in session
    pub fn identity(&self) -> Option<&Identity> {
        if self.values.authenticated {
            self.values.identity.as_ref()
        } else {
            None
        }
    }
}

/// Session store: signs, verifies and tracks live sessions
pub struct SessionStore {
    signer: Signer,
    max_age: Duration,
    cookie_secure: bool,
    live: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let max_age = Duration::from_std(config.max_age)
            .map_err(|e| AuthError::internal(format!("session max age out of range: {}", e)))?;
        Utc::now()
            .checked_add_signed(max_age)
            .ok_or_else(|| AuthError::internal("session max age out of range"))?;
        Ok(Self {
            signer: Signer::new(&config.secret)?,
            max_age,
            cookie_secure: config.cookie_secure,
            live: RwLock::new(HashMap::new()),
        })
    }

    /// Start a new session with a fresh unguessable id
    pub fn create(&self, values: SessionValues) -> Result<Session> {
        self.purge_expired();

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.max_age)
            .ok_or_else(|| AuthError::internal("session expiry out of range"))?;
        let mut session = Session {
            id: generate_random_id(),
            values,
            created_at: now,
            expires_at,
            signature: String::new(),
        };
        self.encode(&mut session)?;

        self.live
            .write()
            .insert(session.id.clone(), session.expires_at);
        tracing::debug!(session_id = %session.id, "session created");

        Ok(session)
    }

    /// Load a session from a cookie value. Tampered, expired or revoked sessions yield None.
    pub fn load(&self, cookie_value: &str) -> Option<Session> {
        match self.load_checked(cookie_value) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!(reason = %e, "session cookie rejected");
                None
            }
        }
    }

    /// Like `load`, but keeps the rejection reason for logging
    pub fn load_checked(&self, cookie_value: &str) -> Result<Session> {
        if cookie_value.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let (encoded, signature) = cookie_value
            .split_once('.')
            .ok_or_else(|| AuthError::malformed("session cookie has no signature"))?;
        let tag = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::malformed("session signature is not base64"))?;

        // Nothing in the payload is looked at before the signature checks out
        if !self.signer.verify(encoded.as_bytes(), &tag) {
            return Err(AuthError::invalid("session signature mismatch"));
        }

        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::malformed("session payload is not base64"))?;
        let payload: SessionPayload = serde_json::from_slice(&raw)
            .map_err(|e| AuthError::malformed(format!("session payload: {}", e)))?;

        if Utc::now() >= payload.expires_at {
            return Err(AuthError::Expired);
        }

        let registered = self.live.read().get(&payload.id).copied();
        if registered != Some(payload.expires_at) {
            return Err(AuthError::invalid("session is no longer live"));
        }

        Ok(Session {
            id: payload.id,
            values: payload.values,
            created_at: payload.created_at,
            expires_at: payload.expires_at,
            signature: signature.to_string(),
        })
    }

    /// Re-sign a (possibly mutated) session and build its cookie
    pub fn save(&self, session: &mut Session) -> Result<Cookie<'static>> {
        let value = self.encode(session)?;
        let remaining = (session.expires_at - Utc::now()).num_seconds().max(0);

        Ok(Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(remaining))
            .build())
    }

    /// Revoke a session and build a cookie that clears it on the client.
    /// The session is consumed; its values are gone with it.
    pub fn invalidate(&self, session: Session) -> Cookie<'static> {
        self.live.write().remove(&session.id);
        tracing::debug!(session_id = %session.id, "session invalidated");
        self.expired_cookie()
    }

    /// Cookie directive that removes the session cookie (`Max-Age=0`)
    pub fn expired_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO)
            .build()
    }

    /// Drop registry entries past their expiry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut live = self.live.write();
        let before = live.len();
        live.retain(|_, expires_at| *expires_at > now);
        before - live.len()
    }

    /// Number of sessions currently registered as live
    pub fn live_count(&self) -> usize {
        self.live.read().len()
    }

    fn encode(&self, session: &mut Session) -> Result<String> {
        let payload = SessionPayload {
            id: session.id.clone(),
            values: session.values.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| AuthError::internal(format!("failed to serialize session: {}", e)))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.signer.sign(encoded.as_bytes()));

        let value = format!("{}.{}", encoded, signature);
        session.signature = signature;
        Ok(value)
    }
}
