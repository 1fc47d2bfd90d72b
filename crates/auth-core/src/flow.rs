// Delegated login flow controller
// Decision: A pending login is removed from the map before any network call, so it is single use
//           and a dropped callback future cannot leave it behind
// Decision: Every provider call is bounded by a timeout; expiry of the bound is a retryable failure
// Decision: A failed exchange is terminal for that state; the user re-initiates login
// Decision: Pending logins are capped; past the cap the oldest one is evicted

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::crypto::generate_random_id;
use crate::error::{AuthError, Result};
use crate::identity::Identity;
use crate::provider::IdentityProvider;
use crate::session::{Session, SessionStore, SessionValues};

/// Phases of one delegated login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    NotStarted,
    AwaitingCallback,
    Exchanged,
    Resolved,
    Failed,
}

impl FlowPhase {
    /// Move to `next`, rejecting transitions the flow does not allow
    pub fn advance(self, next: FlowPhase) -> Result<FlowPhase> {
        use FlowPhase::*;
        match (self, next) {
            (NotStarted, AwaitingCallback)
            | (AwaitingCallback, Exchanged)
            | (AwaitingCallback, Failed)
            | (Exchanged, Resolved)
            | (Exchanged, Failed) => Ok(next),
            _ => Err(AuthError::internal(format!(
                "illegal login flow transition {:?} -> {:?}",
                self, next
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlowPhase::Resolved | FlowPhase::Failed)
    }
}

/// Timing limits of the flow
#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// How long a started login waits for its callback
    pub state_ttl: Duration,
    /// Bound on each call to the identity provider
    pub upstream_timeout: Duration,
    /// Most logins that may wait for a callback at once
    pub max_pending: usize,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            state_ttl: Duration::from_secs(300),
            upstream_timeout: Duration::from_secs(10),
            max_pending: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingLogin {
    redirect_target: String,
    created_at: Instant,
}

/// Consent page URL plus the state nonce it carries
#[derive(Debug, Clone)]
pub struct AuthorizationUrl {
    pub url: Url,
    pub state: String,
}

/// Result of a completed callback
#[derive(Debug)]
pub struct LoginOutcome {
    pub identity: Identity,
    /// Freshly created session holding the identity; not yet serialized
    pub session: Session,
    pub redirect_target: String,
}

/// Accept only local absolute paths as post-login destinations
pub fn local_redirect_target(target: Option<&str>) -> String {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.contains('\\') => {
            t.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Drives the authorization code flow against an identity provider
pub struct LoginFlow {
    provider: Arc<dyn IdentityProvider>,
    sessions: Arc<SessionStore>,
    pending: Mutex<HashMap<String, PendingLogin>>,
    settings: FlowSettings,
}

impl LoginFlow {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sessions: Arc<SessionStore>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            provider,
            sessions,
            pending: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Begin a login: record a fresh state nonce and build the consent URL
    pub fn start(&self, redirect_target: Option<&str>) -> Result<AuthorizationUrl> {
        self.purge_expired();
        FlowPhase::NotStarted.advance(FlowPhase::AwaitingCallback)?;

        let state = generate_random_id();
        let redirect_target = local_redirect_target(redirect_target);
        let count = {
            let mut pending = self.pending.lock();
            while pending.len() >= self.settings.max_pending.max(1) {
                let oldest = pending
                    .iter()
                    .min_by_key(|(_, p)| p.created_at)
                    .map(|(state, _)| state.clone());
                match oldest {
                    Some(state) => {
                        pending.remove(&state);
                        tracing::warn!("pending login limit reached, oldest login evicted");
                    }
                    None => break,
                }
            }
            pending.insert(
                state.clone(),
                PendingLogin {
                    redirect_target,
                    created_at: Instant::now(),
                },
            );
            pending.len()
        };
        tracing::info!(pending = count, "delegated login started");

        Ok(AuthorizationUrl {
            url: self.provider.authorization_url(&state),
            state,
        })
    }

    /// Complete a login from the provider's callback parameters
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<LoginOutcome> {
        let pending = self.take_pending(state);

        if code.is_empty() {
            if pending.is_some() {
                return Err(self.fail(FlowPhase::AwaitingCallback, AuthError::MissingCredential));
            }
            return Err(AuthError::MissingCredential);
        }

        let pending = pending.ok_or(AuthError::CsrfMismatch)?;
        let phase = FlowPhase::AwaitingCallback;

        let token = match self
            .bounded("token exchange", self.provider.exchange_code(code))
            .await
        {
            Ok(token) => token,
            Err(e) => return Err(self.fail(phase, e)),
        };
        let phase = phase.advance(FlowPhase::Exchanged)?;

        let identity = match self
            .bounded("userinfo", self.provider.fetch_profile(&token))
            .await
            .and_then(|profile| profile.into_identity(&token))
        {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(phase, e)),
        };

        let session = match self.sessions.create(SessionValues::signed_in(identity.clone())) {
            Ok(session) => session,
            Err(e) => return Err(self.fail(phase, e)),
        };
        phase.advance(FlowPhase::Resolved)?;

        tracing::info!(subject = %identity.subject(), "delegated login resolved");
        Ok(LoginOutcome {
            identity,
            session,
            redirect_target: pending.redirect_target,
        })
    }

    /// Number of logins waiting for their callback
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop pending logins past their TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.settings.state_ttl;
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, p| p.created_at.elapsed() < ttl);
        before - pending.len()
    }

    fn take_pending(&self, state: &str) -> Option<PendingLogin> {
        if state.is_empty() {
            return None;
        }
        let pending = self.pending.lock().remove(state)?;
        if pending.created_at.elapsed() >= self.settings.state_ttl {
            tracing::debug!("login state expired before callback");
            return None;
        }
        Some(pending)
    }

    async fn bounded<T, F>(&self, step: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.settings.upstream_timeout, call)
            .await
            .map_err(|_| AuthError::upstream(true, format!("{} timed out", step)))?
    }

    fn fail(&self, phase: FlowPhase, err: AuthError) -> AuthError {
        match phase.advance(FlowPhase::Failed) {
            Ok(_) => tracing::info!(from = ?phase, reason = %err, "delegated login failed"),
            Err(e) => tracing::error!(error = %e, "delegated login failed from unexpected phase"),
        }
        err
    }
}
