// Login, logout, token and delegated-login callback handlers
// Decision: A successful login always starts a fresh session; any session the caller already had is revoked
// Decision: Failure bodies are fixed strings; the reason is only logged

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use authgate_core::{
    strategy::redirect_found, AuthError, CredentialVerifier, Identity, PasswordCredentials, Scheme,
    SessionValues, SESSION_COOKIE,
};

use crate::AppState;

/// Username/password from either a form post or a JSON body
pub struct LoginCredentials(pub PasswordCredentials);

#[axum::async_trait]
impl<S> FromRequest<S> for LoginCredentials
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let parsed = if is_json {
            Json::<PasswordCredentials>::from_request(req, state)
                .await
                .map(|Json(c)| c)
                .map_err(|e| e.body_text())
        } else {
            Form::<PasswordCredentials>::from_request(req, state)
                .await
                .map(|Form(c)| c)
                .map_err(|e| e.body_text())
        };

        parsed.map(LoginCredentials).map_err(|reason| {
            tracing::debug!(%reason, "unreadable login body");
            (StatusCode::UNAUTHORIZED, "Invalid login").into_response()
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Local path to land on after a delegated login
    pub next: Option<String>,
}

/// GET /login - start delegated login when configured, otherwise describe the form login
pub async fn login_start(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let Some(flow) = state.login_flow.as_ref() else {
        return (
            StatusCode::OK,
            "POST username and password to /login to sign in",
        )
            .into_response();
    };

    match flow.start(query.next.as_deref()) {
        Ok(auth) => Redirect::temporary(auth.url.as_str()).into_response(),
        Err(e) => {
            e.log(Scheme::DelegatedLogin.as_str());
            (e.status(), e.public_message()).into_response()
        }
    }
}

/// POST /login - check credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    LoginCredentials(creds): LoginCredentials,
) -> Response {
    let subject = match state.passwords.verify(&creds) {
        Ok(subject) => subject,
        Err(e) => {
            e.log(Scheme::SessionCookie.as_str());
            return (StatusCode::UNAUTHORIZED, "Invalid login").into_response();
        }
    };

    revoke_current_session(&state, &jar);

    let identity = Identity::new(subject, Scheme::SessionCookie);
    let cookie = state
        .sessions
        .create(SessionValues::signed_in(identity))
        .and_then(|mut session| state.sessions.save(&mut session));

    match cookie {
        Ok(cookie) => {
            tracing::info!(username = %creds.username, "user logged in");
            (jar.add(cookie), redirect_found("/dashboard")).into_response()
        }
        Err(e) => {
            e.log(Scheme::SessionCookie.as_str());
            (e.status(), e.public_message()).into_response()
        }
    }
}

/// GET|POST /logout - revoke the session and clear the cookie
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let cookie = match jar
        .get(SESSION_COOKIE)
        .and_then(|c| state.sessions.load(c.value()))
    {
        Some(session) => {
            tracing::info!(session_id = %session.id(), "user logged out");
            state.sessions.invalidate(session)
        }
        None => state.sessions.expired_cookie(),
    };

    (jar.add(cookie), redirect_found("/")).into_response()
}

/// Token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// POST /token - exchange JSON credentials for a bearer token
pub async fn issue_token(
    State(state): State<AppState>,
    payload: Result<Json<PasswordCredentials>, JsonRejection>,
) -> Response {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();

    let Json(creds) = match payload {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(reason = %e.body_text(), "unreadable token request");
            return invalid();
        }
    };

    let subject = match state.passwords.verify(&creds) {
        Ok(subject) => subject,
        Err(e) => {
            e.log(Scheme::BearerToken.as_str());
            return invalid();
        }
    };

    match state.tokens.issue_default(&subject) {
        Ok(token) => {
            tracing::info!(%subject, "bearer token issued");
            Json(TokenResponse {
                token,
                token_type: "Bearer",
                expires_in: state.tokens.default_ttl().as_secs(),
            })
            .into_response()
        }
        Err(e) => {
            e.log(Scheme::BearerToken.as_str());
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not generate token").into_response()
        }
    }
}

/// Query parameters of the provider's redirect back to us
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied consent
    pub error: Option<String>,
}

/// GET /auth/callback - finish delegated login
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(flow) = state.login_flow.clone() else {
        return (StatusCode::NOT_FOUND, "Delegated login is not configured").into_response();
    };

    if let Some(error) = query.error.as_deref() {
        tracing::info!(%error, "identity provider returned an error");
    }
    let code = match query.error {
        Some(_) => "",
        None => query.code.as_deref().unwrap_or_default(),
    };

    match flow
        .handle_callback(code, query.state.as_deref().unwrap_or_default())
        .await
    {
        Ok(mut outcome) => {
            revoke_current_session(&state, &jar);
            match state.sessions.save(&mut outcome.session) {
                Ok(cookie) => {
                    (jar.add(cookie), Redirect::to(&outcome.redirect_target)).into_response()
                }
                Err(e) => {
                    e.log(Scheme::DelegatedLogin.as_str());
                    (e.status(), e.public_message()).into_response()
                }
            }
        }
        Err(AuthError::MissingCredential) => {
            (StatusCode::BAD_REQUEST, "Missing code").into_response()
        }
        Err(e) => {
            e.log(Scheme::DelegatedLogin.as_str());
            (e.status(), e.public_message()).into_response()
        }
    }
}

fn revoke_current_session(state: &AppState, jar: &CookieJar) {
    if let Some(session) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| state.sessions.load(c.value()))
    {
        let _ = state.sessions.invalidate(session);
    }
}
