// Public and protected resource handlers
// Decision: Plain text for browser pages, JSON for API resources

use axum::{extract::State, Json};
use axum_extra::extract::CookieJar;
use serde_json::{json, Value};

use authgate_core::{Identity, SESSION_COOKIE};

use crate::AppState;

/// GET / - shows who is signed in, if anyone
pub async fn home(State(state): State<AppState>, jar: CookieJar) -> String {
    let identity = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.load(cookie.value()))
        .and_then(|session| session.identity().cloned());

    match identity {
        Some(identity) => match (identity.display_name(), identity.email()) {
            (Some(name), Some(email)) => format!("Logged in as: {} ({})", name, email),
            _ => format!("Logged in as: {}", identity.subject()),
        },
        None => "Welcome! Log in at /login".to_string(),
    }
}

pub async fn about() -> &'static str {
    "Authgate: session, token, API key and delegated login in front of one application"
}

pub async fn public_data() -> Json<Value> {
    Json(json!({ "message": "Welcome to the public API endpoint!" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /dashboard (session)
pub async fn dashboard(identity: Identity) -> String {
    format!("Welcome to your dashboard, {}!", identity.subject())
}

/// GET /profile (session)
pub async fn profile(identity: Identity) -> Json<Identity> {
    Json(identity)
}

/// GET /api/dashboard (bearer)
pub async fn api_dashboard(identity: Identity) -> Json<Value> {
    Json(json!({
        "message": "Welcome to your dashboard!",
        "user": identity.subject(),
    }))
}

/// GET /data (API key)
pub async fn protected_data(_identity: Identity) -> Json<Value> {
    Json(json!({ "message": "You have access to protected data!" }))
}

/// GET /account (delegated login)
pub async fn account(identity: Identity) -> Json<Value> {
    Json(json!({
        "subject": identity.subject(),
        "name": identity.display_name(),
        "email": identity.email(),
        "expires_at": identity.expires_at(),
    }))
}
