// Shared helpers for gateway integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

use authgate_core::config::{
    AdminConfig, DelegatedLoginConfig, OAuthConfig, SessionConfig, TokenConfig,
};
use authgate_core::{
    AccessToken, AuthError, FlowSettings, GatewayConfig, IdentityProvider, ProviderProfile, Result,
};
use authgate_gateway::{app, AppState};

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        session: SessionConfig {
            secret: b"integration-session-secret".to_vec(),
            max_age: Duration::from_secs(3600),
            cookie_secure: true,
        },
        token: TokenConfig {
            secret: "integration-jwt-secret".to_string(),
            ttl: Duration::from_secs(900),
        },
        admin: AdminConfig {
            username: "admin".to_string(),
            password: "1234".to_string(),
        },
        api_keys: vec!["12345".to_string(), "abcdef".to_string()],
        delegated: None,
    }
}

pub fn delegated_config(upstream_timeout: Duration) -> GatewayConfig {
    GatewayConfig {
        delegated: Some(DelegatedLoginConfig {
            oauth: OAuthConfig::google(
                "client-id",
                "client-secret",
                "http://localhost/auth/callback",
            ),
            flow: FlowSettings {
                state_ttl: Duration::from_secs(300),
                upstream_timeout,
                ..FlowSettings::default()
            },
        }),
        ..test_config()
    }
}

pub fn router(config: GatewayConfig) -> (Router, AppState) {
    let state = AppState::from_config(config).unwrap();
    (app(state.clone()), state)
}

pub fn delegated_router(provider: Arc<FakeProvider>) -> Router {
    let state = AppState::with_identity_provider(
        delegated_config(Duration::from_millis(200)),
        provider,
    )
    .unwrap();
    app(state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn get_with(uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::get(uri)
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// Full `Set-Cookie` header of the session cookie, if any
pub fn set_session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .map(String::from)
}

/// `name=value` part of a `Set-Cookie` header, ready for a `Cookie` request header
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

/// Log in through the form and return the `session=...` pair
pub async fn login(app: &Router) -> String {
    let response = send(app, post_form("/login", "username=admin&password=1234")).await;
    cookie_pair(&set_session_cookie(&response).unwrap())
}

pub fn state_param(location: &str) -> String {
    Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[derive(Clone, Copy)]
pub enum ProviderMode {
    Ok,
    Transient,
    Malformed,
    Hang,
}

/// Identity provider double counting code exchanges
pub struct FakeProvider {
    mode: ProviderMode,
    exchanges: AtomicUsize,
}

impl FakeProvider {
    pub fn new(mode: ProviderMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            exchanges: AtomicUsize::new(0),
        })
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> Url {
        let mut url = Url::parse("https://accounts.example.com/o/oauth2/auth").unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", "client-id")
            .append_pair("response_type", "code")
            .append_pair("state", state);
        url
    }

    async fn exchange_code(&self, _code: &str) -> Result<AccessToken> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ProviderMode::Ok => Ok(AccessToken {
                access_token: "access-token".to_string(),
                token_type: Some("Bearer".to_string()),
                expires_in: Some(3600),
            }),
            ProviderMode::Transient => Err(AuthError::upstream(true, "connection reset by peer")),
            ProviderMode::Malformed => {
                Err(AuthError::upstream(false, "token exchange: unreadable response"))
            }
            ProviderMode::Hang => std::future::pending().await,
        }
    }

    async fn fetch_profile(&self, _token: &AccessToken) -> Result<ProviderProfile> {
        Ok(ProviderProfile {
            id: Some("108".to_string()),
            email: Some("jane@example.com".to_string()),
            name: Some("Jane Doe".to_string()),
            ..Default::default()
        })
    }
}
