// Authgate HTTP application
// Decision: Every component is built once from GatewayConfig and shared through AppState
// Decision: Each scheme's routes form their own group so one guard wraps exactly one group

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use authgate_core::{
    ApiKeySet, ApiKeyStrategy, BearerTokenStrategy, CredentialVerifier, DelegatedSessionStrategy,
    GatewayConfig, Guard, IdentityProvider, LoginFlow, OAuthProvider, PasswordCredentials,
    SessionCookieStrategy, SessionStore, StaticPairVerifier, TokenCodec,
};

pub mod pages;
pub mod routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub sessions: Arc<SessionStore>,
    pub tokens: Arc<TokenCodec>,
    pub api_keys: Arc<ApiKeySet>,
    pub passwords: Arc<dyn CredentialVerifier<Credential = PasswordCredentials>>,
    /// Present only when delegated login is configured
    pub login_flow: Option<Arc<LoginFlow>>,
}

impl AppState {
    pub fn from_config(config: GatewayConfig) -> anyhow::Result<Self> {
        let provider: Option<Arc<dyn IdentityProvider>> = match &config.delegated {
            Some(delegated) => Some(Arc::new(
                OAuthProvider::new(&delegated.oauth, delegated.flow.upstream_timeout)
                    .context("Failed to create identity provider")?,
            )),
            None => None,
        };
        Self::build(config, provider)
    }

    /// Build state with an explicit identity provider (delegated login is enabled with it)
    pub fn with_identity_provider(
        config: GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> anyhow::Result<Self> {
        Self::build(config, Some(provider))
    }

    fn build(
        config: GatewayConfig,
        provider: Option<Arc<dyn IdentityProvider>>,
    ) -> anyhow::Result<Self> {
        let sessions =
            Arc::new(SessionStore::new(&config.session).context("Failed to create session store")?);
        let tokens =
            Arc::new(TokenCodec::new(&config.token).context("Failed to create token codec")?);
        let api_keys = Arc::new(ApiKeySet::new(&config.api_keys));
        let passwords = Arc::new(
            StaticPairVerifier::new(&config.admin.username, &config.admin.password)
                .context("Failed to create password verifier")?,
        );

        let login_flow = provider.map(|provider| {
            let settings = config
                .delegated
                .as_ref()
                .map(|d| d.flow.clone())
                .unwrap_or_default();
            Arc::new(LoginFlow::new(provider, sessions.clone(), settings))
        });

        tracing::info!(
            api_keys = api_keys.len(),
            delegated_login = login_flow.is_some(),
            "gateway state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            sessions,
            tokens,
            api_keys,
            passwords,
            login_flow,
        })
    }
}

/// Build the full router
pub fn app(state: AppState) -> Router {
    let session_guard = Guard::new(SessionCookieStrategy::new(state.sessions.clone()));
    let bearer_guard = Guard::new(BearerTokenStrategy::new(state.tokens.clone()));
    let api_key_guard = Guard::new(ApiKeyStrategy::new(state.api_keys.clone()));
    let delegated_guard = Guard::new(DelegatedSessionStrategy::new(state.sessions.clone()));

    let public = Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/public", get(pages::public_data))
        .route("/health", get(pages::health))
        .route("/login", get(routes::login_start).post(routes::login))
        .route("/logout", get(routes::logout).post(routes::logout))
        .route("/token", post(routes::issue_token))
        .route("/auth/callback", get(routes::oauth_callback));

    let session_routes = session_guard.protect(
        Router::new()
            .route("/dashboard", get(pages::dashboard))
            .route("/profile", get(pages::profile)),
    );
    let bearer_routes =
        bearer_guard.protect(Router::new().route("/api/dashboard", get(pages::api_dashboard)));
    let api_key_routes =
        api_key_guard.protect(Router::new().route("/data", get(pages::protected_data)));
    let delegated_routes =
        delegated_guard.protect(Router::new().route("/account", get(pages::account)));

    public
        .merge(session_routes)
        .merge(bearer_routes)
        .merge(api_key_routes)
        .merge(delegated_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
