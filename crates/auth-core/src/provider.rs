// Third-party identity provider (OAuth2 authorization code grant)
// Decision: Manual OAuth2 over reqwest; the flow controller only sees the IdentityProvider trait
// Decision: Transport errors, 5xx and 429 are retryable; any other bad answer is fatal

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::OAuthConfig;
use crate::error::{AuthError, Result};
use crate::identity::{Identity, Scheme};

/// Access token returned by the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Profile returned by the userinfo endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProviderProfile {
    /// Map to an identity. Subject preference: `sub`, then `id`, then `email`.
    /// The identity expires together with the access token when the provider says so.
    pub fn into_identity(self, token: &AccessToken) -> Result<Identity> {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();

        let subject = non_empty(&self.sub)
            .or_else(|| non_empty(&self.id))
            .or_else(|| non_empty(&self.email))
            .ok_or_else(|| AuthError::upstream(false, "profile carries no subject"))?;

        let mut identity = Identity::new(subject, Scheme::DelegatedLogin);
        if let Some(name) = non_empty(&self.name) {
            identity = identity.with_display_name(name);
        }
        if let Some(email) = non_empty(&self.email) {
            identity = identity.with_email(email);
        }
        if let Some(secs) = token.expires_in.filter(|s| *s > 0) {
            identity = identity.with_expiry(Utc::now() + Duration::seconds(secs));
        }
        Ok(identity)
    }
}

/// Authorization server used by the delegated login flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent page URL carrying the given state nonce
    fn authorization_url(&self, state: &str) -> Url;

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> Result<AccessToken>;

    /// Fetch the user's profile with an access token
    async fn fetch_profile(&self, token: &AccessToken) -> Result<ProviderProfile>;
}

/// OAuth2 provider speaking the standard token and userinfo endpoints
pub struct OAuthProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    scope: String,
}

impl OAuthProvider {
    pub fn new(config: &OAuthConfig, timeout: std::time::Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            auth_url: Url::parse(&config.auth_url).context("Invalid authorization URL")?,
            token_url: Url::parse(&config.token_url).context("Invalid token URL")?,
            userinfo_url: Url::parse(&config.userinfo_url).context("Invalid userinfo URL")?,
            scope: config.scopes.join(" "),
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scope)
            .append_pair("state", state)
            .append_pair("access_type", "offline");
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken> {
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| transport_error("token exchange", e))?;

        let token: AccessToken = read_json("token exchange", response).await?;
        if token.access_token.is_empty() {
            return Err(AuthError::upstream(false, "token exchange: empty access_token"));
        }
        Ok(token)
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<ProviderProfile> {
        let response = self
            .client
            .get(self.userinfo_url.clone())
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| transport_error("userinfo", e))?;

        read_json("userinfo", response).await
    }
}

fn transport_error(step: &str, err: reqwest::Error) -> AuthError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    AuthError::upstream(true, format!("{}: {}: {}", step, kind, err))
}

fn status_is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

async fn read_json<T: DeserializeOwned>(step: &str, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::upstream(
            status_is_retryable(status),
            format!("{}: provider answered {}", step, status),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(step, e))?;
    serde_json::from_slice(&body)
        .map_err(|e| AuthError::upstream(false, format!("{}: unreadable response: {}", step, e)))
}
