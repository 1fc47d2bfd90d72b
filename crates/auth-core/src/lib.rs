// Authgate authentication core
// Decision: Every credential scheme implements one AuthStrategy contract
// Decision: Components are constructed explicitly from GatewayConfig, no ambient globals

pub mod api_key;
pub mod config;
pub mod crypto;
pub mod error;
pub mod flow;
pub mod identity;
pub mod middleware;
pub mod provider;
pub mod session;
pub mod strategy;
pub mod telemetry;
pub mod token;
pub mod verifier;

pub use api_key::ApiKeySet;
pub use config::GatewayConfig;
pub use error::{AuthError, Result};
pub use flow::{AuthorizationUrl, FlowPhase, FlowSettings, LoginFlow, LoginOutcome};
pub use identity::{Identity, Scheme};
pub use middleware::Guard;
pub use provider::{AccessToken, IdentityProvider, OAuthProvider, ProviderProfile};
pub use session::{Session, SessionStore, SessionValues, SESSION_COOKIE};
pub use strategy::{
    ApiKeyStrategy, AuthStrategy, BearerTokenStrategy, DelegatedSessionStrategy,
    SessionCookieStrategy,
};
pub use token::{Claims, TokenCodec};
pub use verifier::{CredentialVerifier, PasswordCredentials, StaticPairVerifier, Subject};
