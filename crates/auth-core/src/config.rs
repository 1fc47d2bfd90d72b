// Gateway configuration loaded from environment variables
// Decision: AUTHGATE_ prefix for gateway settings, GOOGLE_* names for the delegated-login client
// Decision: Missing secrets fall back to random per-process values (sessions and tokens die on restart)

use std::fmt;
use std::time::Duration;

use crate::crypto::generate_secret;
use crate::flow::FlowSettings;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_API_KEYS: &str = "12345,abcdef";

/// Session cookie configuration
#[derive(Clone)]
pub struct SessionConfig {
    /// HMAC key for signing session payloads
    pub secret: Vec<u8>,
    /// Session lifetime
    pub max_age: Duration,
    /// Whether the cookie carries the Secure attribute
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: generate_secret().into_bytes(),
            max_age: Duration::from_secs(24 * 60 * 60), // 1 day
            cookie_secure: true,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("max_age", &self.max_age)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Bearer token configuration
#[derive(Clone)]
pub struct TokenConfig {
    /// Secret key for signing JWTs
    pub secret: String,
    /// Default token lifetime
    pub ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: generate_secret(),
            ttl: Duration::from_secs(15 * 60), // 15 minutes
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// The fixed username/password pair accepted by password login
#[derive(Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "1234".to_string(),
        }
    }
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// OAuth2 client configuration for the third-party identity provider
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Google endpoints and profile scopes
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
        }
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Delegated login configuration
#[derive(Debug, Clone)]
pub struct DelegatedLoginConfig {
    pub oauth: OAuthConfig,
    pub flow: FlowSettings,
}

/// Complete gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Listen address
    pub bind_addr: String,
    pub session: SessionConfig,
    pub token: TokenConfig,
    pub admin: AdminConfig,
    /// Active API keys
    pub api_keys: Vec<String>,
    /// Delegated login; disabled when no client credentials are configured
    pub delegated: Option<DelegatedLoginConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session: SessionConfig::default(),
            token: TokenConfig::default(),
            admin: AdminConfig::default(),
            api_keys: split_keys(DEFAULT_API_KEYS),
            delegated: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("session", &self.session)
            .field("token", &self.token)
            .field("admin", &self.admin)
            .field("api_keys", &format_args!("{} key(s)", self.api_keys.len()))
            .field("delegated", &self.delegated)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str| {
            var(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };
        let defaults = Self::default();

        let bind_addr = var("AUTHGATE_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let session_secret = var("AUTHGATE_SESSION_SECRET").unwrap_or_else(|| {
            tracing::warn!("AUTHGATE_SESSION_SECRET not set, sessions will not survive a restart");
            generate_secret()
        });
        let session = SessionConfig {
            secret: session_secret.into_bytes(),
            max_age: secs("AUTHGATE_SESSION_MAX_AGE").unwrap_or(defaults.session.max_age),
            cookie_secure: var("AUTHGATE_COOKIE_SECURE")
                .map(|s| parse_bool(&s))
                .unwrap_or(defaults.session.cookie_secure),
        };

        let token_secret = var("AUTHGATE_JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("AUTHGATE_JWT_SECRET not set, tokens will not survive a restart");
            generate_secret()
        });
        let token = TokenConfig {
            secret: token_secret,
            ttl: secs("AUTHGATE_TOKEN_TTL").unwrap_or(defaults.token.ttl),
        };

        let admin = match (
            var("AUTHGATE_ADMIN_USERNAME"),
            var("AUTHGATE_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => AdminConfig { username, password },
            _ => {
                tracing::warn!("AUTHGATE_ADMIN_USERNAME/PASSWORD not set, using insecure default");
                defaults.admin
            }
        };

        let api_keys = var("AUTHGATE_API_KEYS")
            .map(|csv| split_keys(&csv))
            .unwrap_or(defaults.api_keys);

        let delegated = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => {
                let redirect_uri = var("GOOGLE_REDIRECT_URL")
                    .unwrap_or_else(|| "http://localhost:8080/auth/callback".to_string());
                let flow_defaults = FlowSettings::default();
                Some(DelegatedLoginConfig {
                    oauth: OAuthConfig::google(client_id, client_secret, redirect_uri),
                    flow: FlowSettings {
                        state_ttl: secs("AUTHGATE_LOGIN_STATE_TTL")
                            .unwrap_or(flow_defaults.state_ttl),
                        upstream_timeout: secs("AUTHGATE_UPSTREAM_TIMEOUT")
                            .unwrap_or(flow_defaults.upstream_timeout),
                        max_pending: var("AUTHGATE_LOGIN_MAX_PENDING")
                            .and_then(|s| s.trim().parse::<usize>().ok())
                            .filter(|n| *n > 0)
                            .unwrap_or(flow_defaults.max_pending),
                    },
                })
            }
            _ => None,
        };

        Self {
            bind_addr,
            session,
            token,
            admin,
            api_keys,
            delegated,
        }
    }

    /// Check if delegated login is available
    pub fn delegated_login_enabled(&self) -> bool {
        self.delegated.is_some()
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn split_keys(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[]));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.admin.password, "1234");
        assert_eq!(config.api_keys, vec!["12345", "abcdef"]);
        assert_eq!(config.token.ttl, Duration::from_secs(900));
        assert_eq!(config.session.max_age, Duration::from_secs(86400));
        assert!(config.session.cookie_secure);
        assert!(!config.session.secret.is_empty());
        assert!(!config.delegated_login_enabled());
    }

    #[test]
    fn test_random_secrets_differ_per_load() {
        let a = GatewayConfig::from_lookup(lookup(&[]));
        let b = GatewayConfig::from_lookup(lookup(&[]));
        assert_ne!(a.session.secret, b.session.secret);
        assert_ne!(a.token.secret, b.token.secret);
    }

    #[test]
    fn test_explicit_values() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("AUTHGATE_BIND_ADDR", "127.0.0.1:9999"),
            ("AUTHGATE_SESSION_SECRET", "session-secret"),
            ("AUTHGATE_SESSION_MAX_AGE", "60"),
            ("AUTHGATE_COOKIE_SECURE", "false"),
            ("AUTHGATE_JWT_SECRET", "jwt-secret"),
            ("AUTHGATE_TOKEN_TTL", "120"),
            ("AUTHGATE_ADMIN_USERNAME", "root"),
            ("AUTHGATE_ADMIN_PASSWORD", "hunter2"),
            ("AUTHGATE_API_KEYS", "key123, key456 ,,"),
        ]));

        assert_eq!(config.bind_addr, "127.0.0.1:9999");
        assert_eq!(config.session.secret, b"session-secret".to_vec());
        assert_eq!(config.session.max_age, Duration::from_secs(60));
        assert!(!config.session.cookie_secure);
        assert_eq!(config.token.secret, "jwt-secret");
        assert_eq!(config.token.ttl, Duration::from_secs(120));
        assert_eq!(config.admin.username, "root");
        assert_eq!(config.api_keys, vec!["key123", "key456"]);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("AUTHGATE_TOKEN_TTL", "soon"),
            ("AUTHGATE_SESSION_MAX_AGE", "-5"),
        ]));
        assert_eq!(config.token.ttl, Duration::from_secs(900));
        assert_eq!(config.session.max_age, Duration::from_secs(86400));
    }

    #[test]
    fn test_delegated_login_requires_both_credentials() {
        let only_id = GatewayConfig::from_lookup(lookup(&[("GOOGLE_CLIENT_ID", "id")]));
        assert!(only_id.delegated.is_none());

        let config = GatewayConfig::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REDIRECT_URL", "https://app.example.com/auth/callback"),
            ("AUTHGATE_LOGIN_STATE_TTL", "60"),
            ("AUTHGATE_LOGIN_MAX_PENDING", "50"),
        ]));
        let delegated = config.delegated.unwrap();
        assert_eq!(delegated.oauth.client_id, "id");
        assert_eq!(
            delegated.oauth.redirect_uri,
            "https://app.example.com/auth/callback"
        );
        assert_eq!(delegated.oauth.scopes.len(), 2);
        assert_eq!(delegated.flow.state_ttl, Duration::from_secs(60));
        assert_eq!(delegated.flow.upstream_timeout, Duration::from_secs(10));
        assert_eq!(delegated.flow.max_pending, 50);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("AUTHGATE_JWT_SECRET", "jwt-secret-value"),
            ("AUTHGATE_ADMIN_USERNAME", "root"),
            ("AUTHGATE_ADMIN_PASSWORD", "hunter2"),
            ("AUTHGATE_API_KEYS", "secret-api-key"),
        ]));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("jwt-secret-value"));
        assert!(!debug.contains("secret-api-key"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("root"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }
}
