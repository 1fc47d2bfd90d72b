// Error taxonomy shared by every authentication strategy
// Decision: Variants carry the internal reason for logs; responses only ever use public_message()

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors produced while resolving a credential into an identity
#[derive(Debug, Error)]
pub enum AuthError {
    /// No header, cookie or token was presented
    #[error("no credential presented")]
    MissingCredential,

    /// A credential was presented but could not be decoded
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// Decodable credential failed signature or lookup checks
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Credential was valid once but its lifetime is over
    #[error("credential expired")]
    Expired,

    /// Delegated-login state nonce does not match a live flow
    #[error("login state does not match a pending flow")]
    CsrfMismatch,

    /// Identity provider could not be reached or answered badly
    #[error("identity provider failure: {detail}")]
    UpstreamFailure { retryable: bool, detail: String },

    /// Signing or storage fault on our side
    #[error("internal failure: {0}")]
    InternalFailure(String),
}

impl AuthError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        AuthError::MalformedCredential(detail.into())
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        AuthError::InvalidCredential(detail.into())
    }

    pub fn upstream(retryable: bool, detail: impl Into<String>) -> Self {
        AuthError::UpstreamFailure {
            retryable,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        AuthError::InternalFailure(detail.into())
    }

    /// Errors that surface to the caller as a plain "unauthorized"
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredential
                | AuthError::MalformedCredential(_)
                | AuthError::InvalidCredential(_)
                | AuthError::Expired
                | AuthError::CsrfMismatch
        )
    }

    /// Whether the end user may simply try again (re-initiate login)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::UpstreamFailure {
                retryable: true,
                ..
            }
        )
    }

    /// Upstream failures are always a 500; retryability only changes the body text
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::UpstreamFailure { .. } | AuthError::InternalFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Body text safe to send to the client
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::UpstreamFailure {
                retryable: true, ..
            } => "Login failed, please try again",
            AuthError::UpstreamFailure { .. } => "Login failed",
            AuthError::InternalFailure(_) => "Internal server error",
            _ => "Unauthorized",
        }
    }

    /// Log at a level matching the severity; unauthorized outcomes are routine.
    pub fn log(&self, scheme: &str) {
        match self {
            AuthError::InternalFailure(_) => {
                tracing::error!(scheme, error = %self, "authentication internal failure")
            }
            AuthError::UpstreamFailure { retryable, .. } => {
                tracing::error!(scheme, retryable, error = %self, "identity provider failure")
            }
            _ => tracing::debug!(scheme, reason = %self, "credential rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_kinds_share_status_and_message() {
        let errors = [
            AuthError::MissingCredential,
            AuthError::malformed("bad base64"),
            AuthError::invalid("signature mismatch"),
            AuthError::Expired,
            AuthError::CsrfMismatch,
        ];
        for err in errors {
            assert!(err.is_unauthorized());
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(err.public_message(), "Unauthorized");
        }
    }

    #[test]
    fn test_upstream_failure_status() {
        let transient = AuthError::upstream(true, "connection reset");
        assert!(transient.is_retryable());
        assert_eq!(transient.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transient.public_message(), "Login failed, please try again");

        let fatal = AuthError::upstream(false, "missing access_token");
        assert!(!fatal.is_retryable());
        assert_eq!(fatal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fatal.public_message(), "Login failed");
        assert!(!fatal.public_message().contains("access_token"));
    }

    #[test]
    fn test_internal_failure_hides_detail() {
        let err = AuthError::internal("signing key unavailable");
        assert!(!err.is_unauthorized());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("signing key unavailable"));
    }
}
