// Gateway middleware wrapping protected routes with an authentication strategy
// Decision: The strategy is fixed when the route group is built; the middleware holds no mutable state

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;

use crate::identity::Identity;
use crate::strategy::AuthStrategy;

/// Authentication guard for a group of routes
#[derive(Clone)]
pub struct Guard {
    strategy: Arc<dyn AuthStrategy>,
}

impl Guard {
    pub fn new<A: AuthStrategy + 'static>(strategy: A) -> Self {
        Self::from_arc(Arc::new(strategy))
    }

    pub fn from_arc(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self { strategy }
    }

    /// Require authentication on every route already added to `router`
    pub fn protect<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(self.clone(), require_auth))
    }
}

/// Authenticate, then either run the handler with the identity attached or reject
pub async fn require_auth(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    match guard.strategy.authenticate(&parts).await {
        Ok(identity) => {
            tracing::debug!(
                scheme = %identity.issued_by(),
                subject = %identity.subject(),
                "request authenticated"
            );
            parts.extensions.insert(identity);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => {
            err.log(guard.strategy.scheme().as_str());
            guard.strategy.reject(&err)
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| {
            tracing::error!("identity requested on a route without authentication");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, Result};
    use crate::identity::Scheme;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request as HttpRequest, routing::get};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct HeaderStrategy;

    #[async_trait]
    impl AuthStrategy for HeaderStrategy {
        fn scheme(&self) -> Scheme {
            Scheme::ApiKey
        }

        async fn authenticate(&self, parts: &Parts) -> Result<Identity> {
            match parts.headers.get("x-user").and_then(|v| v.to_str().ok()) {
                Some(user) => Ok(Identity::new(user, Scheme::ApiKey)),
                None => Err(AuthError::MissingCredential),
            }
        }
    }

    fn app(calls: Arc<AtomicUsize>) -> Router {
        let protected = Router::new().route(
            "/private",
            get(move |identity: Identity| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    identity.subject().to_string()
                }
            }),
        );
        Guard::new(HeaderStrategy).protect(protected).route(
            "/open",
            get(|identity: Identity| async move { identity.subject().to_string() }),
        )
    }

    #[tokio::test]
    async fn test_handler_runs_only_when_authenticated() {
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(calls.clone())
            .oneshot(HttpRequest::get("/private").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let response = app(calls.clone())
            .oneshot(
                HttpRequest::get("/private")
                    .header("x-user", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_identity_extractor_without_guard_is_internal_error() {
        let response = app(Arc::new(AtomicUsize::new(0)))
            .oneshot(
                HttpRequest::get("/open")
                    .header("x-user", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
