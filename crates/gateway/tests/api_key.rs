// API key protected data

mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn test_public_endpoint_needs_no_key() {
    let (app, _) = router(test_config());
    let response = send(&app, get("/public")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Welcome to the public API endpoint!"
    );
}

#[tokio::test]
async fn test_valid_key_grants_access() {
    let (app, _) = router(test_config());
    for key in ["12345", "abcdef"] {
        let response = send(&app, get_with("/data", "X-API-Key", key)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["message"],
            "You have access to protected data!"
        );
    }
}

#[tokio::test]
async fn test_missing_or_wrong_key_is_unauthorized() {
    let (app, _) = router(test_config());

    let response = send(&app, get("/data")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_string(response).await,
        "Unauthorized: missing or invalid API key"
    );

    for key in ["", "1234", "12345 ", "ABCDEF"] {
        let response = send(&app, get_with("/data", "x-api-key", key)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{:?}", key);
    }
}

#[tokio::test]
async fn test_deactivated_key_is_refused() {
    let (app, state) = router(test_config());
    state.api_keys.insert("12345", false);

    let response = send(&app, get_with("/data", "x-api-key", "12345")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = send(&app, get_with("/data", "x-api-key", "abcdef")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_key_set_hot_reload() {
    let (app, state) = router(test_config());
    state
        .api_keys
        .replace(vec![("rotated".to_string(), true)]);

    let response = send(&app, get_with("/data", "x-api-key", "12345")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = send(&app, get_with("/data", "x-api-key", "rotated")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_key_lookups() {
    let (app, _) = router(test_config());
    let requests = (0..64).map(|_| send(&app, get_with("/data", "x-api-key", "12345")));
    let responses = futures::future::join_all(requests).await;
    assert!(responses.iter().all(|r| r.status() == StatusCode::OK));
}
