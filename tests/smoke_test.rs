use std::sync::Arc;

use auth_backend::models::UserStatus;
use auth_backend::store::UserPatch;
use auth_backend::test_util::{test_identity, test_state, StubProvider};
use auth_backend::{routes, AppState};
use axum::Router;
use bytes::Bytes;
use http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(provider: Arc<StubProvider>) -> (Router, Arc<AppState>) {
    let state = test_state(provider);
    (routes::router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: http::Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = http::Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let request = if let Some(body) = body {
        builder
            .header("Content-Type", "application/json")
            .body(axum::body::Body::from(Bytes::from(body.to_string())))
            .unwrap()
    } else {
        builder.body(axum::body::Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login_google(app: &Router) -> (StatusCode, Value) {
    send(
        app,
        http::Method::POST,
        "/auth/google",
        None,
        Some(json!({ "firebaseToken": "stub-assertion" })),
    )
    .await
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _state) = app_with(Arc::new(StubProvider::new()));
    let (status, body) = send(&app, http::Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_end_to_end_login_profile_logout() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, state) = app_with(provider.clone());

    // login creates the user and returns a session token
    let (status, body) = login_google(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@b.com");
    assert_eq!(body["user"]["provider"], "google");
    assert_eq!(body["user"]["status"], "ACTIVE");
    let token = body["accessToken"].as_str().unwrap().to_string();
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    // profile fetch with that token returns the same user
    let (status, body) = send(
        &app,
        http::Method::GET,
        "/auth/profile",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["firebaseUid"], "abc");

    // logout succeeds and does not delete the user row
    let (status, body) = send(
        &app,
        http::Method::POST,
        "/auth/logout",
        Some(&token),
        Some(json!({ "firebaseUid": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
    assert_eq!(provider.revoked_uids(), vec!["abc".to_string()]);
    assert_eq!(state.store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_wrong_provider_is_unauthorized_and_creates_nothing() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, state) = app_with(provider);

    let (status, _body) = send(
        &app,
        http::Method::POST,
        "/auth/facebook",
        None,
        Some(json!({ "firebaseToken": "stub-assertion" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_facebook_login_with_facebook_token() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "fb-1",
        "f@b.com",
        "facebook.com",
    )));
    let (app, _state) = app_with(provider);

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/auth/facebook",
        None,
        Some(json!({ "firebaseToken": "stub-assertion" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["provider"], "facebook");
}

#[tokio::test]
async fn test_repeat_login_is_an_update_not_a_create() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, state) = app_with(provider);

    let (_, first) = login_google(&app).await;
    std::thread::sleep(std::time::Duration::from_millis(5));
    let (_, second) = login_google(&app).await;

    assert_eq!(state.store.count().unwrap(), 1);
    assert_eq!(first["user"]["id"], second["user"]["id"]);
    assert!(
        second["user"]["updatedAt"].as_str().unwrap()
            > first["user"]["updatedAt"].as_str().unwrap()
    );
}

#[tokio::test]
async fn test_provider_outage_is_unauthorized_at_the_boundary() {
    let provider = Arc::new(StubProvider::new());
    provider.set_unavailable();
    let (app, _state) = app_with(provider);

    let (status, _body) = login_google(&app).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_reject_missing_credential() {
    let (app, _state) = app_with(Arc::new(StubProvider::new()));

    for uri in ["/auth/profile", "/auth/verify", "/users/me"] {
        let (status, body) = send(&app, http::Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["message"], "not logged in");
    }
}

#[tokio::test]
async fn test_malformed_credential_is_rejected_generically() {
    let (app, _state) = app_with(Arc::new(StubProvider::new()));

    let (status, body) = send(
        &app,
        http::Method::GET,
        "/users/me",
        Some("garbage-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // expiry vs malformed vs inactive is not distinguishable by the caller
    assert_eq!(body["message"], "invalid or expired session");
}

#[tokio::test]
async fn test_inactive_user_is_rejected_with_valid_token() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, state) = app_with(provider);

    let (_, body) = login_google(&app).await;
    let token = body["accessToken"].as_str().unwrap().to_string();
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    state
        .store
        .update(
            &user_id,
            UserPatch {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
        )
        .unwrap();

    let (status, body) = send(
        &app,
        http::Method::GET,
        "/auth/profile",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid or expired session");
}

#[tokio::test]
async fn test_revocation_failure_is_a_server_error() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    provider.fail_revocation();
    let (app, _state) = app_with(provider);

    let (_, body) = login_google(&app).await;
    let token = body["accessToken"].as_str().unwrap().to_string();

    let (status, _body) = send(
        &app,
        http::Method::POST,
        "/auth/logout",
        Some(&token),
        Some(json!({ "firebaseUid": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_update_and_delete_own_account() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, state) = app_with(provider);

    let (_, body) = login_google(&app).await;
    let token = body["accessToken"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        http::Method::PUT,
        "/users/me",
        Some(&token),
        Some(json!({ "name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    // fields absent from the patch keep their values
    assert_eq!(body["email"], "a@b.com");

    let (status, body) = send(
        &app,
        http::Method::DELETE,
        "/users/me",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deleted successfully");
    assert_eq!(state.store.count().unwrap(), 0);

    // the credential dies with the account
    let (status, _body) = send(&app, http::Method::GET, "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_user_by_id_and_missing_user() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, _state) = app_with(provider);

    let (_, body) = login_google(&app).await;
    let token = body["accessToken"].as_str().unwrap().to_string();
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        http::Method::GET,
        &format!("/users/{user_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firebaseUid"], "abc");

    let (status, _body) = send(
        &app,
        http::Method::GET,
        "/users/does-not-exist",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rpc_health_is_public() {
    let (app, _state) = app_with(Arc::new(StubProvider::new()));

    let (status, body) = send(&app, http::Method::POST, "/trpc/auth.health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_rpc_login_and_protected_procedures() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, _state) = app_with(provider);

    // anonymous protected call
    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.getProfile",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // login through the RPC surface
    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.loginGoogle",
        None,
        Some(json!({ "firebaseToken": "stub-assertion" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();
    let user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.getProfile",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], user_id.as_str());

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.verifyToken",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);

    // custom tokens only for yourself
    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.generateCustomToken",
        Some(&token),
        Some(json!({ "userId": user_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["customToken"], "custom-token-for-abc");

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.generateCustomToken",
        Some(&token),
        Some(json!({ "userId": "someone-else" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_rpc_logout_and_unknown_procedure() {
    let provider = Arc::new(StubProvider::with_identity(test_identity(
        "abc",
        "a@b.com",
        "google.com",
    )));
    let (app, _state) = app_with(provider.clone());

    let (_, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.loginGoogle",
        None,
        Some(json!({ "firebaseToken": "stub-assertion" })),
    )
    .await;
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.logout",
        Some(&token),
        Some(json!({ "firebaseUid": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Logged out successfully");
    assert_eq!(provider.revoked_uids(), vec!["abc".to_string()]);

    let (status, body) = send(&app, http::Method::POST, "/trpc/auth.nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_rpc_bad_input_is_bad_request() {
    let (app, _state) = app_with(Arc::new(StubProvider::new()));

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/trpc/auth.loginGoogle",
        None,
        Some(json!({ "wrongField": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}
