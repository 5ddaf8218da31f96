//! Test utilities and common setup.

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use huddle::api::{self, AppState};
use huddle::config::AppConfig;
use huddle::db::Database;
use once_cell::sync::Lazy;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::Value;
use tower::ServiceExt;

static KEYS: Lazy<Vec<RsaPrivateKey>> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    (0..3)
        .map(|_| RsaPrivateKey::new(&mut rng, 1024).expect("generate test key"))
        .collect()
});

/// SPKI PEM of test key number `idx`.
pub fn public_pem(idx: usize) -> String {
    RsaPublicKey::from(&KEYS[idx % KEYS.len()])
        .to_public_key_pem(LineEnding::LF)
        .expect("encode test key")
}

/// Create a test application over an in-memory database.
pub async fn test_app() -> (Router, AppState) {
    let db = Database::in_memory().await.expect("in-memory database");
    let mut config = AppConfig::default();
    config.auth.bcrypt_cost = 4;

    let state = AppState::new(&db, &config);
    let app = api::create_router(state.clone(), &[], None);
    (app, state)
}

/// Response pieces the tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    /// `name=value` of the session cookie set by this response.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }
}

/// Send one request through the router.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        json,
    }
}

/// Register `login` with test key `key_idx`, log in, and return the cookie
/// plus the user id.
pub async fn register_and_login(app: &Router, login: &str, key_idx: usize) -> (String, String) {
    let registered = send(
        app,
        Method::PUT,
        "/user/register",
        None,
        Some(serde_json::json!({
            "login": login,
            "password": "secret-password",
            "public_key": public_pem(key_idx),
        })),
    )
    .await;
    assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.json);

    let logged_in = send(
        app,
        Method::POST,
        "/user/login",
        None,
        Some(serde_json::json!({
            "login": login,
            "password": "secret-password",
            "public_key": public_pem(key_idx),
        })),
    )
    .await;
    assert_eq!(logged_in.status, StatusCode::OK, "{:?}", logged_in.json);

    let cookie = logged_in.session_cookie().expect("session cookie");
    let id = logged_in.json["id"].as_str().expect("user id").to_string();
    (cookie, id)
}
