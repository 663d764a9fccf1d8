//! Integration test support for Greenbasket.
//!
//! The suites under `tests/` exercise the shop end to end without any
//! external dependency: the full axum router runs in-process over the
//! in-memory storage backend, and requests are driven through
//! `tower::ServiceExt::oneshot`.
//!
//! Authentication is an upstream concern in production, so tests stand in
//! for the gateway by inserting an [`AuthContext`] into the request
//! extensions directly.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use greenbasket_core::UserId;
use greenbasket_shop::config::ShopConfig;
use greenbasket_shop::db::MemoryStorage;
use greenbasket_shop::middleware::{AuthContext, Role};
use greenbasket_shop::routes;
use greenbasket_shop::state::AppState;

/// Configuration for an in-process test app; never actually bound.
#[must_use]
pub fn test_config() -> ShopConfig {
    ShopConfig {
        database_url: SecretString::from("postgres://localhost/unused"),
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        port: 0,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// An auth context with the customer role.
#[must_use]
pub fn customer(user_id: i32) -> AuthContext {
    AuthContext {
        user_id: UserId::new(user_id),
        role: Role::Customer,
    }
}

/// An auth context with the admin role.
#[must_use]
pub fn admin(user_id: i32) -> AuthContext {
    AuthContext {
        user_id: UserId::new(user_id),
        role: Role::Admin,
    }
}

/// The shop router over a shared in-memory storage backend.
///
/// The storage handle is kept so tests can seed catalog data and assert on
/// stock counters after requests complete.
#[derive(Clone)]
pub struct TestApp {
    router: Router,
    /// Direct handle to the backend for seeding and assertions.
    pub storage: Arc<MemoryStorage>,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::new(test_config(), storage.clone());
        Self {
            router: routes::router(state),
            storage,
        }
    }

    /// Drive one request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Send a request and decode the JSON response body.
    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, value)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a request, optionally authenticated and with a JSON body.
#[must_use]
pub fn request(
    method: Method,
    uri: &str,
    ctx: Option<AuthContext>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(ctx) = ctx {
        builder = builder.extension(ctx);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}
