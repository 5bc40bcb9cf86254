//! Common utilities for gateway integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use turnstile_gateway::{
    config::{BackendConfig, CorsConfig, GatewayConfig, RouteConfig, VerifierConfig},
    error::ErrorEnvelope,
    routes::create_router,
    routing::RouteClass,
    GatewayState,
};
use wiremock::MockServer;

pub const JWT_SECRET: &str = "integration_secret_key_32_chars!!";
pub const ALLOWED_ORIGIN: &str = "https://app.smartcourse.io";

/// A gateway wired to mock verifier and backend servers.
pub struct TestGateway {
    pub app: Router,
    pub state: Arc<GatewayState>,
}

impl TestGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let state = Arc::new(GatewayState::from_config(&config).expect("valid test config"));
        Self {
            app: create_router(state.clone()),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub fn route(name: &str, pattern: &str, methods: &[&str], class: RouteClass, tiers: &[&str]) -> RouteConfig {
    RouteConfig {
        name: Some(name.to_string()),
        pattern: pattern.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        class,
        backend: "user-service".to_string(),
        tiers: tiers.iter().map(|t| t.to_string()).collect(),
        allowed_roles: Vec::new(),
        strip_prefix: None,
        timeout_ms: None,
    }
}

/// SmartCourse-style route table pointing at `backend_url`.
pub fn config(verifier_url: &str, backend_url: &str) -> GatewayConfig {
    let mut admin = route("admin", "/api/admin/**", &["GET"], RouteClass::Protected, &["protected"]);
    admin.allowed_roles = vec!["admin".to_string()];

    GatewayConfig {
        verifier: VerifierConfig {
            endpoint: Some(format!("{}/verify", verifier_url)),
            timeout_ms: 500,
            ..VerifierConfig::default()
        },
        cors: CorsConfig {
            allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
            ..CorsConfig::default()
        },
        backends: vec![BackendConfig {
            name: "user-service".to_string(),
            url: backend_url.to_string(),
            timeout_ms: 2000,
        }],
        routes: vec![
            route("login", "/api/auth/login", &["POST"], RouteClass::Public, &["auth"]),
            route("refresh", "/api/auth/refresh", &["POST"], RouteClass::Public, &["refresh"]),
            route("me", "/api/auth/me", &["GET"], RouteClass::Protected, &["protected"]),
            route("profile", "/api/profile/*", &["GET", "PUT"], RouteClass::Protected, &["protected"]),
            admin,
        ],
        ..GatewayConfig::default()
    }
}

pub async fn mock_pair() -> (MockServer, MockServer) {
    (MockServer::start().await, MockServer::start().await)
}

/// Request from a fixed client address.
pub fn request(method: Method, path: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(path)
}

pub fn from_client(mut request: Request<Body>, addr: &str) -> Request<Body> {
    let addr: SocketAddr = addr.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

pub async fn envelope(response: Response) -> ErrorEnvelope {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
