#![allow(dead_code)]

use std::sync::Arc;

use authgate::auth::{MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use authgate::config::GatewayConfig;
use authgate::gateway::Gateway;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches requests that carry no Authorization header at all.
pub struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

/// Matches `multipart/form-data` requests with a boundary.
pub struct MultipartContentType;

impl Match for MultipartContentType {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data; boundary="))
    }
}

pub fn memory_store() -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::new())
}

/// A store holding a session persisted by an earlier run.
pub fn seeded_store(access: &str, refresh: Option<&str>) -> Arc<MemoryTokenStore> {
    let store = memory_store();
    store
        .set(ACCESS_TOKEN_KEY, &json!(access))
        .expect("seed access token");
    if let Some(refresh) = refresh {
        store
            .set(REFRESH_TOKEN_KEY, &json!(refresh))
            .expect("seed refresh token");
    }
    store
}

pub fn gateway_at(api_base: &str, store: Arc<MemoryTokenStore>) -> Gateway {
    Gateway::with_store(&GatewayConfig::new().with_api_base(api_base), store).expect("gateway")
}

pub fn gateway(server: &MockServer, store: Arc<MemoryTokenStore>) -> Gateway {
    gateway_at(&server.uri(), store)
}

/// Base URL of a port nobody listens on.
pub fn closed_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub async fn mount_login(server: &MockServer, email: &str, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": email, "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "refresh_token": refresh
        })))
        .expect(1)
        .mount(server)
        .await;
}

pub fn stored_string(store: &MemoryTokenStore, key: &str) -> Option<String> {
    store
        .get(key)
        .and_then(|value| value.as_str().map(str::to_string))
}
