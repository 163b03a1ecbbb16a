//! Shared HTTP client construction, URL resolution and body helpers.

use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::Url;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::AuthError;
use crate::error::GatewayError;

/// A path or base URL that does not form a usable absolute URL.
#[derive(Debug, Clone, Error)]
#[error("invalid URL {url:?}: {reason}")]
pub struct InvalidUrl {
    pub url: String,
    pub reason: String,
}

impl From<InvalidUrl> for GatewayError {
    fn from(error: InvalidUrl) -> Self {
        GatewayError::InvalidRequest(error.to_string())
    }
}

impl From<InvalidUrl> for AuthError {
    fn from(error: InvalidUrl) -> Self {
        AuthError::InvalidResponse(error.to_string())
    }
}

/// Build the reqwest client used by every gateway component.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, GatewayError> {
    let mut builder = reqwest::Client::builder().pool_max_idle_per_host(10);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// `Bearer <token>` header value, or `None` if the token has invalid header bytes.
pub fn bearer_value(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Whether `path` already names a full http(s) URL.
pub fn is_absolute(path: &str) -> bool {
    let lower = path.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resolve `path` against `base`. Absolute paths pass through unchanged;
/// relative ones are appended to the base with exactly one `/` between them.
pub fn resolve_url(base: &str, path: &str) -> Result<Url, InvalidUrl> {
    let joined = if is_absolute(path) {
        path.trim().to_string()
    } else if path.is_empty() {
        base.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };
    Url::parse(&joined).map_err(|e| InvalidUrl {
        url: joined.clone(),
        reason: e.to_string(),
    })
}

/// Parse a response body as JSON, treating empty or malformed bodies as `{}`.
pub fn parse_json_lenient(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Map::new());
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(error = %error, "Response body is not JSON; using empty object");
            Value::Object(Map::new())
        }
    }
}

/// The backend's `error` message from a failure body, or `fallback`.
pub fn error_message(body: &Value, fallback: &str) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}
