//! Authenticated requests with a single refresh-and-retry on 401.

use std::sync::Arc;

use bon::Builder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;

use crate::auth::SessionManager;
use crate::error::{GatewayError, Result};
use crate::http::{bearer_value, resolve_url};

/// Request payload. Kept in memory so the retry can resend it verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

/// Caller-controlled parts of a request.
///
/// ```
/// use authgate::gateway::{RequestBody, RequestOptions};
/// use reqwest::Method;
///
/// let options = RequestOptions::builder()
///     .method(Method::POST)
///     .body(RequestBody::Json(serde_json::json!({"name": "nightly"})))
///     .build();
/// assert_eq!(options.method, Method::POST);
/// ```
#[derive(Debug, Clone, Default, Builder)]
pub struct RequestOptions {
    #[builder(default)]
    pub method: Method,
    #[builder(default)]
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    #[builder(default)]
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    pub fn post_json<T: Serialize + ?Sized>(body: &T) -> Result<Self> {
        Ok(Self {
            method: Method::POST,
            body: Some(RequestBody::Json(serde_json::to_value(body)?)),
            ..Self::default()
        })
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A fully resolved request, built once per `send` and reused for the retry.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub query: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(url: Url, options: RequestOptions) -> Self {
        Self {
            url,
            method: options.method,
            headers: options.headers,
            body: options.body,
            query: options.query,
        }
    }

    /// Build the outbound request. A caller-supplied Authorization header is
    /// left alone; otherwise `access_token` becomes a bearer header.
    pub fn to_request(
        &self,
        client: &reqwest::Client,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut headers = self.headers.clone();
        if !headers.contains_key(AUTHORIZATION) {
            if let Some(value) = access_token.and_then(bearer_value) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        let mut builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(headers);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        match &self.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
            None => builder,
        }
    }
}

/// Which response of a `send` is being judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

/// What `send` does with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Return,
    RefreshAndRetry,
}

/// Retry policy.
///
/// Only a first-attempt 401 can trigger a refresh, and only when there is
/// something to retry with: a refresh token, or a session that another caller
/// renewed (new generation holding an access token) since this request went
/// out. A 401 that raced a logout is returned as-is.
pub fn retry_decision(
    status: StatusCode,
    attempt: Attempt,
    has_refresh_token: bool,
    session_renewed: bool,
) -> RetryDecision {
    match (attempt, status) {
        (Attempt::First, StatusCode::UNAUTHORIZED) if has_refresh_token || session_renewed => {
            RetryDecision::RefreshAndRetry
        }
        _ => RetryDecision::Return,
    }
}

/// Sends requests on behalf of the current session.
#[derive(Debug, Clone)]
pub struct RequestGateway {
    client: reqwest::Client,
    session: Arc<SessionManager>,
}

impl RequestGateway {
    pub fn new(client: reqwest::Client, session: Arc<SessionManager>) -> Self {
        Self { client, session }
    }

    /// Send a request, refreshing and retrying once on 401.
    ///
    /// Any response other than the refresh-triggering 401 is returned as-is,
    /// including non-2xx statuses. If the refresh fails the session is logged
    /// out (unless a concurrent login replaced it) and
    /// [`GatewayError::SessionExpired`] is returned instead.
    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<reqwest::Response> {
        let url = resolve_url(&self.session.api_base(), path)?;
        let descriptor = RequestDescriptor::new(url, options);

        let (generation, access_token) = self.session.credentials();
        let response = self.dispatch(&descriptor, access_token.as_deref()).await?;

        let (current_generation, current_token) = self.session.credentials();
        let decision = retry_decision(
            response.status(),
            Attempt::First,
            self.session.has_refresh_token(),
            current_generation != generation && current_token.is_some(),
        );
        if decision == RetryDecision::Return {
            return Ok(response);
        }
        drop(response);

        tracing::debug!(url = %descriptor.url, "Unauthorized; refreshing access token");
        let token = match self.session.refresh_since(generation).await {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(url = %descriptor.url, error = %error, "Session expired");
                self.session.logout_unless_reauthenticated();
                return Err(GatewayError::SessionExpired);
            }
        };

        let retried = self.dispatch(&descriptor, Some(&token)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            // Attempt::Retry never refreshes again.
            tracing::debug!(url = %descriptor.url, "Retried request still unauthorized");
        }
        Ok(retried)
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.send(path, RequestOptions::get()).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        self.send(path, RequestOptions::post_json(body)?).await
    }

    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> Result<reqwest::Response> {
        let response = descriptor
            .to_request(&self.client, access_token)
            .send()
            .await?;
        tracing::debug!(
            method = %descriptor.method,
            url = %descriptor.url,
            status = response.status().as_u16(),
            "Request completed"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;
    use serde_json::json;

    fn descriptor(options: RequestOptions) -> RequestDescriptor {
        RequestDescriptor::new(Url::parse("http://api.local/tasks").unwrap(), options)
    }

    #[test]
    fn first_unauthorized_with_refresh_token_retries() {
        assert_eq!(
            retry_decision(StatusCode::UNAUTHORIZED, Attempt::First, true, false),
            RetryDecision::RefreshAndRetry
        );
        assert_eq!(
            retry_decision(StatusCode::UNAUTHORIZED, Attempt::First, false, true),
            RetryDecision::RefreshAndRetry
        );
    }

    #[test]
    fn everything_else_is_returned() {
        assert_eq!(
            retry_decision(StatusCode::UNAUTHORIZED, Attempt::First, false, false),
            RetryDecision::Return
        );
        assert_eq!(
            retry_decision(StatusCode::UNAUTHORIZED, Attempt::Retry, true, true),
            RetryDecision::Return
        );
        assert_eq!(
            retry_decision(StatusCode::FORBIDDEN, Attempt::First, true, false),
            RetryDecision::Return
        );
        assert_eq!(
            retry_decision(StatusCode::OK, Attempt::First, true, true),
            RetryDecision::Return
        );
    }

    #[test]
    fn bearer_header_attached_when_token_present() {
        let client = reqwest::Client::new();
        let request = descriptor(RequestOptions::get())
            .to_request(&client, Some("acc"))
            .build()
            .unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer acc");

        let anonymous = descriptor(RequestOptions::get())
            .to_request(&client, None)
            .build()
            .unwrap();
        assert!(!anonymous.headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn caller_authorization_header_is_kept() {
        let client = reqwest::Client::new();
        let options = RequestOptions::get()
            .with_header(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let request = descriptor(options)
            .to_request(&client, Some("acc"))
            .build()
            .unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Basic abc");
    }

    #[test]
    fn json_body_and_query_are_applied() {
        let client = reqwest::Client::new();
        let options = RequestOptions::post_json(&json!({"a": 1}))
            .unwrap()
            .with_query("page", "2");
        let request = descriptor(options)
            .to_request(&client, None)
            .build()
            .unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().as_str(), "http://api.local/tasks?page=2");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(body).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn builder_defaults_to_get_without_body() {
        let options = RequestOptions::builder().build();
        assert_eq!(options.method, Method::GET);
        assert!(options.body.is_none());
        assert!(options.headers.is_empty());
    }
}
