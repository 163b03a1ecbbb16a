//! Multipart uploads: progress, auth header and the never-fail result shape.

mod support;

use std::sync::{Arc, Mutex};

use authgate::auth::SessionState;
use authgate::config::GatewayConfig;
use authgate::gateway::{FormData, Gateway, UploadOptions, UploadResult};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{
    closed_base_url, gateway, gateway_at, memory_store, seeded_store, MultipartContentType,
    NoAuthorization,
};

fn sample_form() -> FormData {
    let content: Vec<u8> = (0..10_000u32).map(|i| b'a' + (i % 26) as u8).collect();
    FormData::new()
        .text("kind", "policy")
        .file("file", "rules.txt", "text/plain", content)
}

#[tokio::test]
async fn upload_reports_progress_and_parses_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("authorization", "Bearer acc"))
        .and(MultipartContentType)
        .and(body_string_contains("name=\"kind\"\r\n\r\npolicy\r\n"))
        .and(body_string_contains("filename=\"rules.txt\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u1"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = GatewayConfig::new()
        .with_api_base(server.uri())
        .with_upload_chunk_size(1024);
    let gw = Gateway::with_store(&config, seeded_store("acc", None)).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = UploadOptions::new().on_progress(move |percent| {
        sink.lock().unwrap().push(percent);
    });
    let result = gw.upload("/upload", sample_form(), options).await;

    assert_eq!(
        result,
        UploadResult {
            ok: true,
            status: 200,
            body: json!({"id": "u1"}),
        }
    );
    let seen = seen.lock().unwrap().clone();
    assert!(seen.len() > 2, "expected several progress events, got {seen:?}");
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "not increasing: {seen:?}");
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test]
async fn anonymous_upload_sends_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(NoAuthorization)
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"stored": true})))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, memory_store());
    let result = gw
        .upload("/upload", sample_form(), UploadOptions::default())
        .await;
    assert!(result.ok);
    assert_eq!(result.status, 201);
}

#[tokio::test]
async fn unauthorized_upload_is_returned_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let gw = gateway(&server, seeded_store("stale", Some("ref-1")));
    let result = gw
        .upload("/upload", sample_form(), UploadOptions::default())
        .await;

    assert_eq!(
        result,
        UploadResult {
            ok: false,
            status: 401,
            body: json!({"error": "expired"}),
        }
    );
    assert_eq!(gw.snapshot().state, SessionState::Authenticated);
    assert_eq!(gw.session().access_token().as_deref(), Some("stale"));
}

#[tokio::test]
async fn client_error_status_is_not_ok() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(413).set_body_json(json!({"error": "Too large"})))
        .mount(&server)
        .await;

    let gw = gateway(&server, memory_store());
    let result = gw
        .upload("/upload", sample_form(), UploadOptions::default())
        .await;
    assert!(!result.ok);
    assert_eq!(result.status, 413);
    assert_eq!(result.body, json!({"error": "Too large"}));
}

#[tokio::test]
async fn non_json_response_body_becomes_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("uploaded!"))
        .mount(&server)
        .await;

    let gw = gateway(&server, memory_store());
    let result = gw
        .upload("/upload", sample_form(), UploadOptions::default())
        .await;
    assert_eq!(
        result,
        UploadResult {
            ok: true,
            status: 200,
            body: json!({}),
        }
    );
}

#[tokio::test]
async fn network_failure_resolves_to_error_result() {
    let gw = gateway_at(&closed_base_url(), seeded_store("acc", None));
    let result = gw
        .upload("/upload", sample_form(), UploadOptions::default())
        .await;
    assert_eq!(
        result,
        UploadResult {
            ok: false,
            status: 0,
            body: json!({"error": "Network error"}),
        }
    );
}

#[tokio::test]
async fn unusable_base_url_resolves_to_invalid_request() {
    let gw = gateway_at("not a url", memory_store());
    let result = gw
        .upload("/upload", sample_form(), UploadOptions::default())
        .await;
    assert_eq!(
        result,
        UploadResult {
            ok: false,
            status: 0,
            body: json!({"error": "Invalid request"}),
        }
    );
}
