//! Multipart uploads with byte-level progress.
//!
//! Uploads attach the session's bearer token but never refresh or retry, and
//! they never fail: every path ends in an [`UploadOutcome`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::{json, Value};
use strum::Display;
use uuid::Uuid;

use crate::auth::SessionManager;
use crate::config::DEFAULT_UPLOAD_CHUNK_SIZE;
use crate::error::GatewayError;
use crate::http::{bearer_value, parse_json_lenient, resolve_url};

/// Receives upload progress as a percentage, 0 through 100.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Per-upload options.
#[derive(Clone, Default)]
pub struct UploadOptions {
    pub on_progress: Option<ProgressCallback>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("on_progress", &self.on_progress.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Why an upload produced no HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UploadFailureKind {
    /// Connection, DNS or transfer failure.
    Network,
    /// The path or base URL could not form a request.
    InvalidRequest,
}

impl UploadFailureKind {
    pub fn message(self) -> &'static str {
        match self {
            Self::Network => "Network error",
            Self::InvalidRequest => "Invalid request",
        }
    }
}

/// Result of an upload as a variant type.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The server answered; `status` may still be non-2xx.
    Completed { status: u16, body: Value },
    Failed { kind: UploadFailureKind },
}

impl UploadOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Completed { status, .. } if (200..300).contains(status))
    }
}

/// Flattened upload result. Always fully populated.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub ok: bool,
    pub status: u16,
    pub body: Value,
}

impl From<UploadOutcome> for UploadResult {
    fn from(outcome: UploadOutcome) -> Self {
        let ok = outcome.is_ok();
        match outcome {
            UploadOutcome::Completed { status, body } => Self { ok, status, body },
            UploadOutcome::Failed { kind } => Self {
                ok: false,
                status: 0,
                body: json!({ "error": kind.message() }),
            },
        }
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Multipart form held in memory, so its encoded length is always known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    parts: Vec<FormPart>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: None,
            content_type: None,
            data: value.into().into_bytes(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data,
        });
        self
    }

    /// Read a file from disk into a part typed `application/octet-stream`.
    pub async fn file_from_path(
        self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(self.file(name, filename, "application/octet-stream", data))
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encode as `multipart/form-data` (RFC 7578) with the given boundary.
    pub fn encode(&self, boundary: &str) -> Vec<u8> {
        let payload_len: usize = self.parts.iter().map(|p| p.data.len()).sum();
        let mut out = Vec::with_capacity(payload_len + self.parts.len() * 128 + 64);
        for part in &self.parts {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            let mut disposition = format!(
                "Content-Disposition: form-data; name=\"{}\"",
                escape_quoted(&part.name)
            );
            if let Some(filename) = &part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", escape_quoted(filename)));
            }
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        out
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Turns bytes handed to the transport into non-decreasing percentages.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    sent: u64,
    last: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            sent: 0,
            last: None,
        }
    }

    /// Record `bytes` more sent. Returns the new percentage when it moved;
    /// always `None` when the total is unknown or zero.
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        let total = self.total.filter(|total| *total > 0)?;
        self.sent = self.sent.saturating_add(bytes).min(total);
        let percent = ((self.sent * 100 + total / 2) / total).min(100) as u8;
        if self.last.is_some_and(|last| last >= percent) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }
}

fn progress_body(
    payload: Vec<u8>,
    chunk_size: usize,
    on_progress: Option<ProgressCallback>,
) -> reqwest::Body {
    let total = payload.len() as u64;
    let chunk_size = chunk_size.max(1);
    let stream = async_stream::stream! {
        let mut tracker = ProgressTracker::new(Some(total));
        for chunk in payload.chunks(chunk_size) {
            if let (Some(percent), Some(callback)) =
                (tracker.advance(chunk.len() as u64), on_progress.as_ref())
            {
                callback(percent);
            }
            yield Ok::<Vec<u8>, std::io::Error>(chunk.to_vec());
        }
    };
    reqwest::Body::wrap_stream(stream)
}

/// Sends multipart uploads for the current session.
#[derive(Debug, Clone)]
pub struct UploadGateway {
    client: reqwest::Client,
    session: Arc<SessionManager>,
    chunk_size: usize,
}

impl UploadGateway {
    pub fn new(client: reqwest::Client, session: Arc<SessionManager>) -> Self {
        Self {
            client,
            session,
            chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// POST `form` to `path`. Never fails; see [`UploadResult`].
    pub async fn upload(&self, path: &str, form: FormData, options: UploadOptions) -> UploadResult {
        self.upload_outcome(path, form, options).await.into()
    }

    pub async fn upload_outcome(
        &self,
        path: &str,
        form: FormData,
        options: UploadOptions,
    ) -> UploadOutcome {
        let url = match resolve_url(&self.session.api_base(), path) {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(error = %error, "Upload rejected before sending");
                return UploadOutcome::Failed {
                    kind: UploadFailureKind::InvalidRequest,
                };
            }
        };

        let boundary = format!("authgate-{}", Uuid::new_v4().simple());
        let payload = form.encode(&boundary);
        let total = payload.len();

        let mut request = self
            .client
            .post(url.clone())
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(CONTENT_LENGTH, total);
        if let Some(value) = self.session.access_token().as_deref().and_then(bearer_value) {
            request = request.header(AUTHORIZATION, value);
        }
        let request = request.body(progress_body(payload, self.chunk_size, options.on_progress));

        tracing::debug!(%url, bytes = total, parts = form.len(), "Uploading");
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%url, error = %error, "Upload failed");
                let kind = if error.is_builder() {
                    UploadFailureKind::InvalidRequest
                } else {
                    UploadFailureKind::Network
                };
                return UploadOutcome::Failed { kind };
            }
        };

        let status = response.status().as_u16();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(%url, status, error = %error, "Upload response was cut off");
                return UploadOutcome::Failed {
                    kind: UploadFailureKind::Network,
                };
            }
        };
        tracing::debug!(%url, status, "Upload completed");
        UploadOutcome::Completed {
            status,
            body: parse_json_lenient(&bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_text_and_file_parts() {
        let form = FormData::new()
            .text("kind", "policy")
            .file("file", "rules.txt", "text/plain", b"abc".to_vec());
        let encoded = String::from_utf8(form.encode("XYZ")).unwrap();
        assert_eq!(
            encoded,
            "--XYZ\r\n\
             Content-Disposition: form-data; name=\"kind\"\r\n\
             \r\n\
             policy\r\n\
             --XYZ\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"rules.txt\"\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             abc\r\n\
             --XYZ--\r\n"
        );
    }

    #[test]
    fn quotes_and_newlines_in_names_are_escaped() {
        let form = FormData::new().text("a\"b\r\nc", "v");
        let encoded = String::from_utf8(form.encode("B")).unwrap();
        assert!(encoded.contains("name=\"a%22b%0D%0Ac\""));
    }

    #[test]
    fn progress_is_rounded_and_non_decreasing() {
        let mut tracker = ProgressTracker::new(Some(3));
        assert_eq!(tracker.advance(1), Some(33));
        assert_eq!(tracker.advance(1), Some(67));
        assert_eq!(tracker.advance(1), Some(100));
        assert_eq!(tracker.advance(5), None);
    }

    #[test]
    fn repeated_percentages_are_suppressed() {
        let mut tracker = ProgressTracker::new(Some(1000));
        assert_eq!(tracker.advance(1), Some(0));
        assert_eq!(tracker.advance(1), None);
        assert_eq!(tracker.advance(998), Some(100));
    }

    #[test]
    fn unknown_total_never_reports() {
        let mut unknown = ProgressTracker::new(None);
        assert_eq!(unknown.advance(10), None);
        let mut empty = ProgressTracker::new(Some(0));
        assert_eq!(empty.advance(10), None);
    }

    #[test]
    fn failed_outcome_flattens_to_network_error() {
        let result = UploadResult::from(UploadOutcome::Failed {
            kind: UploadFailureKind::Network,
        });
        assert_eq!(
            result,
            UploadResult {
                ok: false,
                status: 0,
                body: json!({"error": "Network error"}),
            }
        );
    }

    #[test]
    fn completed_outcome_ok_tracks_2xx() {
        let created = UploadResult::from(UploadOutcome::Completed {
            status: 201,
            body: json!({"id": 7}),
        });
        assert!(created.ok);
        let rejected = UploadResult::from(UploadOutcome::Completed {
            status: 413,
            body: json!({}),
        });
        assert!(!rejected.ok);
        assert_eq!(rejected.status, 413);
    }

    #[tokio::test]
    async fn file_from_path_reads_contents_and_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        tokio::fs::write(&path, b"%PDF").await.unwrap();
        let form = FormData::new().file_from_path("file", &path).await.unwrap();
        let part = &form.parts()[0];
        assert_eq!(part.filename.as_deref(), Some("report.pdf"));
        assert_eq!(part.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(part.data, b"%PDF".to_vec());
    }
}
