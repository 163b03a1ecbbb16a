//! Gateway configuration (code > env > persisted state > defaults).

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::store::TokenStoreConfig;
use crate::error::GatewayError;

/// Backend used when neither configuration nor storage names one.
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";

/// Upload body chunk size; progress is reported once per chunk.
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Settings for building a [`Gateway`](crate::gateway::Gateway).
///
/// When `api_base` is unset, the base persisted by a previous `set_api_base`
/// is used, falling back to [`DEFAULT_API_BASE`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_base: Option<String>,
    pub store_dir: PathBuf,
    pub request_timeout: Option<Duration>,
    pub upload_chunk_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            store_dir: TokenStoreConfig::default_dir(),
            request_timeout: None,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from the environment (and `.env` when present).
    ///
    /// Recognized variables: `AUTHGATE_API_BASE`, `AUTHGATE_STORE_DIR`,
    /// `AUTHGATE_TIMEOUT_SECS`, `AUTHGATE_UPLOAD_CHUNK_SIZE`.
    pub fn from_env() -> Result<Self, GatewayError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let mut config = Self::new();

        if let Some(base) = lookup("AUTHGATE_API_BASE").filter(|v| !v.trim().is_empty()) {
            config.api_base = Some(base);
        }
        if let Some(dir) = lookup("AUTHGATE_STORE_DIR").filter(|v| !v.trim().is_empty()) {
            config.store_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("AUTHGATE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                GatewayError::Configuration(format!(
                    "AUTHGATE_TIMEOUT_SECS must be a whole number of seconds, got {secs:?}"
                ))
            })?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(size) = lookup("AUTHGATE_UPLOAD_CHUNK_SIZE") {
            let size: usize = size.trim().parse().map_err(|_| {
                GatewayError::Configuration(format!(
                    "AUTHGATE_UPLOAD_CHUNK_SIZE must be a byte count, got {size:?}"
                ))
            })?;
            config = config.with_upload_chunk_size(size);
        }

        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Zero is clamped to one byte.
    pub fn with_upload_chunk_size(mut self, size: usize) -> Self {
        self.upload_chunk_size = size.max(1);
        self
    }
}
