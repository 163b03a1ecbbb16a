//! Convenience re-exports for common use.

pub use crate::auth::{Identity, SessionManager, SessionSnapshot, SessionState, TokenStore};
pub use crate::config::GatewayConfig;
pub use crate::error::{GatewayError, Result};
pub use crate::gateway::{
    FormData, Gateway, RequestBody, RequestOptions, UploadOptions, UploadOutcome, UploadResult,
};
