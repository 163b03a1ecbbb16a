//! authgate: authenticated request gateway
//!
//! Holds a backend session (access and refresh tokens), attaches bearer
//! credentials to outbound calls, refreshes an expired access token and retries
//! the call once, and uploads multipart forms with progress reporting.
//!
//! # Quick Start
//!
//! ```no_run
//! use authgate::prelude::*;
//!
//! # async fn example() -> authgate::error::Result<()> {
//! let gateway = Gateway::from_config(&GatewayConfig::new().with_api_base("http://localhost:5000"))?;
//! gateway.login("a@b.com", "pw").await?;
//!
//! let response = gateway.send("/tasks", RequestOptions::get()).await?;
//! println!("{}", response.status());
//!
//! let form = FormData::new().file("file", "rules.txt", "text/plain", b"rule 1".to_vec());
//! let result = gateway
//!     .upload("/validate", form, UploadOptions::new().on_progress(|pct| eprintln!("{pct}%")))
//!     .await;
//! println!("{} {}", result.status, result.body);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
