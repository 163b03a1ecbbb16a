//! Session ownership and credential storage.

pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use session::{SessionEvent, SessionManager, SessionSnapshot, SessionState};
pub use store::{
    FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreConfig, TokenStoreExt,
    ACCESS_TOKEN_KEY, API_BASE_KEY, REFRESH_TOKEN_KEY,
};
pub use token::Identity;
