use std::collections::HashMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::AuthError;

/// Persisted key holding the current access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Persisted key holding the current refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Persisted key holding the API base URL.
pub const API_BASE_KEY: &str = "apiBase";

/// Reload-durable key-value storage for small JSON values.
///
/// Implementors provide the raw string primitives; the JSON layer (`get`/`set`)
/// is shared. `get` never fails: a missing key, an unreadable backend and a
/// malformed entry all read as `None`.
pub trait TokenStore: Send + Sync {
    fn load_raw(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn save_raw(&self, key: &str, raw: &str) -> Result<(), AuthError>;
    /// Remove a key. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), AuthError>;

    fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.load_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(key, error = %error, "Failed to read persisted entry");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, error = %error, "Ignoring malformed persisted entry");
                None
            }
        }
    }

    /// Store `value` in canonical JSON form (compact, object keys sorted).
    fn set(&self, key: &str, value: &Value) -> Result<(), AuthError> {
        let serialized = serde_json::to_string(value)?;
        self.save_raw(key, &serialized)
    }
}

/// Typed accessors on top of [`TokenStore`].
pub trait TokenStoreExt: TokenStore {
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(error) => {
                tracing::warn!(key, error = %error, "Persisted entry has unexpected shape");
                None
            }
        }
    }

    fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AuthError> {
        let value = serde_json::to_value(value)?;
        self.set(key, &value)
    }
}

impl<S: TokenStore + ?Sized> TokenStoreExt for S {}

/// Configuration for file-backed storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_store_dir()
    }
}

/// File-backed store keeping one `<key>.json` file per entry.
///
/// # Example
/// ```no_run
/// use authgate::auth::{FileTokenStore, TokenStore};
/// use serde_json::json;
///
/// let store = FileTokenStore::new_default();
/// store.set("accessToken", &json!("abc"))?;
/// assert_eq!(store.get("accessToken"), Some(json!("abc")));
/// # Ok::<(), authgate::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_store_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_key(key)))
    }
}

impl TokenStore for FileTokenStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>, AuthError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }

    fn save_raw(&self, key: &str, raw: &str) -> Result<(), AuthError> {
        atomic_write(&self.entry_path(key), raw.as_bytes())
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

/// Process-local store. Entries vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save_raw(&self, key: &str, raw: &str) -> Result<(), AuthError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), raw.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

fn default_store_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".authgate"))
        .unwrap_or_else(|| PathBuf::from(".authgate"))
}

fn normalize_key(key: &str) -> String {
    let trimmed = key.trim();
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('-');
        }
    }
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| AuthError::Io(format!("{} has no file name", path.display())))?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
