//! Key-value storage boundary
//!
//! Scroll records and the pending sign-in email must survive a full page load.
//! Everything that persists goes through [`KeyValueStore`], which in the browser
//! is `localStorage`, natively a JSON file, and in tests an in-memory map.
//!
//! - **error**: Error types
//! - **memory**: In-memory backend
//! - **file**: File-backed backend (native only)

pub mod error;
#[cfg(feature = "native")]
pub mod file;
pub mod memory;

pub use error::{StorageError, StorageResult};
#[cfg(feature = "native")]
pub use file::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Storage key constants
pub mod keys {
    /// Bounded list of scroll records
    pub const SCROLL_RECORDS: &str = "waypoint:scroll-records";
    /// Email address awaiting link confirmation
    pub const EMAIL_FOR_SIGN_IN: &str = "emailForSignIn";
}

/// Persistent string key-value storage
pub trait KeyValueStore {
    /// Load a value by key, `None` if absent
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Save a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value; removing an absent key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Load and deserialize a JSON value stored under `key`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
