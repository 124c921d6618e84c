//! `localStorage` backend

use wasm_bindgen::JsValue;
use waypoint::storage::{KeyValueStore, StorageError, StorageResult};
use web_sys::Storage;

/// Key-value store over `window.localStorage`
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    /// Open `localStorage`. Fails when it is disabled (e.g. by privacy settings).
    pub fn open() -> StorageResult<Self> {
        let window =
            web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| StorageError::Unavailable("localStorage is disabled".to_string()))?;

        Ok(Self { storage })
    }
}

fn js_error(value: JsValue) -> StorageError {
    StorageError::Unavailable(
        value
            .as_string()
            .unwrap_or_else(|| format!("{:?}", value)),
    )
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage.set_item(key, value).map_err(js_error)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage.remove_item(key).map_err(js_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_local_storage_roundtrip() {
        let store = LocalStorageStore::open().unwrap();
        store.set("waypoint:test", "value").unwrap();
        assert_eq!(store.get("waypoint:test").unwrap().as_deref(), Some("value"));

        store.remove("waypoint:test").unwrap();
        assert!(store.get("waypoint:test").unwrap().is_none());
    }
}
