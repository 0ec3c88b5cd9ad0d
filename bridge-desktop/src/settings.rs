//! Settings storage backed by a single JSON file

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, error};

const APP_DIR_NAME: &str = "tapedeck";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// A stored value together with its type, so that reading a key with the
/// wrong accessor is reported instead of silently coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
enum StoredValue {
    String(String),
    Bool(bool),
    I64(i64),
}

impl StoredValue {
    fn type_name(&self) -> &'static str {
        match self {
            StoredValue::String(_) => "string",
            StoredValue::Bool(_) => "bool",
            StoredValue::I64(_) => "i64",
        }
    }
}

type Entries = BTreeMap<String, StoredValue>;

/// JSON-file settings store implementation
///
/// The whole file is read on first access and rewritten after every mutation
/// (write to a sibling temp file, then rename). Without a path the store lives
/// only in memory.
pub struct JsonSettingsStore {
    path: Option<PathBuf>,
    entries: Mutex<Option<Entries>>,
}

impl JsonSettingsStore {
    /// Create a store persisted at `path`. The file is created on first write.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            entries: Mutex::new(None),
        }
    }

    /// Create a store that never touches the disk (for testing)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Some(Entries::new())),
        }
    }

    /// `<data dir>/tapedeck/settings.json`
    pub fn default_location() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            BridgeError::NotAvailable("No data directory for the current user".to_string())
        })?;
        Ok(data_dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    async fn load(&self) -> Result<Entries> {
        let Some(path) = &self.path else {
            return Ok(Entries::new());
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let entries: Entries = serde_json::from_slice(&bytes).map_err(|e| {
                    error!(path = ?path, error = %e, "Corrupt settings file");
                    BridgeError::Serialization(format!("Invalid settings file: {}", e))
                })?;
                debug!(path = ?path, keys = entries.len(), "Loaded settings");
                Ok(entries)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn persist(&self, entries: &Entries) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(BridgeError::Io)?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(BridgeError::Io)?;

        Ok(())
    }

    async fn read_value(&self, key: &str) -> Result<Option<StoredValue>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Entries) + Send,
    {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };

        apply(&mut entries);
        let written = self.persist(&entries).await;
        *guard = Some(entries);
        written
    }

    async fn set_value(&self, key: &str, value: StoredValue) -> Result<()> {
        let value_type = value.type_name();
        self.mutate(|entries| {
            entries.insert(key.to_string(), value);
        })
        .await?;

        debug!(key = key, value_type = value_type, "Stored setting");
        Ok(())
    }

    fn type_mismatch(key: &str, expected: &str, actual: &StoredValue) -> BridgeError {
        error!(
            key = key,
            expected = expected,
            actual = actual.type_name(),
            "Type mismatch"
        );
        BridgeError::OperationFailed(format!(
            "Type mismatch: expected {}, got {}",
            expected,
            actual.type_name()
        ))
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, StoredValue::String(value.to_string()))
            .await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.read_value(key).await? {
            Some(StoredValue::String(value)) => Ok(Some(value)),
            Some(other) => Err(Self::type_mismatch(key, "string", &other)),
            None => Ok(None),
        }
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_value(key, StoredValue::Bool(value)).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.read_value(key).await? {
            Some(StoredValue::Bool(value)) => Ok(Some(value)),
            Some(other) => Err(Self::type_mismatch(key, "bool", &other)),
            None => Ok(None),
        }
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_value(key, StoredValue::I64(value)).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.read_value(key).await? {
            Some(StoredValue::I64(value)) => Ok(Some(value)),
            Some(other) => Err(Self::type_mismatch(key, "i64", &other)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
        .await?;
        debug!(key = key, "Deleted setting");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.read_value(key).await?.is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard
            .as_ref()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_string_settings() {
        let store = JsonSettingsStore::in_memory();

        store.set_string("theme", "dark").await.unwrap();
        let value = store.get_string("theme").await.unwrap();
        assert_eq!(value, Some("dark".to_string()));
        assert_eq!(store.get_string("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_typed_settings() {
        let store = JsonSettingsStore::in_memory();

        store.set_bool("resume", true).await.unwrap();
        store.set_i64("volume", 80).await.unwrap();

        assert_eq!(store.get_bool("resume").await.unwrap(), Some(true));
        assert_eq!(store.get_i64("volume").await.unwrap(), Some(80));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported() {
        let store = JsonSettingsStore::in_memory();
        store.set_i64("volume", 80).await.unwrap();

        let err = store.get_string("volume").await.unwrap_err();
        assert!(err.to_string().contains("expected string, got i64"));
        assert!(store.has_key("volume").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_and_list_keys() {
        let store = JsonSettingsStore::in_memory();
        store.set_string("b", "2").await.unwrap();
        store.set_string("a", "1").await.unwrap();

        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);

        store.delete("a").await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["b"]);
        assert!(!store.has_key("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        {
            let store = JsonSettingsStore::new(path.clone());
            store.set_string("last_played", r#"{"index":2}"#).await.unwrap();
            store.set_bool("resume", false).await.unwrap();
        }

        let reopened = JsonSettingsStore::new(path.clone());
        assert_eq!(
            reopened.get_string("last_played").await.unwrap(),
            Some(r#"{"index":2}"#.to_string())
        );
        assert_eq!(reopened.get_bool("resume").await.unwrap(), Some(false));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = JsonSettingsStore::new(path);
        let err = store.get_string("anything").await.unwrap_err();
        assert!(matches!(err, BridgeError::Serialization(_)));
    }
}
