use crate::error::StoreError;
use crate::model::DeviceRecord;
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub trait InventoryStore {
    /// Replaces the whole persisted collection.
    fn replace(&self, records: &[DeviceRecord]) -> Result<(), StoreError>;
    fn load(&self) -> Result<Vec<DeviceRecord>, StoreError>;
    fn exists(&self) -> bool;
    fn location(&self) -> String;
}

/// Pretty-printed JSON array on disk, guarded by an advisory lock file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    /// `<file name><suffix>` next to the inventory, whatever its extension.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?)
    }
}

struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl InventoryStore for JsonFileStore {
    fn replace(&self, records: &[DeviceRecord]) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(records)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        let lock = self.open_lock()?;
        lock.lock_exclusive()?;
        let _guard = LockGuard { file: lock };

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, payload)?;
        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "inventory replaced");
        Ok(())
    }

    fn load(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let _guard = LockGuard { file: lock };

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|err| StoreError::Serialization(err.to_string()))
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Reads the persisted inventory, treating any failure as an empty inventory.
pub fn load_persisted_inventory(store: &dyn InventoryStore) -> Vec<DeviceRecord> {
    match store.load() {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(location = %store.location(), error = %err, "inventory unreadable");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, ip: &str) -> DeviceRecord {
        DeviceRecord {
            name: name.to_string(),
            primary_ip: ip.to_string(),
            device_type: "DCS-7280".to_string(),
        }
    }

    #[test]
    fn replace_writes_pretty_json_and_overwrites() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("nested/inventory.json"));
        assert!(!store.exists());

        store
            .replace(&[record("a", "10.0.0.1/32"), record("b", "10.0.0.2/32")])
            .expect("first write");
        store.replace(&[record("c", "10.0.0.3/32")]).expect("second write");

        let content = fs::read_to_string(store.path()).expect("read");
        assert!(content.starts_with("[\n  {\n    \"name\": \"c\""));
        assert_eq!(store.load().expect("load"), vec![record("c", "10.0.0.3/32")]);
        assert!(!dir.path().join("nested/inventory.json.tmp").exists());
    }

    #[test]
    fn sidecar_files_keep_the_configured_extension() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("inv.txt"));
        store.replace(&[record("a", "10.0.0.1/32")]).expect("write");

        assert!(dir.path().join("inv.txt").exists());
        assert!(dir.path().join("inv.txt.lock").exists());
        assert!(!dir.path().join("inv.txt.tmp").exists());
        assert!(!dir.path().join("inv.json.lock").exists());
        assert_eq!(store.load().expect("load"), vec![record("a", "10.0.0.1/32")]);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("inventory.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_at_the_boundary() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("inventory.json");
        fs::write(&path, "{not json").expect("write");
        let store = JsonFileStore::new(&path);
        assert!(store.load().is_err());
        assert!(load_persisted_inventory(&store).is_empty());
    }

    #[test]
    fn duplicates_and_order_are_preserved() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("inventory.json"));
        let records = vec![
            record("z", "10.0.0.9/32"),
            record("a", "10.0.0.1/32"),
            record("z", "10.0.0.9/32"),
        ];
        store.replace(&records).expect("write");
        assert_eq!(load_persisted_inventory(&store), records);
    }
}
