// ── Registry persistence ──
//
// The whole record set loads and saves as one unit. `JsonFileStore` writes
// to a sibling temp file and renames it over the target, so readers never
// observe a half-written file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use super::DeviceRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed registry file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Backing storage for the registry.
pub trait RecordStore: Send + Sync {
    /// Load every record in store order.
    fn load(&self) -> Result<Vec<DeviceRecord>, StoreError>;

    /// Replace the stored set with `records`.
    fn save(&self, records: &[DeviceRecord]) -> Result<(), StoreError>;
}

// ── JSON file ───────────────────────────────────────────────────────

/// Records as a JSON array of `{address, descriptor}` objects.
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

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, records: &[DeviceRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let body = serde_json::to_string_pretty(records).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

// ── In-memory ───────────────────────────────────────────────────────

/// Volatile store; can be switched into a failing mode to exercise
/// storage error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<DeviceRecord>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<DeviceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent load and save fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// What was last saved.
    pub fn records(&self) -> Vec<DeviceRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        self.check()?;
        Ok(self.records())
    }

    fn save(&self, records: &[DeviceRecord]) -> Result<(), StoreError> {
        self.check()?;
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records.to_vec();
        Ok(())
    }
}

// Shared handles, so a caller can keep inspecting a store it handed over.
impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        (**self).load()
    }

    fn save(&self, records: &[DeviceRecord]) -> Result<(), StoreError> {
        (**self).save(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use twinkly_api::DeviceDescriptor;

    use super::*;

    fn record(address: &str) -> DeviceRecord {
        DeviceRecord::new(
            address,
            DeviceDescriptor::new(json!({"mac": "98:cd:ac:00:00:01", "fw_family": "G"})),
        )
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("twinkly.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_persists_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("twinkly.json");
        let store = JsonFileStore::new(&path);

        store
            .save(&[record("10.0.0.9"), record("10.0.0.3")])
            .unwrap();

        let reopened = JsonFileStore::new(&path);
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].address, "10.0.0.9");
        assert_eq!(loaded[1].address, "10.0.0.3");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twinkly.json");
        fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Format { .. }));
    }

    #[test]
    fn memory_store_failing_mode() {
        let store = MemoryStore::new();
        store.save(&[record("a")]).unwrap();
        store.set_failing(true);
        assert!(store.save(&[]).is_err());
        assert!(store.load().is_err());
        assert_eq!(store.records().len(), 1);
    }
}
