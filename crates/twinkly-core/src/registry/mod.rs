// ── Device registry ──
//
// Ordered, address-keyed set of known devices. The current set lives in a
// `watch` channel as an `Arc` snapshot. Writers serialize on their own
// lock, build and persist the next snapshot outside the channel, and only
// then publish, so readers never wait on file I/O.

mod store;

pub use store::{JsonFileStore, MemoryStore, RecordStore, StoreError};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use twinkly_api::{DeviceDescriptor, HardwareAddress};

use crate::error::CoreError;

/// One registered device: its address and last-fetched descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub address: String,
    pub descriptor: DeviceDescriptor,
}

impl DeviceRecord {
    pub fn new(address: impl Into<String>, descriptor: DeviceDescriptor) -> Self {
        Self {
            address: address.into(),
            descriptor,
        }
    }

    /// Whether this record's descriptor names `mac`.
    fn has_hardware_address(&self, mac: &HardwareAddress) -> bool {
        matches!(self.descriptor.hardware_address(), Some(Ok(ref own)) if own == mac)
    }
}

pub type Snapshot = Arc<IndexMap<String, DeviceRecord>>;

/// Persistent registry of devices keyed uniquely by address.
pub struct Registry {
    records: watch::Sender<Snapshot>,
    store: Box<dyn RecordStore>,
    /// Held across build, persist and publish of one mutation.
    write: Mutex<()>,
}

impl Registry {
    /// Load the registry from `store`.
    ///
    /// Duplicate addresses in the stored set keep their first occurrence.
    pub fn open(store: Box<dyn RecordStore>) -> Result<Self, CoreError> {
        let loaded = store.load().map_err(storage_error)?;

        let mut map = IndexMap::with_capacity(loaded.len());
        for record in loaded {
            if map.contains_key(&record.address) {
                warn!(address = %record.address, "duplicate registry entry skipped");
                continue;
            }
            map.insert(record.address.clone(), record);
        }
        debug!(devices = map.len(), "registry loaded");

        let (records, _) = watch::channel(Arc::new(map));
        Ok(Self {
            records,
            store,
            write: Mutex::new(()),
        })
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// The current set (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.records.borrow())
    }

    /// Get notified whenever the set changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.records.subscribe()
    }

    pub fn get(&self, address: &str) -> Option<DeviceRecord> {
        self.records.borrow().get(address).cloned()
    }

    pub fn get_by_index(&self, index: usize) -> Option<DeviceRecord> {
        self.records
            .borrow()
            .get_index(index)
            .map(|(_, record)| record.clone())
    }

    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.records.borrow().get_index_of(address)
    }

    /// Resolve a device by the hardware address in its descriptor.
    pub fn find_by_hardware_address(&self, mac: &HardwareAddress) -> Option<(usize, DeviceRecord)> {
        self.records
            .borrow()
            .values()
            .enumerate()
            .find(|(_, record)| record.has_hardware_address(mac))
            .map(|(index, record)| (index, record.clone()))
    }

    /// Walk records in store order.
    ///
    /// The visitor returns `false` to stop early. Returns how many records
    /// were visited, counting the one that stopped the walk; without a
    /// visitor that is the full count.
    pub fn iterate(&self, mut visitor: Option<&mut dyn FnMut(usize, &DeviceRecord) -> bool>) -> usize {
        let snapshot = self.snapshot();
        let mut visited = 0;
        for (index, record) in snapshot.values().enumerate() {
            visited += 1;
            if let Some(visit) = visitor.as_deref_mut() {
                if !visit(index, record) {
                    break;
                }
            }
        }
        visited
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Register a new device. Returns its index.
    pub fn insert(&self, record: DeviceRecord) -> Result<usize, CoreError> {
        let _write = self.lock_writes();
        let current = self.snapshot();
        if current.contains_key(&record.address) {
            return Err(CoreError::AlreadyExists {
                address: record.address,
            });
        }

        let mut next = IndexMap::clone(&current);
        next.insert(record.address.clone(), record);
        self.persist(&next)?;

        let index = next.len() - 1;
        self.records.send_replace(Arc::new(next));
        Ok(index)
    }

    /// Deregister a device. Returns its former index and record.
    pub fn remove(&self, address: &str) -> Result<(usize, DeviceRecord), CoreError> {
        let _write = self.lock_writes();
        let mut next = IndexMap::clone(&self.snapshot());
        let Some((index, _, record)) = next.shift_remove_full(address) else {
            return Err(CoreError::NotFound {
                address: address.to_owned(),
            });
        };
        self.persist(&next)?;

        self.records.send_replace(Arc::new(next));
        Ok((index, record))
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, records: &IndexMap<String, DeviceRecord>) -> Result<(), CoreError> {
        let ordered: Vec<DeviceRecord> = records.values().cloned().collect();
        self.store.save(&ordered).map_err(storage_error)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("devices", &self.len())
            .finish_non_exhaustive()
    }
}

fn storage_error(err: StoreError) -> CoreError {
    CoreError::Storage {
        message: err.to_string(),
    }
}
