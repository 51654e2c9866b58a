use std::collections::HashMap;
use std::sync::RwLock;

use retrace_types::ValueHash;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::{RecordPayload, StoredRecord};
use crate::traits::{Inserted, ObjectStore};

struct StoreEntry {
    record: StoredRecord,
    refcount: u64,
}

/// In-memory, HashMap-based object store.
///
/// Intended for tests, embedding, and as the live tier in front of the
/// capture archive. All records are held behind a `RwLock`; the
/// "check hash exists, else insert" sequence runs under one write lock, so
/// concurrent inserts of the same record can neither duplicate the payload
/// nor lose a refcount increment.
pub struct InMemoryObjectStore {
    entries: RwLock<HashMap<ValueHash, StoreEntry>>,
}

impl InMemoryObjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total payload bytes across all stored records.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|e| e.record.size())
            .sum()
    }

    /// Remove all records.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    /// Return a sorted list of all stored hashes.
    pub fn all_hashes(&self) -> Vec<ValueHash> {
        let map = self.entries.read().expect("lock poisoned");
        let mut hashes: Vec<ValueHash> = map.keys().copied().collect();
        hashes.sort();
        hashes
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn insert(&self, record: &StoredRecord) -> StoreResult<Inserted> {
        let hash = record.compute_hash();
        if hash.is_null() {
            return Err(StoreError::NullHash);
        }
        let mut map = self.entries.write().expect("lock poisoned");
        match map.get_mut(&hash) {
            Some(entry) => {
                entry.refcount += 1;
                Ok(Inserted {
                    hash,
                    fresh: false,
                    refcount: entry.refcount,
                })
            }
            None => {
                map.insert(
                    hash,
                    StoreEntry {
                        record: record.clone(),
                        refcount: 1,
                    },
                );
                Ok(Inserted {
                    hash,
                    fresh: true,
                    refcount: 1,
                })
            }
        }
    }

    fn read(&self, hash: &ValueHash) -> StoreResult<Option<StoredRecord>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(hash).map(|e| e.record.clone()))
    }

    fn exists(&self, hash: &ValueHash) -> StoreResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.contains_key(hash))
    }

    fn refcount(&self, hash: &ValueHash) -> StoreResult<u64> {
        let map = self.entries.read().expect("lock poisoned");
        map.get(hash)
            .map(|e| e.refcount)
            .ok_or(StoreError::NotFound(*hash))
    }

    fn acquire(&self, hash: &ValueHash) -> StoreResult<u64> {
        let mut map = self.entries.write().expect("lock poisoned");
        let entry = map.get_mut(hash).ok_or(StoreError::NotFound(*hash))?;
        entry.refcount += 1;
        Ok(entry.refcount)
    }

    fn release(&self, hash: &ValueHash) -> StoreResult<u64> {
        let mut map = self.entries.write().expect("lock poisoned");
        let entry = map.get_mut(hash).ok_or(StoreError::NotFound(*hash))?;
        if entry.refcount == 0 {
            warn!(hash = %hash.short_hex(), "release on refcount-zero record");
            return Ok(0);
        }
        entry.refcount -= 1;
        Ok(entry.refcount)
    }

    fn collect_garbage(&self) -> StoreResult<Vec<ValueHash>> {
        let mut map = self.entries.write().expect("lock poisoned");
        let mut collected = Vec::new();

        loop {
            let dead: Vec<ValueHash> = map
                .iter()
                .filter(|(_, e)| e.refcount == 0)
                .map(|(h, _)| *h)
                .collect();
            if dead.is_empty() {
                break;
            }
            for hash in dead {
                let entry = map.remove(&hash).expect("dead hash vanished");
                // Drop the removed record's hold on its children; any child
                // reaching zero is picked up on the next sweep.
                if let Ok(payload) = RecordPayload::from_record(&entry.record) {
                    for child in payload.child_hashes() {
                        if let Some(child_entry) = map.get_mut(&child) {
                            child_entry.refcount = child_entry.refcount.saturating_sub(1);
                        }
                    }
                }
                collected.push(hash);
            }
        }

        debug!(collected = collected.len(), "garbage collection pass");
        Ok(collected)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("record_count", &self.len())
            .finish()
    }
}
