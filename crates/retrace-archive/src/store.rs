use std::sync::Arc;

use retrace_store::{Inserted, ObjectStore, StoreError, StoreResult, StoredRecord};
use retrace_types::ValueHash;

use crate::error::ArchiveError;
use crate::event::ArchiveEvent;
use crate::log::CaptureLog;

/// Object store decorator that mirrors every mutation into the archive.
///
/// Reads pass straight through. Fresh inserts, refcount changes, and
/// garbage collection passes each append one [`ArchiveEvent`], so a
/// recovered log rebuilds the wrapped store exactly — payloads and
/// reference counts both.
pub struct ArchivingStore {
    inner: Arc<dyn ObjectStore>,
    log: Arc<CaptureLog>,
}

impl ArchivingStore {
    /// Wrap a store so its mutations are archived.
    pub fn new(inner: Arc<dyn ObjectStore>, log: Arc<CaptureLog>) -> Self {
        Self { inner, log }
    }

    fn log_event(&self, event: &ArchiveEvent) -> StoreResult<()> {
        self.log.append(event).map_err(|e| match e {
            ArchiveError::Io(io) => StoreError::Io(io),
            ArchiveError::Serialization(msg) => StoreError::Serialization(msg),
        })?;
        Ok(())
    }
}

impl ObjectStore for ArchivingStore {
    fn insert(&self, record: &StoredRecord) -> StoreResult<Inserted> {
        let inserted = self.inner.insert(record)?;
        if inserted.fresh {
            self.log_event(&ArchiveEvent::RecordStored {
                record: record.clone(),
            })?;
        } else {
            self.log_event(&ArchiveEvent::RefAcquired {
                hash: inserted.hash,
            })?;
        }
        Ok(inserted)
    }

    fn read(&self, hash: &ValueHash) -> StoreResult<Option<StoredRecord>> {
        self.inner.read(hash)
    }

    fn exists(&self, hash: &ValueHash) -> StoreResult<bool> {
        self.inner.exists(hash)
    }

    fn refcount(&self, hash: &ValueHash) -> StoreResult<u64> {
        self.inner.refcount(hash)
    }

    fn acquire(&self, hash: &ValueHash) -> StoreResult<u64> {
        let count = self.inner.acquire(hash)?;
        self.log_event(&ArchiveEvent::RefAcquired { hash: *hash })?;
        Ok(count)
    }

    fn release(&self, hash: &ValueHash) -> StoreResult<u64> {
        let count = self.inner.release(hash)?;
        self.log_event(&ArchiveEvent::RefReleased { hash: *hash })?;
        Ok(count)
    }

    fn collect_garbage(&self) -> StoreResult<Vec<ValueHash>> {
        let collected = self.inner.collect_garbage()?;
        self.log_event(&ArchiveEvent::GarbageCollected)?;
        Ok(collected)
    }
}

impl std::fmt::Debug for ArchivingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivingStore")
            .field("log", &self.log.path())
            .finish()
    }
}
