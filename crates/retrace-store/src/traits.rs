use retrace_types::ValueHash;

use crate::error::{StoreError, StoreResult};
use crate::record::StoredRecord;

/// Outcome of an insert-if-absent operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inserted {
    /// The content hash of the record.
    pub hash: ValueHash,
    /// `true` if the payload was written, `false` if it already existed.
    pub fresh: bool,
    /// The reference count after this insert.
    pub refcount: u64,
}

/// Content-addressed, refcounted object store.
///
/// All implementations must satisfy these invariants:
/// - Records are immutable once written; content-addressing guarantees the
///   same payload always produces the same hash.
/// - `insert` is one atomic operation per hash: concurrent inserts of the
///   same record never duplicate the payload or lose a refcount increment.
/// - Concurrent reads are always safe (records are immutable).
/// - The store never interprets record payloads.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Insert a record if absent, otherwise increment its refcount.
    fn insert(&self, record: &StoredRecord) -> StoreResult<Inserted>;

    /// Read a record by content hash.
    ///
    /// Returns `Ok(None)` if the record does not exist (never written, or
    /// garbage-collected).
    fn read(&self, hash: &ValueHash) -> StoreResult<Option<StoredRecord>>;

    /// Check whether a record exists.
    fn exists(&self, hash: &ValueHash) -> StoreResult<bool>;

    /// The current reference count of a record. Fails `NotFound` if absent.
    fn refcount(&self, hash: &ValueHash) -> StoreResult<u64>;

    /// Increment a record's refcount. Fails `NotFound` if absent.
    fn acquire(&self, hash: &ValueHash) -> StoreResult<u64>;

    /// Decrement a record's refcount. Fails `NotFound` if absent.
    ///
    /// A count reaching zero makes the record eligible for garbage
    /// collection; collection itself is deferred to [`Self::collect_garbage`].
    fn release(&self, hash: &ValueHash) -> StoreResult<u64>;

    /// Remove every refcount-zero record, releasing its children in the
    /// same pass (cascading to a fixpoint). Returns the collected hashes.
    fn collect_garbage(&self) -> StoreResult<Vec<ValueHash>>;

    /// Read a record, failing `NotFound` if absent.
    fn get(&self, hash: &ValueHash) -> StoreResult<StoredRecord> {
        self.read(hash)?.ok_or(StoreError::NotFound(*hash))
    }

    /// Read multiple records in a batch.
    ///
    /// Default implementation calls `read()` for each hash. Backends may
    /// override for better performance.
    fn read_batch(&self, hashes: &[ValueHash]) -> StoreResult<Vec<Option<StoredRecord>>> {
        hashes.iter().map(|h| self.read(h)).collect()
    }
}
