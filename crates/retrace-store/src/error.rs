use retrace_types::ValueHash;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record was not found (absent or garbage-collected).
    #[error("record not found: {0}")]
    NotFound(ValueHash),

    /// The record data is malformed or cannot be decoded.
    #[error("corrupt record {hash}: {reason}")]
    CorruptRecord { hash: ValueHash, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Attempted to insert a record hashing to the null hash.
    #[error("cannot store record with null hash")]
    NullHash,

    /// The value graph handed in by the collector is inconsistent.
    #[error("malformed value graph: {0}")]
    MalformedGraph(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
