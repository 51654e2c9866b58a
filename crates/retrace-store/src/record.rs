use serde::{Deserialize, Serialize};

use retrace_types::{ContentHasher, ValueHash};

use crate::error::{StoreError, StoreResult};
use crate::value::ScalarValue;

/// The kind of record stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// A leaf scalar value.
    Scalar,
    /// Ordered children (list/tuple).
    Sequence,
    /// Name → child pairs (dict).
    Mapping,
    /// An instance of a custom type, captured as named fields.
    Record,
    /// A captured code definition (function or class source).
    Code,
    /// Sentinel for a value that could not be encoded faithfully.
    Opaque,
}

impl RecordKind {
    /// The domain-separated hasher for this kind.
    pub fn hasher(&self) -> ContentHasher {
        match self {
            Self::Scalar => ContentHasher::SCALAR,
            Self::Sequence => ContentHasher::SEQUENCE,
            Self::Mapping => ContentHasher::MAPPING,
            Self::Record => ContentHasher::RECORD,
            Self::Code => ContentHasher::CODE,
            Self::Opaque => ContentHasher::OPAQUE,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Sequence => write!(f, "sequence"),
            Self::Mapping => write!(f, "mapping"),
            Self::Record => write!(f, "record"),
            Self::Code => write!(f, "code"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

/// Reference to a composite record's child.
///
/// Acyclic children are referenced by content hash. A back-edge to a
/// container still being stored cannot be a hash (a hash cannot contain
/// itself), so it is encoded as `Backref(k)`: the container `k` levels up
/// the enclosing traversal, with `Backref(0)` meaning the container itself.
/// Back-references are resolved against the materialization stack at
/// reconstruction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildRef {
    Hash(ValueHash),
    Backref(u32),
}

/// Typed view of a record's canonical payload bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RecordPayload {
    Scalar(ScalarValue),
    Sequence(Vec<ChildRef>),
    /// Entries sorted by name for deterministic hashing.
    Mapping(Vec<(String, ChildRef)>),
    /// Fields sorted by name for deterministic hashing.
    Record {
        type_name: String,
        fields: Vec<(String, ChildRef)>,
    },
    Code(CodeDescriptor),
    Opaque { type_name: String, reason: String },
}

impl RecordPayload {
    /// The record kind this payload encodes to.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Scalar(_) => RecordKind::Scalar,
            Self::Sequence(_) => RecordKind::Sequence,
            Self::Mapping(_) => RecordKind::Mapping,
            Self::Record { .. } => RecordKind::Record,
            Self::Code(_) => RecordKind::Code,
            Self::Opaque { .. } => RecordKind::Opaque,
        }
    }

    /// Encode into a [`StoredRecord`] (canonical bincode bytes).
    pub fn to_record(&self) -> StoreResult<StoredRecord> {
        let data =
            bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredRecord::new(self.kind(), data))
    }

    /// Decode from a [`StoredRecord`], verifying the kind tag.
    pub fn from_record(record: &StoredRecord) -> StoreResult<Self> {
        let payload: Self = bincode::deserialize(&record.data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if payload.kind() != record.kind {
            return Err(StoreError::CorruptRecord {
                hash: record.compute_hash(),
                reason: format!("kind tag {} does not match payload {}", record.kind, payload.kind()),
            });
        }
        Ok(payload)
    }

    /// All hash children, one entry per reference (back-edges excluded).
    pub fn child_hashes(&self) -> Vec<ValueHash> {
        match self {
            Self::Sequence(children) => collect_hashes(children.iter()),
            Self::Mapping(entries) => collect_hashes(entries.iter().map(|(_, c)| c)),
            Self::Record { fields, .. } => collect_hashes(fields.iter().map(|(_, c)| c)),
            _ => Vec::new(),
        }
    }
}

fn collect_hashes<'a>(refs: impl Iterator<Item = &'a ChildRef>) -> Vec<ValueHash> {
    refs.filter_map(|c| match c {
        ChildRef::Hash(h) => Some(*h),
        ChildRef::Backref(_) => None,
    })
    .collect()
}

/// A stored record: kind tag + canonical payload bytes.
///
/// `StoredRecord` is the unit of storage. The store never interprets the
/// payload — it is a pure key-value store keyed by content hash. Reference
/// counts live in the store entry, not here, so structural equality stays
/// purely content-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The kind of this record.
    pub kind: RecordKind,
    /// Canonical bincode-serialized payload bytes.
    pub data: Vec<u8>,
}

impl StoredRecord {
    /// Create a record from kind and payload bytes.
    pub fn new(kind: RecordKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Compute the content hash using the kind's domain-separated hasher.
    pub fn compute_hash(&self) -> ValueHash {
        self.kind.hasher().hash(&self.data)
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A captured code definition, stored as a distinguished record kind.
///
/// The content hash of the encoded descriptor is the `code_version`
/// referenced by call records, so two calls of an unchanged function share
/// one code record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDescriptor {
    /// The source text of the definition.
    pub content: String,
    /// Full module path where the definition lives.
    pub module_path: String,
    /// Enclosing class name, if the definition is a method.
    pub class_name: Option<String>,
    /// Line offset of the definition within its file.
    pub first_line_no: Option<u32>,
}

impl CodeDescriptor {
    /// Encode into a stored record.
    pub fn to_record(&self) -> StoreResult<StoredRecord> {
        RecordPayload::Code(self.clone()).to_record()
    }

    /// Decode from a stored record.
    pub fn from_record(record: &StoredRecord) -> StoreResult<Self> {
        match RecordPayload::from_record(record)? {
            RecordPayload::Code(descriptor) => Ok(descriptor),
            other => Err(StoreError::CorruptRecord {
                hash: record.compute_hash(),
                reason: format!("expected code, got {}", other.kind()),
            }),
        }
    }
}
