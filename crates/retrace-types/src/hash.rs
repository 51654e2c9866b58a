use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for a stored value record.
///
/// A `ValueHash` is the domain-separated BLAKE3 digest of a record's
/// canonical payload bytes. Structurally equal values always produce the
/// same `ValueHash`, making records deduplicatable and verifiable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueHash([u8; 32]);

impl ValueHash {
    /// Create a `ValueHash` from a pre-computed digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The null hash (all zeros). Represents "no value".
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the null hash.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ValueHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueHash({})", self.short_hex())
    }
}

impl fmt::Display for ValueHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for ValueHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<ValueHash> for [u8; 32] {
    fn from(hash: ValueHash) -> Self {
        hash.0
    }
}

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"retrace-scalar-v1"`) that is
/// prepended to every hash computation. This prevents cross-kind hash
/// collisions: a sequence and a mapping with identical payload bytes will
/// produce different hashes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for scalar records.
    pub const SCALAR: Self = Self {
        domain: "retrace-scalar-v1",
    };
    /// Hasher for sequence records.
    pub const SEQUENCE: Self = Self {
        domain: "retrace-seq-v1",
    };
    /// Hasher for mapping records.
    pub const MAPPING: Self = Self {
        domain: "retrace-map-v1",
    };
    /// Hasher for typed record (custom object) records.
    pub const RECORD: Self = Self {
        domain: "retrace-record-v1",
    };
    /// Hasher for code-version records.
    pub const CODE: Self = Self {
        domain: "retrace-code-v1",
    };
    /// Hasher for opaque (unrepresentable) sentinel records.
    pub const OPAQUE: Self = Self {
        domain: "retrace-opaque-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ValueHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ValueHash::from_digest(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &ValueHash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
