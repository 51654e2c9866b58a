//! Content-addressed, deduplicated value storage.
//!
//! The object store holds immutable structural value records keyed by their
//! content hash. Storing a value walks its [`ValueGraph`] depth-first,
//! children before parents, so that child hashes become part of each
//! parent's canonical encoding. Two structurally equal values always hash
//! identically and are stored exactly once; repeated insertion only bumps a
//! reference count.
//!
//! Cycles are supported: a back-edge to a container still being stored is
//! encoded as a [`ChildRef::Backref`] relative to the enclosing traversal,
//! because a content hash cannot contain itself.

pub mod encode;
pub mod error;
pub mod memory;
pub mod record;
pub mod traits;
pub mod value;

pub use encode::store_value;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use record::{ChildRef, CodeDescriptor, RecordKind, RecordPayload, StoredRecord};
pub use traits::{Inserted, ObjectStore};
pub use value::{NodeId, ScalarValue, ValueGraph, ValueNode};
