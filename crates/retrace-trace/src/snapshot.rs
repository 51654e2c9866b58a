use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use retrace_types::{CallId, SnapshotId, Timestamp, ValueHash};

/// The recorded state of one executed line within a call.
///
/// Immutable once appended. Bindings are references into the object store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub id: SnapshotId,
    /// The call this snapshot belongs to.
    pub call_id: CallId,
    /// Position within the call's stream, starting at 0.
    pub seq: u64,
    /// The executed line.
    pub line: u32,
    /// Local bindings at the line, name → value reference.
    pub locals: BTreeMap<String, ValueHash>,
    /// Global bindings at the line, name → value reference.
    pub globals: BTreeMap<String, ValueHash>,
    pub timestamp: Timestamp,
}

impl LineSnapshot {
    /// Every store hash this snapshot references, one entry per reference.
    pub fn referenced_hashes(&self) -> Vec<ValueHash> {
        let mut hashes: Vec<ValueHash> = self.locals.values().copied().collect();
        hashes.extend(self.globals.values().copied());
        hashes
    }
}
