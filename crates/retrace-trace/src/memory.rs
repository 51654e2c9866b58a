use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use retrace_types::{CallId, SnapshotId, Timestamp, ValueHash};

use crate::error::{TraceError, TraceResult};
use crate::snapshot::LineSnapshot;

/// In-memory snapshot log.
///
/// One append-only `Vec` per call behind a `RwLock`. Appends assign the
/// sequence number under the write lock, so snapshots within one call are
/// totally ordered even under concurrent writers; ordering across calls is
/// deliberately unspecified.
pub struct InMemoryTraceLog {
    streams: RwLock<HashMap<CallId, Vec<LineSnapshot>>>,
}

impl InMemoryTraceLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Append a snapshot to a call's stream and return it.
    ///
    /// The sequence number is the count of snapshots already recorded for
    /// the call. Lifecycle enforcement (the call being open) is the
    /// recorder boundary's job — the log itself is a dumb ordered stream.
    pub fn append(
        &self,
        call_id: CallId,
        line: u32,
        locals: BTreeMap<String, ValueHash>,
        globals: BTreeMap<String, ValueHash>,
        timestamp: Timestamp,
    ) -> LineSnapshot {
        let mut streams = self.streams.write().expect("lock poisoned");
        let stream = streams.entry(call_id).or_default();
        let snapshot = LineSnapshot {
            id: SnapshotId::new(),
            call_id,
            seq: stream.len() as u64,
            line,
            locals,
            globals,
            timestamp,
        };
        stream.push(snapshot.clone());
        snapshot
    }

    /// Reinstate a snapshot exactly as previously persisted, preserving its
    /// id and sequence number. Used by archive recovery only; the caller
    /// replays snapshots in their original per-call order.
    pub fn restore(&self, snapshot: LineSnapshot) {
        let mut streams = self.streams.write().expect("lock poisoned");
        streams.entry(snapshot.call_id).or_default().push(snapshot);
    }

    /// The ordered snapshot stream of a call.
    ///
    /// The returned vector is a snapshot of the stream: restartable and
    /// unaffected by later appends. A call with no snapshots yields an
    /// empty stream (line capture may simply be off), not an error.
    pub fn snapshots(&self, call_id: CallId) -> Vec<LineSnapshot> {
        let streams = self.streams.read().expect("lock poisoned");
        streams.get(&call_id).cloned().unwrap_or_default()
    }

    /// Number of snapshots recorded for a call.
    pub fn snapshot_count(&self, call_id: CallId) -> usize {
        let streams = self.streams.read().expect("lock poisoned");
        streams.get(&call_id).map(Vec::len).unwrap_or(0)
    }

    /// The most recent snapshot of a call.
    pub fn last_snapshot(&self, call_id: CallId) -> TraceResult<LineSnapshot> {
        let streams = self.streams.read().expect("lock poisoned");
        streams
            .get(&call_id)
            .and_then(|s| s.last())
            .cloned()
            .ok_or(TraceError::NotFound(call_id))
    }

    /// Detach and return a call's entire stream, for call deletion.
    pub fn remove_call(&self, call_id: CallId) -> Vec<LineSnapshot> {
        let mut streams = self.streams.write().expect("lock poisoned");
        streams.remove(&call_id).unwrap_or_default()
    }

    /// Number of calls with at least one snapshot.
    pub fn len(&self) -> usize {
        self.streams.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no snapshots are recorded at all.
    pub fn is_empty(&self) -> bool {
        self.streams.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryTraceLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTraceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTraceLog")
            .field("call_count", &self.len())
            .finish()
    }
}
