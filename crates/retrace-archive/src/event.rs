use serde::{Deserialize, Serialize};

use retrace_callgraph::CallRecord;
use retrace_session::Session;
use retrace_store::StoredRecord;
use retrace_trace::LineSnapshot;
use retrace_types::{CallId, Identity, SessionId, Timestamp, ValueHash};

/// The durable mirror of one in-memory mutation.
///
/// Replaying a log of these events in order rebuilds the exact store
/// state: payloads, reference counts, call lifecycles, snapshot streams,
/// version chains, and session membership.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArchiveEvent {
    /// A record was written for the first time.
    RecordStored { record: StoredRecord },
    /// An existing record gained a reference.
    RefAcquired { hash: ValueHash },
    /// A record lost a reference.
    RefReleased { hash: ValueHash },
    /// A garbage collection pass ran.
    GarbageCollected,
    /// An identity's version chain grew by one observation.
    VersionAppended {
        identity: Identity,
        hash: ValueHash,
        timestamp: Timestamp,
    },
    /// A call record was opened.
    CallStarted { record: CallRecord },
    /// An open call closed.
    CallEnded {
        id: CallId,
        return_ref: Option<ValueHash>,
        end_time: Timestamp,
    },
    /// A call was logically removed.
    CallDeleted { id: CallId },
    /// A line snapshot was appended to a call's stream.
    SnapshotAppended { snapshot: LineSnapshot },
    /// A session began.
    SessionStarted { session: Session },
    /// A session ended.
    SessionEnded { id: SessionId, ended_at: Timestamp },
    /// A call was linked into a session.
    CallLinked { session: SessionId, call: CallId },
    /// A call was unlinked from a session (on call deletion).
    CallUnlinked { session: SessionId, call: CallId },
}
