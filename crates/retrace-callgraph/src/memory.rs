use std::collections::HashMap;
use std::sync::RwLock;

use retrace_types::{CallId, SessionId, Timestamp, ValueHash};
use tracing::debug;

use crate::call::{CallRecord, CallStartInfo, CallState};
use crate::error::{CallError, CallResult};

/// In-memory call graph store.
///
/// Records live in a `HashMap` behind a `RwLock`; every state transition
/// runs under one write lock, so interleaved calls from concurrent threads
/// cannot corrupt a record's lifecycle. Deleted calls remain as tombstones
/// so late references resolve to `NotFound` rather than dangling.
pub struct InMemoryCallGraph {
    calls: RwLock<HashMap<CallId, CallRecord>>,
}

impl InMemoryCallGraph {
    /// Create a new empty call graph.
    pub fn new() -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
        }
    }

    /// Open a call record, validating the call-tree invariant against the
    /// parent if one is given.
    pub fn begin_call(&self, info: CallStartInfo) -> CallResult<CallId> {
        let mut calls = self.calls.write().expect("lock poisoned");

        if let Some(parent_id) = info.parent_id {
            let parent = calls
                .get(&parent_id)
                .filter(|p| !p.is_deleted())
                .ok_or(CallError::NotFound(parent_id))?;
            if parent.start_time.is_after(&info.start_time) {
                return Err(CallError::InvalidNesting {
                    reason: format!(
                        "child starts at {} before parent {} started at {}",
                        info.start_time, parent_id, parent.start_time
                    ),
                });
            }
            if let Some(parent_end) = parent.end_time {
                if info.start_time.is_after(&parent_end) {
                    return Err(CallError::InvalidNesting {
                        reason: format!(
                            "child starts at {} after parent {} ended at {}",
                            info.start_time, parent_id, parent_end
                        ),
                    });
                }
            }
        }

        let id = CallId::new();
        let record = CallRecord {
            id,
            function: info.function,
            file: info.file,
            line: info.line,
            parent_id: info.parent_id,
            start_time: info.start_time,
            end_time: None,
            locals: info.locals,
            globals: info.globals,
            return_ref: None,
            code_version: info.code_version,
            session_id: info.session_id,
            state: CallState::Open,
        };
        debug!(call = %id, function = %record.function, "call opened");
        calls.insert(id, record);
        Ok(id)
    }

    /// Close an open call with its return reference.
    pub fn end_call(
        &self,
        id: CallId,
        return_ref: Option<ValueHash>,
        end_time: Timestamp,
    ) -> CallResult<()> {
        let mut calls = self.calls.write().expect("lock poisoned");

        let record = calls.get(&id).ok_or(CallError::NotFound(id))?;
        if record.state != CallState::Open {
            return Err(CallError::InvalidState {
                id,
                actual: record.state,
                expected: CallState::Open,
            });
        }
        if record.start_time.is_after(&end_time) {
            return Err(CallError::InvalidNesting {
                reason: format!(
                    "call {id} would end at {end_time} before it started at {}",
                    record.start_time
                ),
            });
        }

        // A closed parent's interval must still encompass this call.
        if let Some(parent_id) = record.parent_id {
            if let Some(parent_end) = calls
                .get(&parent_id)
                .filter(|p| p.is_closed())
                .and_then(|p| p.end_time)
            {
                if end_time.is_after(&parent_end) {
                    return Err(CallError::InvalidNesting {
                        reason: format!(
                            "call {id} would end at {end_time} after parent {parent_id} ended at {parent_end}"
                        ),
                    });
                }
            }
        }

        // And this call's interval must encompass every closed child.
        for child in calls.values() {
            if child.parent_id == Some(id) && child.is_closed() {
                if let Some(child_end) = child.end_time {
                    if child_end.is_after(&end_time) {
                        return Err(CallError::InvalidNesting {
                            reason: format!(
                                "call {id} would end at {end_time} before child {} ended at {child_end}",
                                child.id
                            ),
                        });
                    }
                }
            }
        }

        let record = calls.get_mut(&id).expect("checked above");
        record.return_ref = return_ref;
        record.end_time = Some(end_time);
        record.state = CallState::Closed;
        debug!(call = %id, "call closed");
        Ok(())
    }

    /// Fetch a call record. Deleted calls are `NotFound`.
    pub fn call(&self, id: CallId) -> CallResult<CallRecord> {
        let calls = self.calls.read().expect("lock poisoned");
        calls
            .get(&id)
            .filter(|c| !c.is_deleted())
            .cloned()
            .ok_or(CallError::NotFound(id))
    }

    /// Logically remove a call: `{Open, Closed} → Deleted`.
    ///
    /// Children are detached (`parent_id = None`), preserving their data —
    /// deletion never cascades. The pre-deletion record is returned so the
    /// caller can release every hash it referenced.
    pub fn remove(&self, id: CallId) -> CallResult<CallRecord> {
        let mut calls = self.calls.write().expect("lock poisoned");

        let record = calls
            .get(&id)
            .filter(|c| !c.is_deleted())
            .cloned()
            .ok_or(CallError::NotFound(id))?;

        for child in calls.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = None;
            }
        }
        let tombstone = calls.get_mut(&id).expect("checked above");
        tombstone.state = CallState::Deleted;
        tombstone.locals.clear();
        tombstone.globals.clear();
        tombstone.return_ref = None;
        tombstone.code_version = None;

        debug!(call = %id, "call deleted");
        Ok(record)
    }

    /// Reinstate a record exactly as previously persisted, validation
    /// already having passed when it was first recorded. Used by archive
    /// recovery only.
    pub fn restore(&self, record: CallRecord) {
        let mut calls = self.calls.write().expect("lock poisoned");
        calls.insert(record.id, record);
    }

    /// Attach a call to a session after the fact.
    pub fn set_session(&self, id: CallId, session: SessionId) -> CallResult<()> {
        let mut calls = self.calls.write().expect("lock poisoned");
        let record = calls
            .get_mut(&id)
            .filter(|c| !c.is_deleted())
            .ok_or(CallError::NotFound(id))?;
        record.session_id = Some(session);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Queries (deleted calls are never returned)
    // ---------------------------------------------------------------

    /// All live calls, ordered by start time.
    pub fn all_calls(&self) -> Vec<CallRecord> {
        self.find_calls(|_| true)
    }

    /// Calls of one function, ordered by start time.
    pub fn calls_for_function(&self, function: &str) -> Vec<CallRecord> {
        self.find_calls(|c| c.function == function)
    }

    /// Calls whose call site lives in one file, ordered by start time.
    pub fn calls_in_file(&self, file: &str) -> Vec<CallRecord> {
        self.find_calls(|c| c.file == file)
    }

    /// Calls that started within `[from, to]`, ordered by start time.
    pub fn calls_between(&self, from: Timestamp, to: Timestamp) -> Vec<CallRecord> {
        self.find_calls(|c| c.start_time >= from && c.start_time <= to)
    }

    /// Calls recorded under one session, ordered by start time.
    pub fn calls_in_session(&self, session: SessionId) -> Vec<CallRecord> {
        self.find_calls(|c| c.session_id == Some(session))
    }

    /// Direct children of a call, ordered by start time.
    pub fn children_of(&self, id: CallId) -> Vec<CallRecord> {
        self.find_calls(|c| c.parent_id == Some(id))
    }

    /// Calls still open. Readers should treat these as abandoned when the
    /// recording process is known to have exited.
    pub fn open_calls(&self) -> Vec<CallRecord> {
        self.find_calls(|c| c.is_open())
    }

    /// All live calls matching a predicate, ordered by start time.
    pub fn find_calls(&self, predicate: impl Fn(&CallRecord) -> bool) -> Vec<CallRecord> {
        let calls = self.calls.read().expect("lock poisoned");
        let mut matched: Vec<CallRecord> = calls
            .values()
            .filter(|c| !c.is_deleted() && predicate(c))
            .cloned()
            .collect();
        matched.sort_by(|a, b| (a.start_time, a.id).cmp(&(b.start_time, b.id)));
        matched
    }

    /// Number of live (non-deleted) calls.
    pub fn len(&self) -> usize {
        let calls = self.calls.read().expect("lock poisoned");
        calls.values().filter(|c| !c.is_deleted()).count()
    }

    /// Returns `true` if no live call exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCallGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryCallGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCallGraph")
            .field("call_count", &self.len())
            .finish()
    }
}
