use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use retrace_types::{CallId, SessionId, Timestamp, ValueHash};

/// Lifecycle state of a recorded call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// The call has begun and not yet returned. A call left `Open` by a
    /// dead process is "abandoned", which is not an error.
    Open,
    /// The call returned and its record is complete.
    Closed,
    /// The call was logically removed; only a tombstone remains.
    Deleted,
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One recorded function call.
///
/// Value bindings are stored as references into the object store, never
/// inline. The record is created at call start, completed at call end, and
/// tombstoned on deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    /// The function identity as named by the collector.
    pub function: String,
    /// Source file the call site lives in.
    pub file: String,
    /// Line of the function definition.
    pub line: u32,
    /// Enclosing call within the same logical call stack, if any.
    pub parent_id: Option<CallId>,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    /// Argument/local bindings at call entry, name → value reference.
    pub locals: BTreeMap<String, ValueHash>,
    /// Global bindings the function reads, name → value reference.
    pub globals: BTreeMap<String, ValueHash>,
    /// Reference to the return value, set at close.
    pub return_ref: Option<ValueHash>,
    /// Hash of the code-version record for the function's source.
    pub code_version: Option<ValueHash>,
    /// The session this call was recorded under, if one was active.
    pub session_id: Option<SessionId>,
    pub state: CallState,
}

impl CallRecord {
    /// Returns `true` while the call has not closed.
    pub fn is_open(&self) -> bool {
        self.state == CallState::Open
    }

    /// Returns `true` once the call closed normally.
    pub fn is_closed(&self) -> bool {
        self.state == CallState::Closed
    }

    /// Returns `true` if the call was logically removed.
    pub fn is_deleted(&self) -> bool {
        self.state == CallState::Deleted
    }

    /// Wall-clock duration in milliseconds, once closed.
    pub fn duration_millis(&self) -> Option<i64> {
        self.end_time
            .map(|end| end.as_millis() - self.start_time.as_millis())
    }

    /// Every store hash this record itself references, one entry per
    /// reference. Used to release the record's holds on deletion.
    pub fn referenced_hashes(&self) -> Vec<ValueHash> {
        let mut hashes: Vec<ValueHash> = self.locals.values().copied().collect();
        hashes.extend(self.globals.values().copied());
        hashes.extend(self.return_ref);
        hashes.extend(self.code_version);
        hashes
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} at {}:{} ({}, {})",
            self.function,
            self.file,
            self.line,
            self.state,
            self.id.short_id(),
        )
    }
}

/// Everything needed to open a call record.
#[derive(Clone, Debug)]
pub struct CallStartInfo {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub parent_id: Option<CallId>,
    pub start_time: Timestamp,
    pub locals: BTreeMap<String, ValueHash>,
    pub globals: BTreeMap<String, ValueHash>,
    pub code_version: Option<ValueHash>,
    pub session_id: Option<SessionId>,
}

impl CallStartInfo {
    /// Minimal info for a root call starting now.
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
            parent_id: None,
            start_time: Timestamp::now(),
            locals: BTreeMap::new(),
            globals: BTreeMap::new(),
            code_version: None,
            session_id: None,
        }
    }

    /// Set the enclosing call.
    pub fn with_parent(mut self, parent: CallId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Set an explicit start time.
    pub fn at(mut self, start: Timestamp) -> Self {
        self.start_time = start;
        self
    }

    /// Set the entry bindings.
    pub fn with_locals(mut self, locals: BTreeMap<String, ValueHash>) -> Self {
        self.locals = locals;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> ValueHash {
        ValueHash::from_digest([byte; 32])
    }

    fn record() -> CallRecord {
        let mut locals = BTreeMap::new();
        locals.insert("x".to_string(), hash(1));
        locals.insert("y".to_string(), hash(2));
        CallRecord {
            id: CallId::new(),
            function: "compute".into(),
            file: "demo.py".into(),
            line: 10,
            parent_id: None,
            start_time: Timestamp::from_millis(1000),
            end_time: Some(Timestamp::from_millis(1250)),
            locals,
            globals: BTreeMap::new(),
            return_ref: Some(hash(3)),
            code_version: Some(hash(4)),
            session_id: None,
            state: CallState::Closed,
        }
    }

    #[test]
    fn state_predicates() {
        let mut rec = record();
        assert!(rec.is_closed());
        rec.state = CallState::Open;
        assert!(rec.is_open());
        rec.state = CallState::Deleted;
        assert!(rec.is_deleted());
    }

    #[test]
    fn duration_requires_end_time() {
        let mut rec = record();
        assert_eq!(rec.duration_millis(), Some(250));
        rec.end_time = None;
        assert_eq!(rec.duration_millis(), None);
    }

    #[test]
    fn referenced_hashes_covers_all_slots() {
        let rec = record();
        let refs = rec.referenced_hashes();
        assert_eq!(refs.len(), 4); // two locals + return + code version
        assert!(refs.contains(&hash(1)));
        assert!(refs.contains(&hash(3)));
        assert!(refs.contains(&hash(4)));
    }

    #[test]
    fn summary_contains_key_info() {
        let summary = record().summary();
        assert!(summary.contains("compute"));
        assert!(summary.contains("demo.py:10"));
        assert!(summary.contains("closed"));
    }

    #[test]
    fn start_info_builder() {
        let parent = CallId::new();
        let info = CallStartInfo::new("f", "mod.py", 3)
            .with_parent(parent)
            .at(Timestamp::from_millis(5));
        assert_eq!(info.parent_id, Some(parent));
        assert_eq!(info.start_time, Timestamp::from_millis(5));
    }

    #[test]
    fn call_state_display() {
        assert_eq!(format!("{}", CallState::Open), "open");
        assert_eq!(format!("{}", CallState::Deleted), "deleted");
    }
}
