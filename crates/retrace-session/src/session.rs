use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use retrace_types::{CallId, SessionId, Timestamp};

/// One recording session: a named, ordered group of calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    /// Free-form metadata supplied at session start.
    pub metadata: BTreeMap<String, Value>,
    pub started_at: Timestamp,
    /// Set when the session ends; an unset value means the session is
    /// still running (or the process died before ending it).
    pub ended_at: Option<Timestamp>,
    /// Calls recorded under this session, in recording order.
    pub call_ids: Vec<CallId>,
}

impl Session {
    /// Returns `true` while the session has not ended.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Number of calls linked into this session.
    pub fn call_count(&self) -> usize {
        self.call_ids.len()
    }
}
