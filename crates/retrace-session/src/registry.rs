use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value;

use retrace_types::{CallId, SessionId, Timestamp};

use crate::error::{SessionError, SessionResult};
use crate::session::Session;

/// In-memory session registry.
pub struct InMemorySessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new session and return its id.
    pub fn start(
        &self,
        name: impl Into<String>,
        metadata: BTreeMap<String, Value>,
        started_at: Timestamp,
    ) -> SessionId {
        let session = Session {
            id: SessionId::new(),
            name: name.into(),
            metadata,
            started_at,
            ended_at: None,
            call_ids: Vec::new(),
        };
        let id = session.id;
        self.sessions
            .write()
            .expect("lock poisoned")
            .insert(id, session);
        id
    }

    /// Reinstate a session exactly as previously persisted. Used by
    /// archive recovery only.
    pub fn restore(&self, session: Session) {
        self.sessions
            .write()
            .expect("lock poisoned")
            .insert(session.id, session);
    }

    /// End a session, stamping its end time.
    pub fn end(&self, id: SessionId, ended_at: Timestamp) -> SessionResult<()> {
        let mut sessions = self.sessions.write().expect("lock poisoned");
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        if session.ended_at.is_some() {
            return Err(SessionError::AlreadyEnded(id));
        }
        session.ended_at = Some(ended_at);
        Ok(())
    }

    /// Append a call to a session's ordered list. O(1) amortized.
    pub fn link_call(&self, id: SessionId, call: CallId) -> SessionResult<()> {
        let mut sessions = self.sessions.write().expect("lock poisoned");
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.call_ids.push(call);
        Ok(())
    }

    /// Remove a call from a session, preserving the order of the rest.
    /// Used when the call itself is deleted.
    pub fn unlink_call(&self, id: SessionId, call: CallId) -> SessionResult<()> {
        let mut sessions = self.sessions.write().expect("lock poisoned");
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.call_ids.retain(|c| *c != call);
        Ok(())
    }

    /// Fetch a session by id.
    pub fn session(&self, id: SessionId) -> SessionResult<Session> {
        let sessions = self.sessions.read().expect("lock poisoned");
        sessions.get(&id).cloned().ok_or(SessionError::NotFound(id))
    }

    /// All sessions, ordered by start time.
    pub fn sessions(&self) -> Vec<Session> {
        let sessions = self.sessions.read().expect("lock poisoned");
        let mut all: Vec<Session> = sessions.values().cloned().collect();
        all.sort_by(|a, b| (a.started_at, a.id).cmp(&(b.started_at, b.id)));
        all
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no session exists.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemorySessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemorySessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionRegistry")
            .field("session_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_session(name: &str) -> (InMemorySessionRegistry, SessionId) {
        let registry = InMemorySessionRegistry::new();
        let id = registry.start(name, BTreeMap::new(), Timestamp::from_millis(100));
        (registry, id)
    }

    #[test]
    fn start_and_fetch() {
        let (registry, id) = registry_with_session("run-1");
        let session = registry.session(id).unwrap();
        assert_eq!(session.name, "run-1");
        assert!(session.is_active());
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn end_stamps_time() {
        let (registry, id) = registry_with_session("run-1");
        registry.end(id, Timestamp::from_millis(500)).unwrap();
        let session = registry.session(id).unwrap();
        assert_eq!(session.ended_at, Some(Timestamp::from_millis(500)));
        assert!(!session.is_active());
    }

    #[test]
    fn double_end_fails() {
        let (registry, id) = registry_with_session("run-1");
        registry.end(id, Timestamp::from_millis(500)).unwrap();
        let err = registry.end(id, Timestamp::from_millis(600)).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyEnded(_)));
    }

    #[test]
    fn unknown_session_is_not_found() {
        let registry = InMemorySessionRegistry::new();
        assert!(matches!(
            registry.session(SessionId::new()),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            registry.end(SessionId::new(), Timestamp::from_millis(1)),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn link_preserves_order() {
        let (registry, id) = registry_with_session("run-1");
        let calls: Vec<CallId> = (0..5).map(|_| CallId::new()).collect();
        for call in &calls {
            registry.link_call(id, *call).unwrap();
        }
        assert_eq!(registry.session(id).unwrap().call_ids, calls);
    }

    #[test]
    fn unlink_removes_only_target() {
        let (registry, id) = registry_with_session("run-1");
        let a = CallId::new();
        let b = CallId::new();
        let c = CallId::new();
        for call in [a, b, c] {
            registry.link_call(id, call).unwrap();
        }

        registry.unlink_call(id, b).unwrap();
        assert_eq!(registry.session(id).unwrap().call_ids, vec![a, c]);
    }

    #[test]
    fn metadata_round_trips() {
        let registry = InMemorySessionRegistry::new();
        let metadata = BTreeMap::from([
            ("player".to_string(), Value::String("p1".into())),
            ("level".to_string(), Value::from(3)),
        ]);
        let id = registry.start("game", metadata.clone(), Timestamp::from_millis(1));
        assert_eq!(registry.session(id).unwrap().metadata, metadata);
    }

    #[test]
    fn sessions_are_ordered_by_start() {
        let registry = InMemorySessionRegistry::new();
        let late = registry.start("late", BTreeMap::new(), Timestamp::from_millis(300));
        let early = registry.start("early", BTreeMap::new(), Timestamp::from_millis(100));

        let ids: Vec<SessionId> = registry.sessions().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![early, late]);
    }

    #[test]
    fn concurrent_linking_is_safe() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(InMemorySessionRegistry::new());
        let id = registry.start("hot", BTreeMap::new(), Timestamp::from_millis(1));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.link_call(id, CallId::new()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.session(id).unwrap().call_count(), 800);
    }
}
