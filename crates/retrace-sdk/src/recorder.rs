use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::warn;

use retrace_archive::{ArchiveEvent, ArchivingStore, CaptureLog, Durability};
use retrace_callgraph::{CallError, CallRecord, CallStartInfo, CallState, InMemoryCallGraph};
use retrace_diff::{diff_snapshots, BindingDiff};
use retrace_gate::RecordingGate;
use retrace_reanimate::{LiveValue, ReanimatedCall, Resolver};
use retrace_session::{InMemorySessionRegistry, Session};
use retrace_store::{store_value, CodeDescriptor, InMemoryObjectStore, ObjectStore};
use retrace_timeline::{InMemoryTimeline, VersionHistory, VersionQuery};
use retrace_trace::{InMemoryTraceLog, LineSnapshot, TraceError};
use retrace_types::{CallId, Identity, SessionId, SnapshotId, Timestamp, ValueHash};

use crate::error::SdkResult;
use crate::events::{CallEnd, CallStart, CaptureEvent, CapturedValue, LineCapture};

/// The recorder: everything the collector and consumers talk to.
///
/// Owns the object store, version timeline, call graph, snapshot log, and
/// session registry, plus the recording gate the collector consults. With
/// [`Recorder::open_durable`] every mutation is additionally mirrored into
/// a capture archive and the full state is rebuilt from it on open.
pub struct Recorder {
    gate: RecordingGate,
    store: Arc<dyn ObjectStore>,
    timeline: InMemoryTimeline,
    calls: InMemoryCallGraph,
    trace: InMemoryTraceLog,
    sessions: InMemorySessionRegistry,
    log: Option<Arc<CaptureLog>>,
    current_session: RwLock<Option<SessionId>>,
}

impl Recorder {
    /// A recorder with no durable archive. History lives as long as the
    /// recorder does; suitable for tests and short-lived tooling.
    pub fn in_memory() -> Self {
        Self::assemble(Arc::new(InMemoryObjectStore::new()), None)
    }

    /// Open a durable recorder at the given archive path, rebuilding any
    /// previously captured history by replaying the archive.
    ///
    /// Recovered sessions are history: none is re-activated, so calls
    /// recorded after reopening only link to a session started afresh.
    pub fn open_durable(path: &Path) -> SdkResult<Self> {
        Self::open_durable_with(path, Durability::Buffered)
    }

    /// Like [`Self::open_durable`] with an explicit durability mode.
    pub fn open_durable_with(path: &Path, durability: Durability) -> SdkResult<Self> {
        let log = Arc::new(CaptureLog::open(path, durability)?);

        let base = Arc::new(InMemoryObjectStore::new());
        let recorder = Self::assemble(
            Arc::new(ArchivingStore::new(
                Arc::clone(&base) as Arc<dyn ObjectStore>,
                Arc::clone(&log),
            )),
            Some(Arc::clone(&log)),
        );
        for event in log.recover()? {
            recorder.replay(&base, event);
        }
        Ok(recorder)
    }

    fn assemble(store: Arc<dyn ObjectStore>, log: Option<Arc<CaptureLog>>) -> Self {
        Self {
            gate: RecordingGate::new(),
            store,
            timeline: InMemoryTimeline::new(),
            calls: InMemoryCallGraph::new(),
            trace: InMemoryTraceLog::new(),
            sessions: InMemorySessionRegistry::new(),
            log,
            current_session: RwLock::new(None),
        }
    }

    /// Apply one recovered event directly to the component stores. Store
    /// mutations go to the base store, not the archiving wrapper — replay
    /// must never re-archive.
    fn replay(&self, base: &InMemoryObjectStore, event: ArchiveEvent) {
        let outcome: Result<(), String> = match event {
            ArchiveEvent::RecordStored { record } => {
                base.insert(&record).map(|_| ()).map_err(|e| e.to_string())
            }
            ArchiveEvent::RefAcquired { hash } => {
                base.acquire(&hash).map(|_| ()).map_err(|e| e.to_string())
            }
            ArchiveEvent::RefReleased { hash } => {
                base.release(&hash).map(|_| ()).map_err(|e| e.to_string())
            }
            ArchiveEvent::GarbageCollected => base
                .collect_garbage()
                .map(|_| ())
                .map_err(|e| e.to_string()),
            ArchiveEvent::VersionAppended {
                identity,
                hash,
                timestamp,
            } => {
                self.timeline.append_version(&identity, hash, timestamp);
                Ok(())
            }
            ArchiveEvent::CallStarted { record } => {
                self.calls.restore(record);
                Ok(())
            }
            ArchiveEvent::CallEnded {
                id,
                return_ref,
                end_time,
            } => self
                .calls
                .end_call(id, return_ref, end_time)
                .map_err(|e| e.to_string()),
            ArchiveEvent::CallDeleted { id } => {
                self.trace.remove_call(id);
                self.calls.remove(id).map(|_| ()).map_err(|e| e.to_string())
            }
            ArchiveEvent::SnapshotAppended { snapshot } => {
                self.trace.restore(snapshot);
                Ok(())
            }
            ArchiveEvent::SessionStarted { session } => {
                self.sessions.restore(session);
                Ok(())
            }
            ArchiveEvent::SessionEnded { id, ended_at } => {
                self.sessions.end(id, ended_at).map_err(|e| e.to_string())
            }
            ArchiveEvent::CallLinked { session, call } => self
                .sessions
                .link_call(session, call)
                .map_err(|e| e.to_string()),
            ArchiveEvent::CallUnlinked { session, call } => self
                .sessions
                .unlink_call(session, call)
                .map_err(|e| e.to_string()),
        };
        if let Err(error) = outcome {
            warn!(%error, "skipping unreplayable archive event");
        }
    }

    fn log_event(&self, event: &ArchiveEvent) -> SdkResult<()> {
        if let Some(log) = &self.log {
            log.append(event)?;
        }
        Ok(())
    }

    /// The recording gate the collector consults before building events.
    pub fn gate(&self) -> &RecordingGate {
        &self.gate
    }

    /// The object store, for direct inspection.
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    // ---------------------------------------------------------------
    // Collector boundary
    // ---------------------------------------------------------------

    /// Fail-safe event ingestion: a capture failure is logged and the
    /// event dropped. Nothing propagates into the monitored program.
    /// Returns the new call id for a `CallStart` event.
    pub fn ingest(&self, event: CaptureEvent) -> Option<CallId> {
        match event {
            CaptureEvent::CallStart(event) => match self.call_start(event) {
                Ok(id) => id,
                Err(error) => {
                    warn!(%error, "dropping call-start event");
                    None
                }
            },
            CaptureEvent::CallEnd(event) => {
                if let Err(error) = self.call_end(event) {
                    warn!(%error, "dropping call-end event");
                }
                None
            }
            CaptureEvent::Line(event) => {
                if let Err(error) = self.line_snapshot(event) {
                    warn!(%error, "dropping line event");
                }
                None
            }
        }
    }

    /// Record a call start. Returns `None` when the gate is disabled.
    pub fn call_start(&self, event: CallStart) -> SdkResult<Option<CallId>> {
        if !self.gate.is_enabled() {
            return Ok(None);
        }
        let timestamp = event.timestamp;

        let locals = self.store_bindings(&event.args, timestamp)?;
        let globals = match self.store_bindings(&event.globals, timestamp) {
            Ok(globals) => globals,
            Err(error) => {
                self.release_quietly(locals.values());
                return Err(error);
            }
        };
        let code_version = match &event.code {
            Some(descriptor) => match self.store_code(descriptor) {
                Ok(hash) => Some(hash),
                Err(error) => {
                    self.release_quietly(locals.values().chain(globals.values()));
                    return Err(error);
                }
            },
            None => None,
        };

        let session_id = *self.current_session.read().expect("lock poisoned");
        let info = CallStartInfo {
            function: event.function,
            file: event.file,
            line: event.line,
            parent_id: event.parent_call_id,
            start_time: timestamp,
            locals: locals.clone(),
            globals: globals.clone(),
            code_version,
            session_id,
        };
        let id = match self.calls.begin_call(info) {
            Ok(id) => id,
            Err(error) => {
                self.release_quietly(
                    locals
                        .values()
                        .chain(globals.values())
                        .chain(code_version.iter()),
                );
                return Err(error.into());
            }
        };

        self.log_event(&ArchiveEvent::CallStarted {
            record: self.calls.call(id)?,
        })?;
        if let Some(session) = session_id {
            self.sessions.link_call(session, id)?;
            self.log_event(&ArchiveEvent::CallLinked { session, call: id })?;
        }
        Ok(Some(id))
    }

    /// Record a call end.
    pub fn call_end(&self, event: CallEnd) -> SdkResult<()> {
        if !self.gate.is_enabled() {
            return Ok(());
        }
        let return_ref = match &event.return_value {
            Some(graph) => Some(store_value(self.store.as_ref(), graph)?),
            None => None,
        };
        if let Err(error) = self
            .calls
            .end_call(event.call_id, return_ref, event.timestamp)
        {
            self.release_quietly(return_ref.iter());
            return Err(error.into());
        }
        self.log_event(&ArchiveEvent::CallEnded {
            id: event.call_id,
            return_ref,
            end_time: event.timestamp,
        })?;
        Ok(())
    }

    /// Record a line snapshot for an open call. Returns `None` when the
    /// gate is disabled.
    pub fn line_snapshot(&self, event: LineCapture) -> SdkResult<Option<SnapshotId>> {
        if !self.gate.is_enabled() {
            return Ok(None);
        }
        let call = self.calls.call(event.call_id)?;
        if !call.is_open() {
            return Err(CallError::InvalidState {
                id: call.id,
                actual: call.state,
                expected: CallState::Open,
            }
            .into());
        }

        let locals = self.store_bindings(&event.locals, event.timestamp)?;
        let globals = match self.store_bindings(&event.globals, event.timestamp) {
            Ok(globals) => globals,
            Err(error) => {
                self.release_quietly(locals.values());
                return Err(error);
            }
        };

        let snapshot = self
            .trace
            .append(event.call_id, event.line, locals, globals, event.timestamp);
        let id = snapshot.id;
        self.log_event(&ArchiveEvent::SnapshotAppended { snapshot })?;
        Ok(Some(id))
    }

    /// Store one observation of a tracked logical object, outside any
    /// call context.
    pub fn observe(&self, identity: &Identity, value: &retrace_store::ValueGraph) -> SdkResult<ValueHash> {
        let hash = store_value(self.store.as_ref(), value)?;
        let timestamp = Timestamp::now();
        self.timeline.append_version(identity, hash, timestamp);
        self.log_event(&ArchiveEvent::VersionAppended {
            identity: identity.clone(),
            hash,
            timestamp,
        })?;
        Ok(hash)
    }

    fn store_bindings(
        &self,
        values: &[CapturedValue],
        timestamp: Timestamp,
    ) -> SdkResult<BTreeMap<String, ValueHash>> {
        let mut refs = BTreeMap::new();
        for captured in values {
            let hash = store_value(self.store.as_ref(), &captured.value)?;
            if let Some(identity) = &captured.identity {
                self.timeline.append_version(identity, hash, timestamp);
                self.log_event(&ArchiveEvent::VersionAppended {
                    identity: identity.clone(),
                    hash,
                    timestamp,
                })?;
            }
            refs.insert(captured.name.clone(), hash);
        }
        Ok(refs)
    }

    fn store_code(&self, descriptor: &CodeDescriptor) -> SdkResult<ValueHash> {
        Ok(self.store.insert(&descriptor.to_record()?)?.hash)
    }

    fn release_quietly<'a>(&self, hashes: impl Iterator<Item = &'a ValueHash>) {
        for hash in hashes {
            if let Err(error) = self.store.release(hash) {
                warn!(%error, "failed to release value reference during cleanup");
            }
        }
    }

    // ---------------------------------------------------------------
    // Deletion and garbage collection
    // ---------------------------------------------------------------

    /// Logically remove a call, releasing every hash it referenced —
    /// entry bindings, return value, code version, and every snapshot
    /// binding under it. Children are detached, never cascaded into. The
    /// session entry is unlinked to keep referential integrity.
    pub fn delete_call(&self, id: CallId) -> SdkResult<()> {
        let record = self.calls.remove(id)?;
        self.log_event(&ArchiveEvent::CallDeleted { id })?;

        self.release_quietly(record.referenced_hashes().iter());
        for snapshot in self.trace.remove_call(id) {
            self.release_quietly(snapshot.referenced_hashes().iter());
        }
        if let Some(session) = record.session_id {
            if self.sessions.unlink_call(session, id).is_ok() {
                self.log_event(&ArchiveEvent::CallUnlinked { session, call: id })?;
            }
        }
        Ok(())
    }

    /// Collect every record whose refcount reached zero. Deferred and
    /// explicit; nothing collects implicitly.
    pub fn collect_garbage(&self) -> SdkResult<Vec<ValueHash>> {
        Ok(self.store.collect_garbage()?)
    }

    // ---------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------

    /// Start a session; calls recorded while it is active are linked to
    /// it in order.
    pub fn start_session(
        &self,
        name: impl Into<String>,
        metadata: BTreeMap<String, Value>,
    ) -> SdkResult<SessionId> {
        let id = self.sessions.start(name, metadata, Timestamp::now());
        *self.current_session.write().expect("lock poisoned") = Some(id);
        self.log_event(&ArchiveEvent::SessionStarted {
            session: self.sessions.session(id)?,
        })?;
        Ok(id)
    }

    /// End the active session, if any.
    pub fn end_session(&self) -> SdkResult<Option<SessionId>> {
        let taken = self.current_session.write().expect("lock poisoned").take();
        let Some(id) = taken else {
            return Ok(None);
        };
        let ended_at = Timestamp::now();
        self.sessions.end(id, ended_at)?;
        self.log_event(&ArchiveEvent::SessionEnded { id, ended_at })?;
        Ok(Some(id))
    }

    /// The currently active session.
    pub fn current_session(&self) -> Option<SessionId> {
        *self.current_session.read().expect("lock poisoned")
    }

    /// Fetch a session.
    pub fn session(&self, id: SessionId) -> SdkResult<Session> {
        Ok(self.sessions.session(id)?)
    }

    /// All sessions, ordered by start time.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.sessions()
    }

    // ---------------------------------------------------------------
    // Query surface
    // ---------------------------------------------------------------

    /// Fetch one call record.
    pub fn call(&self, id: CallId) -> SdkResult<CallRecord> {
        Ok(self.calls.call(id)?)
    }

    /// Calls of one function, ordered by start time.
    pub fn calls_for_function(&self, function: &str) -> Vec<CallRecord> {
        self.calls.calls_for_function(function)
    }

    /// Calls recorded in one file, ordered by start time.
    pub fn calls_in_file(&self, file: &str) -> Vec<CallRecord> {
        self.calls.calls_in_file(file)
    }

    /// Calls started within `[from, to]`.
    pub fn calls_between(&self, from: Timestamp, to: Timestamp) -> Vec<CallRecord> {
        self.calls.calls_between(from, to)
    }

    /// Calls recorded under one session.
    pub fn calls_in_session(&self, session: SessionId) -> Vec<CallRecord> {
        self.calls.calls_in_session(session)
    }

    /// Calls matching an arbitrary predicate.
    pub fn find_calls(&self, predicate: impl Fn(&CallRecord) -> bool) -> Vec<CallRecord> {
        self.calls.find_calls(predicate)
    }

    /// Direct children of a call.
    pub fn children_of(&self, id: CallId) -> Vec<CallRecord> {
        self.calls.children_of(id)
    }

    /// Calls still open (abandoned if the recording process has exited).
    pub fn open_calls(&self) -> Vec<CallRecord> {
        self.calls.open_calls()
    }

    /// The ordered snapshot stream of a call.
    pub fn snapshots(&self, id: CallId) -> Vec<LineSnapshot> {
        self.trace.snapshots(id)
    }

    /// An identity's complete version history.
    pub fn history(&self, identity: &Identity) -> VersionHistory {
        self.timeline.history(identity)
    }

    /// Resolve one version of an identity.
    pub fn version(&self, identity: &Identity, query: VersionQuery) -> SdkResult<ValueHash> {
        Ok(self.timeline.version(identity, query)?)
    }

    /// Diff the local bindings of two snapshots of one call.
    pub fn diff_call_snapshots(
        &self,
        id: CallId,
        from_seq: u64,
        to_seq: u64,
    ) -> SdkResult<BindingDiff> {
        let snapshots = self.trace.snapshots(id);
        let find = |seq: u64| {
            snapshots
                .iter()
                .find(|s| s.seq == seq)
                .ok_or(TraceError::NotFound(id))
        };
        Ok(diff_snapshots(find(from_seq)?, find(to_seq)?))
    }

    // ---------------------------------------------------------------
    // Reanimation
    // ---------------------------------------------------------------

    /// Reconstruct one call's final state through a single shared cache.
    pub fn reanimate_call(&self, id: CallId) -> SdkResult<ReanimatedCall> {
        Ok(retrace_reanimate::reanimate_call(
            &self.calls,
            &self.trace,
            self.store.as_ref(),
            id,
        )?)
    }

    /// Replay a stored call against a currently-live callable.
    pub fn execute_reanimated(
        &self,
        id: CallId,
        resolver: &dyn Resolver,
    ) -> SdkResult<LiveValue> {
        Ok(retrace_reanimate::execute_reanimated(
            &self.calls,
            self.store.as_ref(),
            id,
            resolver,
        )?)
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("durable", &self.log.is_some())
            .field("recording", &self.gate.is_enabled())
            .finish()
    }
}
