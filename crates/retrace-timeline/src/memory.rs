use std::collections::HashMap;
use std::sync::RwLock;

use retrace_types::{Identity, Timestamp, ValueHash};

use crate::error::{TimelineError, TimelineResult};
use crate::types::{VersionEntry, VersionHistory, VersionQuery};

/// In-memory identity tracker.
///
/// Chains live in a `HashMap` keyed by identity, each an append-only `Vec`
/// behind a `RwLock`. Sequence numbers start at 1 and increase strictly
/// per identity.
pub struct InMemoryTimeline {
    chains: RwLock<HashMap<Identity, Vec<VersionEntry>>>,
}

impl InMemoryTimeline {
    /// Create a new empty timeline.
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Append an observation to an identity's chain and return its
    /// sequence number.
    ///
    /// Always appends, even when `hash` repeats the previous entry: the
    /// timeline records every observation, and the store has already
    /// deduplicated the content.
    pub fn append_version(
        &self,
        identity: &Identity,
        hash: ValueHash,
        timestamp: Timestamp,
    ) -> u64 {
        let mut chains = self.chains.write().expect("lock poisoned");
        let chain = chains.entry(identity.clone()).or_default();
        let seq = chain.len() as u64 + 1;
        chain.push(VersionEntry {
            identity: identity.clone(),
            seq,
            hash,
            timestamp,
        });
        seq
    }

    /// Resolve one version of an identity to its content hash.
    pub fn version(&self, identity: &Identity, query: VersionQuery) -> TimelineResult<ValueHash> {
        let chains = self.chains.read().expect("lock poisoned");
        let chain = chains
            .get(identity)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| TimelineError::UnknownIdentity(identity.clone()))?;
        match query {
            VersionQuery::Latest => Ok(chain.last().expect("non-empty chain").hash),
            VersionQuery::Seq(seq) => seq
                .checked_sub(1)
                .and_then(|i| chain.get(i as usize))
                .map(|e| e.hash)
                .ok_or_else(|| TimelineError::UnknownVersion {
                    identity: identity.clone(),
                    seq,
                }),
        }
    }

    /// The complete ordered history of an identity.
    ///
    /// Returns an empty walk for an unknown identity; an identity with no
    /// observations has no history rather than being an error.
    pub fn history(&self, identity: &Identity) -> VersionHistory {
        let chains = self.chains.read().expect("lock poisoned");
        VersionHistory::new(chains.get(identity).cloned().unwrap_or_default())
    }

    /// All identities with at least one observation, sorted.
    pub fn identities(&self) -> Vec<Identity> {
        let chains = self.chains.read().expect("lock poisoned");
        let mut ids: Vec<Identity> = chains.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.chains.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no identity is tracked.
    pub fn is_empty(&self) -> bool {
        self.chains.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTimeline")
            .field("identity_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> ValueHash {
        ValueHash::from_digest([byte; 32])
    }

    fn identity(key: &str) -> Identity {
        Identity::new(key).unwrap()
    }

    #[test]
    fn append_assigns_increasing_seq() {
        let timeline = InMemoryTimeline::new();
        let id = identity("counter");

        assert_eq!(timeline.append_version(&id, hash(1), Timestamp::from_millis(1)), 1);
        assert_eq!(timeline.append_version(&id, hash(2), Timestamp::from_millis(2)), 2);
        assert_eq!(timeline.append_version(&id, hash(3), Timestamp::from_millis(3)), 3);
    }

    #[test]
    fn repeated_hash_is_never_suppressed() {
        let timeline = InMemoryTimeline::new();
        let id = identity("stable");

        timeline.append_version(&id, hash(7), Timestamp::from_millis(1));
        timeline.append_version(&id, hash(7), Timestamp::from_millis(2));

        let history = timeline.history(&id);
        assert_eq!(history.len(), 2);
        let hashes: Vec<ValueHash> = history.map(|e| e.hash).collect();
        assert_eq!(hashes, vec![hash(7), hash(7)]);
    }

    #[test]
    fn latest_resolves_last_entry() {
        let timeline = InMemoryTimeline::new();
        let id = identity("x");
        timeline.append_version(&id, hash(1), Timestamp::from_millis(1));
        timeline.append_version(&id, hash(2), Timestamp::from_millis(2));

        assert_eq!(timeline.version(&id, VersionQuery::Latest).unwrap(), hash(2));
    }

    #[test]
    fn seq_resolves_specific_entry() {
        let timeline = InMemoryTimeline::new();
        let id = identity("x");
        timeline.append_version(&id, hash(1), Timestamp::from_millis(1));
        timeline.append_version(&id, hash(2), Timestamp::from_millis(2));

        assert_eq!(timeline.version(&id, VersionQuery::Seq(1)).unwrap(), hash(1));
        assert_eq!(timeline.version(&id, VersionQuery::Seq(2)).unwrap(), hash(2));
    }

    #[test]
    fn unknown_identity_fails() {
        let timeline = InMemoryTimeline::new();
        let err = timeline
            .version(&identity("ghost"), VersionQuery::Latest)
            .unwrap_err();
        assert!(matches!(err, TimelineError::UnknownIdentity(_)));
    }

    #[test]
    fn out_of_range_seq_fails() {
        let timeline = InMemoryTimeline::new();
        let id = identity("x");
        timeline.append_version(&id, hash(1), Timestamp::from_millis(1));

        let err = timeline.version(&id, VersionQuery::Seq(5)).unwrap_err();
        assert!(matches!(err, TimelineError::UnknownVersion { seq: 5, .. }));
        let err = timeline.version(&id, VersionQuery::Seq(0)).unwrap_err();
        assert!(matches!(err, TimelineError::UnknownVersion { seq: 0, .. }));
    }

    #[test]
    fn history_of_unknown_identity_is_empty() {
        let timeline = InMemoryTimeline::new();
        assert!(timeline.history(&identity("ghost")).is_empty());
    }

    #[test]
    fn history_is_a_snapshot() {
        let timeline = InMemoryTimeline::new();
        let id = identity("x");
        timeline.append_version(&id, hash(1), Timestamp::from_millis(1));
        let history = timeline.history(&id);
        timeline.append_version(&id, hash(2), Timestamp::from_millis(2));

        // The walk taken before the second append does not see it.
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn chains_are_independent_per_identity() {
        let timeline = InMemoryTimeline::new();
        let a = identity("a");
        let b = identity("b");

        timeline.append_version(&a, hash(1), Timestamp::from_millis(1));
        timeline.append_version(&b, hash(2), Timestamp::from_millis(2));
        timeline.append_version(&a, hash(3), Timestamp::from_millis(3));

        assert_eq!(timeline.history(&a).len(), 2);
        assert_eq!(timeline.history(&b).len(), 1);
        assert_eq!(timeline.identities(), vec![a, b]);
    }

    #[test]
    fn concurrent_appends_to_one_identity() {
        use std::sync::Arc;
        use std::thread;

        let timeline = Arc::new(InMemoryTimeline::new());
        let id = identity("hot");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let timeline = Arc::clone(&timeline);
                let id = id.clone();
                thread::spawn(move || {
                    timeline.append_version(&id, hash(i), Timestamp::from_millis(i as i64))
                })
            })
            .collect();

        let mut seqs: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());
    }
}
