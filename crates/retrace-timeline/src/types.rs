use serde::{Deserialize, Serialize};

use retrace_types::{Identity, Timestamp, ValueHash};

/// One observation in an identity's version chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// The identity this entry belongs to.
    pub identity: Identity,
    /// Strictly increasing sequence number within the chain (from 1).
    pub seq: u64,
    /// Content hash of the observed state.
    pub hash: ValueHash,
    /// When the state was observed.
    pub timestamp: Timestamp,
}

/// Which version of an identity to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionQuery {
    /// A specific sequence number.
    Seq(u64),
    /// The most recent entry.
    Latest,
}

/// An ordered, finite walk over an identity's version chain.
///
/// The iterator owns its entries, so it can be restarted by cloning and is
/// unaffected by later appends to the live chain.
#[derive(Clone, Debug)]
pub struct VersionHistory {
    entries: Vec<VersionEntry>,
    cursor: usize,
}

impl VersionHistory {
    pub(crate) fn new(entries: Vec<VersionEntry>) -> Self {
        Self { entries, cursor: 0 }
    }

    /// Total number of entries in the walk.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the walk has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reset the walk to the beginning.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }
}

impl Iterator for VersionHistory {
    type Item = VersionEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64) -> VersionEntry {
        VersionEntry {
            identity: Identity::new("x").unwrap(),
            seq,
            hash: ValueHash::from_digest([seq as u8; 32]),
            timestamp: Timestamp::from_millis(1000 + seq as i64),
        }
    }

    #[test]
    fn history_iterates_in_order() {
        let history = VersionHistory::new(vec![entry(1), entry(2), entry(3)]);
        let seqs: Vec<u64> = history.map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn history_restarts() {
        let mut history = VersionHistory::new(vec![entry(1), entry(2)]);
        assert_eq!(history.next().unwrap().seq, 1);
        history.restart();
        assert_eq!(history.next().unwrap().seq, 1);
    }

    #[test]
    fn empty_history() {
        let mut history = VersionHistory::new(vec![]);
        assert!(history.is_empty());
        assert!(history.next().is_none());
    }
}
