//! Binding-level diff: compare two captured states.
//!
//! States are `BTreeMap<String, ValueHash>` binding maps (a call's entry
//! state or any line snapshot). The diff detects name additions, removals,
//! and modifications; a modification is simply a hash change — content
//! addressing means no value comparison is ever needed.

use std::collections::BTreeMap;

use retrace_trace::LineSnapshot;
use retrace_types::ValueHash;

/// The result of comparing two binding maps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindingDiff {
    /// The list of binding changes.
    pub changes: Vec<BindingChange>,
}

impl BindingDiff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Number of added names.
    pub fn additions(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, BindingChange::Added { .. }))
            .count()
    }

    /// Number of removed names.
    pub fn removals(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, BindingChange::Removed { .. }))
            .count()
    }

    /// Number of modified names.
    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, BindingChange::Modified { .. }))
            .count()
    }
}

/// A single change between two binding maps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingChange {
    /// A name was bound that did not exist before.
    Added { name: String, hash: ValueHash },
    /// A previously bound name disappeared.
    Removed { name: String, hash: ValueHash },
    /// A name stayed bound but its value's hash changed.
    Modified {
        name: String,
        old: ValueHash,
        new: ValueHash,
    },
}

/// Compute the diff between two binding maps.
///
/// Names present only in `new` are `Added`, names present only in `old`
/// are `Removed`, and names present in both with different hashes are
/// `Modified`.
pub fn diff_bindings(
    old: &BTreeMap<String, ValueHash>,
    new: &BTreeMap<String, ValueHash>,
) -> BindingDiff {
    let mut changes = Vec::new();

    for (name, old_hash) in old {
        match new.get(name) {
            Some(new_hash) => {
                if old_hash != new_hash {
                    changes.push(BindingChange::Modified {
                        name: name.clone(),
                        old: *old_hash,
                        new: *new_hash,
                    });
                }
            }
            None => {
                changes.push(BindingChange::Removed {
                    name: name.clone(),
                    hash: *old_hash,
                });
            }
        }
    }

    for (name, new_hash) in new {
        if !old.contains_key(name) {
            changes.push(BindingChange::Added {
                name: name.clone(),
                hash: *new_hash,
            });
        }
    }

    BindingDiff { changes }
}

/// Diff the local bindings of two snapshots (typically consecutive lines
/// of one call, but any two snapshots compare fine).
pub fn diff_snapshots(old: &LineSnapshot, new: &LineSnapshot) -> BindingDiff {
    diff_bindings(&old.locals, &new.locals)
}
