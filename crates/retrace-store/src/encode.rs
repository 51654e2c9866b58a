//! Recursive depth-first value storage.
//!
//! [`store_value`] walks a [`ValueGraph`] children-first so child hashes
//! become part of each parent's canonical encoding. Nodes are tri-color
//! marked: a back-edge to a node still being stored becomes a
//! [`ChildRef::Backref`] (a content hash cannot contain itself), while a
//! node already finished is referenced by hash with one extra refcount
//! acquired for the new parent reference.
//!
//! When a composite turns out to already exist, the child refcounts bumped
//! by this traversal are released again, so deduplicated storage keeps
//! reference counts exact.

use std::collections::HashMap;

use retrace_types::ValueHash;

use crate::error::{StoreError, StoreResult};
use crate::record::{ChildRef, RecordPayload};
use crate::traits::ObjectStore;
use crate::value::{NodeId, ValueGraph, ValueNode};

enum Mark {
    InProgress { depth: u32 },
    Done(ValueHash),
}

/// Store a captured value and return its root hash.
///
/// The returned hash carries one reference held on behalf of the caller;
/// pair it with `release` when the owning record is deleted.
pub fn store_value<S: ObjectStore + ?Sized>(
    store: &S,
    graph: &ValueGraph,
) -> StoreResult<ValueHash> {
    let root = graph
        .root()
        .ok_or_else(|| StoreError::MalformedGraph("graph has no root".into()))?;
    let mut encoder = Encoder {
        store,
        graph,
        marks: HashMap::new(),
    };
    encoder.encode(root, 0)
}

struct Encoder<'a, S: ?Sized> {
    store: &'a S,
    graph: &'a ValueGraph,
    marks: HashMap<usize, Mark>,
}

impl<S: ObjectStore + ?Sized> Encoder<'_, S> {
    /// Encode the reference to `id` as seen from a container at `parent_depth`.
    fn child_ref(&mut self, id: NodeId, parent_depth: u32) -> StoreResult<ChildRef> {
        match self.marks.get(&id.index()) {
            Some(Mark::InProgress { depth }) => Ok(ChildRef::Backref(parent_depth - depth)),
            Some(Mark::Done(hash)) => {
                let hash = *hash;
                self.store.acquire(&hash)?;
                Ok(ChildRef::Hash(hash))
            }
            None => Ok(ChildRef::Hash(self.encode(id, parent_depth + 1)?)),
        }
    }

    /// Store the subtree rooted at `id`, sitting at `depth` in the
    /// traversal. The returned hash carries one reference for the caller.
    fn encode(&mut self, id: NodeId, depth: u32) -> StoreResult<ValueHash> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| {
                StoreError::MalformedGraph(format!("dangling node id {}", id.index()))
            })?
            .clone();

        let payload = match node {
            ValueNode::Scalar(value) => RecordPayload::Scalar(value),
            ValueNode::Opaque { type_name, reason } => RecordPayload::Opaque { type_name, reason },
            ValueNode::Sequence(children) => {
                self.marks.insert(id.index(), Mark::InProgress { depth });
                let refs = children
                    .iter()
                    .map(|c| self.child_ref(*c, depth))
                    .collect::<StoreResult<Vec<_>>>()?;
                RecordPayload::Sequence(refs)
            }
            ValueNode::Mapping(entries) => {
                self.marks.insert(id.index(), Mark::InProgress { depth });
                let mut encoded = entries
                    .iter()
                    .map(|(name, c)| Ok((name.clone(), self.child_ref(*c, depth)?)))
                    .collect::<StoreResult<Vec<_>>>()?;
                encoded.sort_by(|(a, _), (b, _)| a.cmp(b));
                RecordPayload::Mapping(encoded)
            }
            ValueNode::Record { type_name, fields } => {
                self.marks.insert(id.index(), Mark::InProgress { depth });
                let mut encoded = fields
                    .iter()
                    .map(|(name, c)| Ok((name.clone(), self.child_ref(*c, depth)?)))
                    .collect::<StoreResult<Vec<_>>>()?;
                encoded.sort_by(|(a, _), (b, _)| a.cmp(b));
                RecordPayload::Record {
                    type_name,
                    fields: encoded,
                }
            }
        };

        let record = payload.to_record()?;
        let inserted = self.store.insert(&record)?;
        if !inserted.fresh {
            // The existing copy already holds its children; undo the bumps
            // this traversal made while encoding them.
            for child in payload.child_hashes() {
                self.store.release(&child)?;
            }
        }
        self.marks.insert(id.index(), Mark::Done(inserted.hash));
        Ok(inserted.hash)
    }
}
