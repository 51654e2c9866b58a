use std::collections::HashMap;

use retrace_store::{ChildRef, ObjectStore, RecordPayload, ScalarValue};
use retrace_types::ValueHash;
use tracing::debug;

use crate::error::ReanimateResult;
use crate::live::{live, LiveNode, LiveValue};

/// Recursive value reconstruction with cycle and sharing safety.
///
/// One materializer carries one cache; resolving several references
/// through the same materializer preserves aliasing between them. The
/// ordering is what makes cycles resolve: a composite registers its empty
/// container in the cache and on the traversal stack *before* recursing
/// into children, so by the time a cyclic child lookup happens, the
/// parent's placeholder is already reachable.
pub struct Materializer<'a, S: ?Sized> {
    store: &'a S,
    cache: HashMap<ValueHash, LiveValue>,
    stack: Vec<LiveValue>,
    degraded: bool,
}

impl<'a, S: ObjectStore + ?Sized> Materializer<'a, S> {
    /// Create a materializer with an empty cache.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            stack: Vec::new(),
            degraded: false,
        }
    }

    /// Returns `true` if any materialized value was a degraded stand-in.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    /// Reconstruct the value stored under `hash`.
    pub fn materialize(&mut self, hash: &ValueHash) -> ReanimateResult<LiveValue> {
        if let Some(cached) = self.cache.get(hash) {
            return Ok(cached.clone());
        }

        let record = self.store.get(hash)?;
        let payload = RecordPayload::from_record(&record)?;

        let value = match payload {
            RecordPayload::Scalar(scalar) => {
                let value = live(LiveNode::Scalar(scalar));
                self.cache.insert(*hash, value.clone());
                value
            }
            RecordPayload::Opaque { type_name, reason } => {
                debug!(%type_name, "materialized opaque stand-in");
                self.degraded = true;
                let value = live(LiveNode::Opaque { type_name, reason });
                self.cache.insert(*hash, value.clone());
                value
            }
            RecordPayload::Code(descriptor) => {
                // Code records are values too; surface them as inspectable
                // records rather than raw bytes.
                let value = live(LiveNode::Record {
                    type_name: "code".to_string(),
                    fields: vec![
                        (
                            "content".to_string(),
                            live(LiveNode::Scalar(ScalarValue::Str(descriptor.content))),
                        ),
                        (
                            "module_path".to_string(),
                            live(LiveNode::Scalar(ScalarValue::Str(descriptor.module_path))),
                        ),
                    ],
                });
                self.cache.insert(*hash, value.clone());
                value
            }
            RecordPayload::Sequence(children) => {
                let container = live(LiveNode::Sequence(Vec::new()));
                self.cache.insert(*hash, container.clone());
                self.stack.push(container.clone());
                let resolved = children
                    .into_iter()
                    .map(|c| self.resolve_child(c))
                    .collect::<ReanimateResult<Vec<_>>>();
                self.stack.pop();
                let resolved = resolved?;
                *container.borrow_mut() = LiveNode::Sequence(resolved);
                container
            }
            RecordPayload::Mapping(entries) => {
                let container = live(LiveNode::Mapping(Vec::new()));
                self.cache.insert(*hash, container.clone());
                self.stack.push(container.clone());
                let resolved = entries
                    .into_iter()
                    .map(|(name, c)| Ok((name, self.resolve_child(c)?)))
                    .collect::<ReanimateResult<Vec<_>>>();
                self.stack.pop();
                let resolved = resolved?;
                *container.borrow_mut() = LiveNode::Mapping(resolved);
                container
            }
            RecordPayload::Record { type_name, fields } => {
                let container = live(LiveNode::Record {
                    type_name: type_name.clone(),
                    fields: Vec::new(),
                });
                self.cache.insert(*hash, container.clone());
                self.stack.push(container.clone());
                let resolved = fields
                    .into_iter()
                    .map(|(name, c)| Ok((name, self.resolve_child(c)?)))
                    .collect::<ReanimateResult<Vec<_>>>();
                self.stack.pop();
                let resolved = resolved?;
                *container.borrow_mut() = LiveNode::Record {
                    type_name,
                    fields: resolved,
                };
                container
            }
        };

        Ok(value)
    }

    fn resolve_child(&mut self, child: ChildRef) -> ReanimateResult<LiveValue> {
        match child {
            ChildRef::Hash(hash) => self.materialize(&hash),
            ChildRef::Backref(levels) => {
                // The container k levels up the stack; the stack top is the
                // container whose children are being resolved.
                match self
                    .stack
                    .len()
                    .checked_sub(1 + levels as usize)
                    .and_then(|i| self.stack.get(i))
                {
                    Some(ancestor) => Ok(ancestor.clone()),
                    None => {
                        // An interior node of a cycle materialized without
                        // its root: degrade instead of failing.
                        self.degraded = true;
                        Ok(live(LiveNode::Opaque {
                            type_name: "cycle".to_string(),
                            reason: "back-reference escapes the materialized root".to_string(),
                        }))
                    }
                }
            }
        }
    }
}
