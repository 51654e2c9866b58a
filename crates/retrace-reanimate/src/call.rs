use std::collections::BTreeMap;

use retrace_callgraph::{CallRecord, InMemoryCallGraph};
use retrace_store::ObjectStore;
use retrace_trace::InMemoryTraceLog;
use retrace_types::{CallId, ValueHash};

use crate::error::ReanimateResult;
use crate::live::LiveValue;
use crate::materialize::Materializer;

/// The reconstructed state of one recorded call.
///
/// Bindings reflect the call's *final* observed state: the last line
/// snapshot when line capture was on, otherwise the entry bindings.
/// Everything resolves through one shared cache, so a value aliased
/// between locals, globals, and the return value comes back as one shared
/// object. (Replay via `execute_reanimated` uses the entry bindings
/// instead — arguments as the call received them.)
#[derive(Debug)]
pub struct ReanimatedCall {
    /// The call record the values were reconstructed from.
    pub call: CallRecord,
    pub locals: BTreeMap<String, LiveValue>,
    pub globals: BTreeMap<String, LiveValue>,
    /// `None` for a call that never closed (abandoned) — a defined
    /// non-error state.
    pub return_value: Option<LiveValue>,
    /// `true` if any value materialized to a stand-in.
    pub degraded: bool,
}

/// Reconstruct every reference of one call through a single shared cache.
pub fn reanimate_call<S: ObjectStore + ?Sized>(
    calls: &InMemoryCallGraph,
    trace: &InMemoryTraceLog,
    store: &S,
    id: CallId,
) -> ReanimateResult<ReanimatedCall> {
    let call = calls.call(id)?;

    // The final observed state: last snapshot if line capture ran,
    // otherwise the entry bindings.
    let (local_refs, global_refs) = match trace.snapshots(id).last() {
        Some(last) => (last.locals.clone(), last.globals.clone()),
        None => (call.locals.clone(), call.globals.clone()),
    };

    let mut materializer = Materializer::new(store);
    let locals = materialize_bindings(&mut materializer, &local_refs)?;
    let globals = materialize_bindings(&mut materializer, &global_refs)?;
    let return_value = match call.return_ref {
        Some(hash) => Some(materializer.materialize(&hash)?),
        None => None,
    };

    Ok(ReanimatedCall {
        degraded: materializer.degraded(),
        call,
        locals,
        globals,
        return_value,
    })
}

fn materialize_bindings<S: ObjectStore + ?Sized>(
    materializer: &mut Materializer<'_, S>,
    refs: &BTreeMap<String, ValueHash>,
) -> ReanimateResult<BTreeMap<String, LiveValue>> {
    refs.iter()
        .map(|(name, hash)| Ok((name.clone(), materializer.materialize(hash)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_callgraph::CallStartInfo;
    use retrace_store::{store_value, InMemoryObjectStore, ScalarValue, ValueGraph};
    use retrace_types::Timestamp;
    use std::rc::Rc;

    use crate::live::LiveNode;

    struct Fixture {
        store: InMemoryObjectStore,
        calls: InMemoryCallGraph,
        trace: InMemoryTraceLog,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: InMemoryObjectStore::new(),
                calls: InMemoryCallGraph::new(),
                trace: InMemoryTraceLog::new(),
            }
        }

        fn store_int(&self, value: i64) -> ValueHash {
            store_value(&self.store, &ValueGraph::int(value)).unwrap()
        }

        fn store_list(&self, values: &[i64]) -> ValueHash {
            store_value(&self.store, &ValueGraph::int_sequence(values.to_vec())).unwrap()
        }
    }

    #[test]
    fn closed_call_reanimates_entry_state_and_return() {
        let fx = Fixture::new();
        let x = fx.store_list(&[1, 2, 3]);
        let ret = fx.store_int(4);

        let id = fx
            .calls
            .begin_call(
                CallStartInfo::new("f", "demo.py", 1)
                    .at(Timestamp::from_millis(100))
                    .with_locals(BTreeMap::from([("x".to_string(), x)])),
            )
            .unwrap();
        fx.calls
            .end_call(id, Some(ret), Timestamp::from_millis(200))
            .unwrap();

        let result = reanimate_call(&fx.calls, &fx.trace, &fx.store, id).unwrap();
        assert!(!result.degraded);
        assert!(result.locals.contains_key("x"));
        assert_eq!(
            result
                .return_value
                .unwrap()
                .borrow()
                .as_scalar(),
            Some(&ScalarValue::Int(4))
        );
    }

    #[test]
    fn last_snapshot_wins_over_entry_state() {
        let fx = Fixture::new();
        let entry = fx.store_int(0);
        let mid = fx.store_int(1);
        let last = fx.store_int(2);

        let id = fx
            .calls
            .begin_call(
                CallStartInfo::new("f", "demo.py", 1)
                    .at(Timestamp::from_millis(100))
                    .with_locals(BTreeMap::from([("x".to_string(), entry)])),
            )
            .unwrap();
        fx.trace.append(
            id,
            1,
            BTreeMap::from([("x".to_string(), mid)]),
            BTreeMap::new(),
            Timestamp::from_millis(110),
        );
        fx.trace.append(
            id,
            2,
            BTreeMap::from([("x".to_string(), last)]),
            BTreeMap::new(),
            Timestamp::from_millis(120),
        );
        fx.calls
            .end_call(id, None, Timestamp::from_millis(200))
            .unwrap();

        let result = reanimate_call(&fx.calls, &fx.trace, &fx.store, id).unwrap();
        assert_eq!(
            result.locals["x"].borrow().as_scalar(),
            Some(&ScalarValue::Int(2))
        );
    }

    #[test]
    fn aliasing_is_preserved_across_bindings() {
        let fx = Fixture::new();
        let shared = fx.store_list(&[9, 9]);

        let id = fx
            .calls
            .begin_call(
                CallStartInfo::new("f", "demo.py", 1)
                    .at(Timestamp::from_millis(100))
                    .with_locals(BTreeMap::from([
                        ("a".to_string(), shared),
                        ("b".to_string(), shared),
                    ])),
            )
            .unwrap();
        fx.calls
            .end_call(id, Some(shared), Timestamp::from_millis(200))
            .unwrap();

        let result = reanimate_call(&fx.calls, &fx.trace, &fx.store, id).unwrap();
        assert!(Rc::ptr_eq(&result.locals["a"], &result.locals["b"]));
        assert!(Rc::ptr_eq(
            &result.locals["a"],
            result.return_value.as_ref().unwrap()
        ));
    }

    #[test]
    fn abandoned_call_reanimates_without_return() {
        let fx = Fixture::new();
        let x = fx.store_int(5);
        let id = fx
            .calls
            .begin_call(
                CallStartInfo::new("f", "demo.py", 1)
                    .at(Timestamp::from_millis(100))
                    .with_locals(BTreeMap::from([("x".to_string(), x)])),
            )
            .unwrap();

        // Never closed: the process died mid-call. Not an error.
        let result = reanimate_call(&fx.calls, &fx.trace, &fx.store, id).unwrap();
        assert!(result.call.is_open());
        assert!(result.return_value.is_none());
        assert_eq!(
            result.locals["x"].borrow().as_scalar(),
            Some(&ScalarValue::Int(5))
        );
    }

    #[test]
    fn opaque_binding_degrades_explicitly() {
        let fx = Fixture::new();
        let mut graph = ValueGraph::new();
        let node = graph.push(retrace_store::ValueNode::Opaque {
            type_name: "Socket".into(),
            reason: "live fd".into(),
        });
        graph.set_root(node);
        let opaque = store_value(&fx.store, &graph).unwrap();

        let id = fx
            .calls
            .begin_call(
                CallStartInfo::new("f", "demo.py", 1)
                    .at(Timestamp::from_millis(100))
                    .with_locals(BTreeMap::from([("sock".to_string(), opaque)])),
            )
            .unwrap();

        let result = reanimate_call(&fx.calls, &fx.trace, &fx.store, id).unwrap();
        assert!(result.degraded);
        assert!(matches!(
            &*result.locals["sock"].borrow(),
            LiveNode::Opaque { .. }
        ));
    }

    #[test]
    fn unknown_call_is_not_found() {
        let fx = Fixture::new();
        let err = reanimate_call(&fx.calls, &fx.trace, &fx.store, CallId::new()).unwrap_err();
        assert!(matches!(err, crate::error::ReanimateError::Call(_)));
    }
}
