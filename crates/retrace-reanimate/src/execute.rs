use std::collections::HashMap;

use retrace_callgraph::InMemoryCallGraph;
use retrace_store::ObjectStore;
use retrace_types::CallId;
use tracing::debug;

use crate::error::{ReanimateError, ReanimateResult};
use crate::live::LiveValue;
use crate::materialize::Materializer;

/// The declared parameters of a live callable, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<String>,
}

impl Signature {
    /// Build a signature from parameter names.
    pub fn new<I, T>(params: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// Reconstructed arguments bound to a signature's parameters, in order.
#[derive(Debug)]
pub struct ArgumentSet {
    args: Vec<(String, LiveValue)>,
}

impl ArgumentSet {
    /// Look up an argument by parameter name.
    pub fn get(&self, name: &str) -> Option<&LiveValue> {
        self.args
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }

    /// Argument values in parameter order.
    pub fn values(&self) -> impl Iterator<Item = &LiveValue> {
        self.args.iter().map(|(_, value)| value)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` for a nullary call.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// A currently-live callable that a stored call can be replayed against.
pub trait CallTarget {
    /// The callable's declared parameters.
    fn signature(&self) -> Signature;

    /// Invoke with reconstructed arguments. An `Err` message becomes an
    /// explicit `ExecutionError` — replaying a call that itself fails is
    /// a reportable outcome, not a reanimation bug.
    fn invoke(&self, args: &ArgumentSet) -> Result<LiveValue, String>;
}

/// Maps stored function identities to live callables.
pub trait Resolver {
    fn resolve(&self, function: &str) -> Option<&dyn CallTarget>;
}

/// A simple name → callable table, the common resolver.
#[derive(Default)]
pub struct FunctionTable {
    targets: HashMap<String, Box<dyn CallTarget>>,
}

impl FunctionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable under a function identity.
    pub fn register(&mut self, function: impl Into<String>, target: Box<dyn CallTarget>) {
        self.targets.insert(function.into(), target);
    }
}

impl Resolver for FunctionTable {
    fn resolve(&self, function: &str) -> Option<&dyn CallTarget> {
        self.targets.get(function).map(|t| t.as_ref())
    }
}

/// Replay a stored call against a currently-live callable.
///
/// Arguments are the call's *entry* bindings, reconstructed through one
/// shared cache and bound to the target's parameters by name. The three
/// failure modes stay distinct: [`ReanimateError::FunctionNotFound`] when
/// the resolver misses, [`ReanimateError::SignatureMismatch`] when a
/// declared parameter has no stored binding, and
/// [`ReanimateError::ExecutionError`] when the target itself fails.
pub fn execute_reanimated<S: ObjectStore + ?Sized>(
    calls: &InMemoryCallGraph,
    store: &S,
    id: CallId,
    resolver: &dyn Resolver,
) -> ReanimateResult<LiveValue> {
    let record = calls.call(id)?;

    let target = resolver
        .resolve(&record.function)
        .ok_or_else(|| ReanimateError::FunctionNotFound {
            function: record.function.clone(),
        })?;

    let signature = target.signature();
    let mut materializer = Materializer::new(store);
    let mut args = Vec::with_capacity(signature.params.len());
    for param in &signature.params {
        let hash = record
            .locals
            .get(param)
            .ok_or_else(|| ReanimateError::SignatureMismatch {
                function: record.function.clone(),
                parameter: param.clone(),
            })?;
        args.push((param.clone(), materializer.materialize(hash)?));
    }

    debug!(call = %id, function = %record.function, "replaying call");
    target
        .invoke(&ArgumentSet { args })
        .map_err(|message| ReanimateError::ExecutionError {
            function: record.function.clone(),
            message,
        })
}
