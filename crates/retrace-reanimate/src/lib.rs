//! Reconstruction of live values from stored execution history.
//!
//! Materialization is identity-preserving: live values are
//! `Rc<RefCell<LiveNode>>`, every composite registers itself in the cache
//! *before* its children are built, and back-references resolve against the
//! traversal stack. Shared substructure reconstructs as one shared object,
//! and cyclic values come back pointing at themselves — without unbounded
//! recursion in either case.
//!
//! Values stored as unrepresentable sentinels materialize to a typed
//! stand-in and flag the result as degraded; degradation is always
//! explicit, never silent.

pub mod call;
pub mod error;
pub mod execute;
pub mod live;
pub mod materialize;

pub use call::{reanimate_call, ReanimatedCall};
pub use error::{ReanimateError, ReanimateResult};
pub use execute::{execute_reanimated, ArgumentSet, CallTarget, FunctionTable, Resolver, Signature};
pub use live::{live, structural_eq, LiveNode, LiveValue};
pub use materialize::Materializer;
