//! Lifecycle and parent/child linkage of recorded function calls.
//!
//! Each call moves through `Open → Closed`, with `{Open, Closed} → Deleted`
//! as the removal path. Parent/child linkage is validated against the
//! call-tree invariant (a parent's time interval encompasses each child's)
//! and is meaningful only within one logical call stack — cross-thread
//! parenting is never inferred here.
//!
//! A call that stays `Open` because the monitored process died mid-call is
//! "abandoned": a defined non-error state that readers must tolerate.

pub mod call;
pub mod error;
pub mod memory;

pub use call::{CallRecord, CallStartInfo, CallState};
pub use error::{CallError, CallResult};
pub use memory::InMemoryCallGraph;
