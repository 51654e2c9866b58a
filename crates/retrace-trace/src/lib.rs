//! Ordered per-call line-execution snapshot log.
//!
//! Each recorded call owns one append-only stream of [`LineSnapshot`]s, one
//! per executed line the collector chose to capture. Snapshots reference
//! object-store hashes, never inline values: because unchanged bindings
//! between consecutive lines hash to the same store entry, per-line append
//! cost is proportional to the number of *touched* names, not to full-state
//! size. No diffing logic exists here — content addressing is the diff.

pub mod error;
pub mod memory;
pub mod snapshot;

pub use error::{TraceError, TraceResult};
pub use memory::InMemoryTraceLog;
pub use snapshot::LineSnapshot;
