//! Crash-recoverable durable archive of capture events.
//!
//! Every mutation of the in-memory stores has a durable mirror: an
//! [`ArchiveEvent`] appended to a [`CaptureLog`]. The log is a single
//! append-only file with length + CRC32 framing per entry; recovery reads
//! it front-to-back, skipping torn writes, and the recorder rebuilds the
//! complete in-memory state by replaying the events in order. Within-call
//! snapshot ordering is preserved because events are appended under the
//! caller, in capture order.

pub mod error;
pub mod event;
pub mod log;
pub mod store;

pub use error::{ArchiveError, ArchiveResult};
pub use event::ArchiveEvent;
pub use log::{CaptureLog, Durability};
pub use store::ArchivingStore;
