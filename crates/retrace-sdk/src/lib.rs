//! High-level recorder facade for the Retrace execution recorder.
//!
//! [`Recorder`] is what the collector talks to: it consumes
//! [`CaptureEvent`]s (call start, call end, line snapshot), checks the
//! recording gate, stores values content-addressed, maintains the call
//! graph, snapshot log, version timeline, and session registry, and —
//! when opened durably — mirrors every mutation into the capture archive
//! so the whole history survives the process.
//!
//! The [`Recorder::ingest`] boundary is fail-safe: a capture failure is
//! logged and the event dropped, never propagated into the monitored
//! program.

pub mod error;
pub mod events;
pub mod recorder;

pub use error::{SdkError, SdkResult};
pub use events::{CallEnd, CallStart, CaptureEvent, CapturedValue, LineCapture};
pub use recorder::Recorder;
