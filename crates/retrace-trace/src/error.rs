use retrace_types::CallId;

/// Errors from snapshot log operations.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// No snapshot stream exists for the given call.
    #[error("no snapshots recorded for call {0}")]
    NotFound(CallId),
}

/// Result alias for snapshot log operations.
pub type TraceResult<T> = Result<T, TraceError>;
