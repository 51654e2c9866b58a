use retrace_archive::ArchiveError;
use retrace_callgraph::CallError;
use retrace_reanimate::ReanimateError;
use retrace_session::SessionError;
use retrace_store::StoreError;
use retrace_timeline::TimelineError;
use retrace_trace::TraceError;

/// Aggregated error for recorder operations.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Reanimate(#[from] ReanimateError),
}

/// Result alias for recorder operations.
pub type SdkResult<T> = Result<T, SdkError>;
