use retrace_types::Identity;

/// Errors from version chain operations.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// No chain exists for the given identity.
    #[error("unknown identity: {0}")]
    UnknownIdentity(Identity),

    /// The chain exists but has no entry with the given sequence number.
    #[error("identity {identity} has no version {seq}")]
    UnknownVersion { identity: Identity, seq: u64 },
}

/// Result alias for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;
