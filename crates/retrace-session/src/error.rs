use retrace_types::SessionId;

/// Errors from session registry operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session does not exist.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The session has already ended.
    #[error("session {0} has already ended")]
    AlreadyEnded(SessionId),
}

/// Result alias for session registry operations.
pub type SessionResult<T> = Result<T, SessionError>;
