use retrace_types::CallId;

use crate::call::CallState;

/// Errors from call graph operations.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The call does not exist (never begun, or deleted).
    #[error("call not found: {0}")]
    NotFound(CallId),

    /// The call is in the wrong lifecycle state for the operation.
    #[error("call {id} is {actual}, expected {expected}")]
    InvalidState {
        id: CallId,
        actual: CallState,
        expected: CallState,
    },

    /// The call-tree invariant was violated.
    #[error("call-tree invariant violated: {reason}")]
    InvalidNesting { reason: String },
}

/// Result alias for call graph operations.
pub type CallResult<T> = Result<T, CallError>;
