use retrace_callgraph::CallError;
use retrace_store::StoreError;

/// Errors from reanimation.
///
/// The three boundary failure modes — resolver miss, argument shape
/// mismatch, and target failure — are distinct variants by design and are
/// never merged.
#[derive(Debug, thiserror::Error)]
pub enum ReanimateError {
    /// A stored record could not be read or decoded.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The call record could not be read.
    #[error("call graph error: {0}")]
    Call(#[from] CallError),

    /// The resolver found no live callable for the function identity.
    #[error("no live function found for '{function}'")]
    FunctionNotFound { function: String },

    /// The reconstructed arguments do not fit the callable's parameters.
    #[error("reconstructed arguments do not fit '{function}': missing parameter '{parameter}'")]
    SignatureMismatch { function: String, parameter: String },

    /// The callable itself failed once invoked.
    #[error("reanimated call to '{function}' failed: {message}")]
    ExecutionError { function: String, message: String },
}

/// Result alias for reanimation operations.
pub type ReanimateResult<T> = Result<T, ReanimateError>;
