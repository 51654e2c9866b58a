/// Errors from the capture archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// I/O failure on the archive file.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be serialized for appending.
    #[error("archive serialization error: {0}")]
    Serialization(String),
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
