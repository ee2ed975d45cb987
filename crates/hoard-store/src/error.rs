use hoard_types::MultiError;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No value is stored under the key.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error from a local backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by a remote backend.
    #[error("{backend} error: {reason}")]
    Backend { backend: String, reason: String },

    /// A remote operation exceeded its deadline.
    #[error("{operation} of {key} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        key: String,
        seconds: u64,
    },

    /// Bytes read back after a write did not match the bytes written.
    #[error("verification failed for {key}: wrote {written}, read back {read}")]
    VerificationFailed {
        key: String,
        written: String,
        read: String,
    },

    /// One or more replicas failed a fanned-out operation.
    #[error("{operation} failed in {failed} replica(s): {source}")]
    Replicas {
        operation: &'static str,
        failed: usize,
        #[source]
        source: MultiError<StoreError>,
    },

    /// The backend could not be constructed.
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
