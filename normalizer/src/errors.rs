use store::{EncodingError, StoreError};
use thiserror::Error;

/// Failures while normalizing one landing record.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The stored transport encoding cannot be reversed.
    #[error("decode error: {0}")]
    Decode(#[from] EncodingError),

    /// The document does not have the shape its content-type promises.
    #[error("validation error: {0}")]
    Validation(String),

    /// The landing record is missing required routing metadata.
    #[error("missing metadata field: {0}")]
    MissingMetadata(&'static str),

    /// A store operation failed; may succeed on retry.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkerError {
    /// Whether the record itself is at fault (quarantine) as opposed to the
    /// infrastructure (retry / redeliver).
    pub fn is_malformed_record(&self) -> bool {
        matches!(
            self,
            WorkerError::Decode(_) | WorkerError::Validation(_) | WorkerError::MissingMetadata(_)
        )
    }
}
