//! Error types for the tracking writer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WriterError>;

/// Errors that can occur while persisting a tracking batch
#[derive(Debug, Error)]
pub enum WriterError {
    /// Storage backend could not be initialized
    #[error("Failed to initialize {backend} storage: {source}")]
    Init {
        backend: &'static str,
        #[source]
        source: opendal::Error,
    },

    /// An event could not be serialized
    #[error("Failed to encode tracking event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Storage write failed
    #[error("Failed to write '{path}': {source}")]
    Storage {
        path: String,
        #[source]
        source: opendal::Error,
    },
}
