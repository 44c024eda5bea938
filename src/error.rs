//! Error types for the modelyard engine

use thiserror::Error;

/// Result type alias for modelyard operations
pub type Result<T> = std::result::Result<T, ModelyardError>;

/// Main error type for the modelyard engine
#[derive(Error, Debug)]
pub enum ModelyardError {
    /// Malformed input: bad feature values, numeric class columns, etc.
    /// Surfaced immediately, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Structural problems in a training or test dataset.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Unknown model name on predict/evaluate/activate/delete/load.
    #[error("Model not found: {0}")]
    NotFound(String),

    /// Deleting the active model while alternatives remain.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Durable read/write failure. During training this prevents any
    /// registry mutation: the registry never reflects a model whose
    /// artifact failed to persist.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ModelyardError {
    fn from(err: serde_json::Error) -> Self {
        ModelyardError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelyardError::NotFound("riskmodel".to_string());
        assert_eq!(err.to_string(), "Model not found: riskmodel");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ModelyardError = io_err.into();
        assert!(matches!(err, ModelyardError::Io(_)));
    }
}
