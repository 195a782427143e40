//! Crate-wide error type

use thiserror::Error;

/// Every fallible operation in the crate reports one of these
#[derive(Error, Debug)]
pub enum SVMError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid model format: {0}")]
    FormatError(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Solver did not converge: {0}")]
    ConvergenceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, SVMError>;
