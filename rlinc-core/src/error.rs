//! Error types for the core library

use thiserror::Error;

/// Core error type for learner and solver operations
#[derive(Error, Debug)]
pub enum RlError {
    /// Malformed argument at construction time
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Dimension mismatch between collaborating components
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A linear system could not be solved
    #[error("Singular system: {0}")]
    Singular(String),

    /// Operation not implemented by this variant
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// Episode bookkeeping errors
    #[error("Episode error: {0}")]
    Episode(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, RlError>;
