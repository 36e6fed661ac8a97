//! Error types for priority scoring

use thiserror::Error;
use vassago_core::CoreError;

/// Result type for priority operations
pub type Result<T> = std::result::Result<T, PriorityError>;

/// Errors that can occur while building a scorer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriorityError {
    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] CoreError),
}
