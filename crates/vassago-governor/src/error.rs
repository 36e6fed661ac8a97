//! Error types for governor construction

use thiserror::Error;
use vassago_core::CoreError;

/// Result type for governor operations
pub type Result<T> = std::result::Result<T, GovernorError>;

/// Errors that can occur while building a governor
///
/// Recomputation itself never fails; only construction validates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovernorError {
    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] CoreError),

    /// Governor weights sum to zero
    #[error("Weights for {0} sum to zero")]
    ZeroWeights(&'static str),
}
