//! Normalization Error Types

use thiserror::Error;

/// Errors while reading an upstream signal envelope
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Envelope text is not valid JSON
    #[error("Invalid signal envelope: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
