//! Error types for the backfill engine

use std::time::Duration;
use thiserror::Error;

/// Errors produced while building or rendering a backfill
#[derive(Error, Debug)]
pub enum BackfillError {
    /// Render was attempted before any increment was recorded
    #[error("no records to render")]
    EmptyHistory,

    /// The sampling step is zero or too large to be represented
    #[error("resolution must be a positive duration, got {0:?}")]
    InvalidResolution(Duration),

    /// The sink refused the rendered samples
    #[error("failed to write samples: {0}")]
    Io(#[from] std::io::Error),
}
