//! Error type shared by the linking engine.

use thiserror::Error;

/// Errors that abort a linking run.
///
/// Degenerate data (empty frames, oversized subnetworks, frames where every
/// particle is below the quality cutoff) is never reported here.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Configuration rejected before any frame was processed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frame ordering or particle data violates the input contract
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The cancel flag was raised between frame transitions
    #[error("Linking cancelled before frame {frame}")]
    Cancelled { frame: u32 },
}

pub type Result<T> = std::result::Result<T, LinkError>;
