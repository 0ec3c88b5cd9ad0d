//! # Playback Error Types
//!
//! Errors raised while driving the playback engine. Transport operations do
//! not return them directly; they are logged, published on the event bus and
//! reported through [`Transition::Failed`](crate::controller::Transition).

use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine adapter rejected or failed a command.
    #[error("Engine command failed: {0}")]
    Engine(#[from] BridgeError),

    /// The engine did not answer within the configured command timeout.
    #[error("Engine command '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// Seek fraction outside `[0, 1]` or not a number.
    #[error("Seek fraction out of range: {0}")]
    InvalidSeek(f64),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Reading or writing the last-played record failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl PlaybackError {
    /// Returns `true` if repeating the same action may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::Timeout { .. }
                | PlaybackError::Engine(BridgeError::OperationFailed(_))
                | PlaybackError::Engine(BridgeError::Io(_))
                | PlaybackError::Persistence(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
