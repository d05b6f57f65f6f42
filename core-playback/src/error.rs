//! # Playback Error Types
//!
//! Errors raised by the media element controller, the playlist sequencer and
//! the offline cache.

use thiserror::Error;

use crate::status::{Operation, PlayerStatus};

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Controller Errors
    // ========================================================================
    /// The operation is not valid in the controller's current status.
    #[error("Cannot {operation} while {status}")]
    InvalidTransition {
        operation: Operation,
        status: PlayerStatus,
    },

    // ========================================================================
    // Sequencer Errors
    // ========================================================================
    /// Track index is out of range, or no album is set.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Offline cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// A file of an album download could not be fetched.
    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Host bridge reported a failure.
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),

    /// Library error from core-library.
    #[error("Library error: {0}")]
    Library(#[from] core_library::error::LibraryError),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PlaybackError {
    /// Returns `true` for misuse of the controller state machine.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, PlaybackError::InvalidTransition { .. })
    }

    /// Returns `true` if this error came from the offline cache.
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::CacheError(_) | PlaybackError::DownloadFailed { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
