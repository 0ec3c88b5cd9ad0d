use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Media access was declined. With `can_ask_again == false` the decision
    /// is final and enumeration must not be attempted.
    #[error("Media permission denied (can ask again: {can_ask_again})")]
    PermissionDenied { can_ask_again: bool },

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("Playlist already exists: {0}")]
    DuplicatePlaylist(String),

    #[error("Track {track_id} is already in playlist {playlist}")]
    DuplicateTrack { playlist: String, track_id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LibraryError {
    /// Denied for good; the UI should show a blocking state.
    pub fn is_permanent_denial(&self) -> bool {
        matches!(self, LibraryError::PermissionDenied { can_ask_again: false })
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
