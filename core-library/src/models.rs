//! Domain models for the device library
//!
//! Tracks are immutable descriptors created once at enumeration time.
//! Playlists are ordered track lists that only ever grow by appending.

use bridge_traits::media::AudioAsset;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a track, as assigned by the host media library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// One playable audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Unique within the library
    pub id: TrackId,
    /// Playable resource locator handed to the engine
    pub uri: String,
    /// Display name
    pub filename: String,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl AudioTrack {
    pub fn new(
        id: impl Into<String>,
        uri: impl Into<String>,
        filename: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: TrackId::new(id),
            uri: uri.into(),
            filename: filename.into(),
            duration_ms,
        }
    }
}

impl From<AudioAsset> for AudioTrack {
    fn from(asset: AudioAsset) -> Self {
        Self {
            id: TrackId::new(asset.id),
            uri: asset.uri,
            filename: asset.filename,
            duration_ms: asset.duration_ms,
        }
    }
}

/// User playlist, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    /// Tracks in play order
    pub audios: Vec<AudioTrack>,
}

impl Playlist {
    /// Create an empty playlist
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            audios: Vec::new(),
        }
    }

    /// Add tracks on construction
    pub fn with_audios(mut self, audios: Vec<AudioTrack>) -> Self {
        self.audios = audios;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }

        Ok(())
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.audios.iter().any(|track| &track.id == id)
    }

    pub fn len(&self) -> usize {
        self.audios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audios.is_empty()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.audios.iter().map(|track| track.duration_ms).sum()
    }

    /// Normalize a name for uniqueness checks
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}
