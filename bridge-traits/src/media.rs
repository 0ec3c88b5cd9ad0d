//! Device media enumeration abstractions.
//!
//! Hosts expose the device's audio collection (MediaStore on Android, the
//! MPMediaLibrary on iOS, a music folder on desktop) through
//! [`MediaLibraryAdapter`]. Access is gated behind a runtime permission that
//! the user may decline, either for now or for good.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of a permission query or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    /// Media access is granted.
    pub granted: bool,
    /// The host may prompt the user again. `false` together with
    /// `granted == false` means the user declined permanently.
    pub can_ask_again: bool,
}

impl PermissionStatus {
    pub fn granted() -> Self {
        Self {
            granted: true,
            can_ask_again: true,
        }
    }

    pub fn denied(can_ask_again: bool) -> Self {
        Self {
            granted: false,
            can_ask_again,
        }
    }

    /// Denied with no way to prompt again.
    pub fn is_blocked(&self) -> bool {
        !self.granted && !self.can_ask_again
    }
}

/// Audio asset descriptor as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAsset {
    /// Host identifier, unique within the device library.
    pub id: String,
    /// Playable resource locator handed back to the playback engine.
    pub uri: String,
    /// Display name.
    pub filename: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Media library access trait.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::MediaLibraryAdapter;
///
/// async fn count_tracks(media: &dyn MediaLibraryAdapter) -> Result<usize> {
///     if !media.permission_status().await?.granted {
///         media.request_permission().await?;
///     }
///     Ok(media.list_audio_assets().await?.len())
/// }
/// ```
#[async_trait]
pub trait MediaLibraryAdapter: Send + Sync {
    /// Read the current permission state without prompting.
    async fn permission_status(&self) -> Result<PermissionStatus>;

    /// Prompt the user for media access.
    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Enumerate every audio asset on the device.
    async fn list_audio_assets(&self) -> Result<Vec<AudioAsset>>;
}
