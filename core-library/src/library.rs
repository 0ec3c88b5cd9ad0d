//! Permission-gated device library loading.

use crate::error::{LibraryError, Result};
use crate::models::AudioTrack;
use bridge_traits::media::MediaLibraryAdapter;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Loads the device audio collection through a [`MediaLibraryAdapter`].
///
/// Enumeration only runs once media access is granted:
///
/// 1. Query the current permission without prompting.
/// 2. If not granted and the host may still ask, prompt the user.
/// 3. A refusal surfaces as [`LibraryError::PermissionDenied`]; with
///    `can_ask_again == false` it is final and the adapter is never asked to
///    enumerate.
pub struct MediaLibrary {
    adapter: Arc<dyn MediaLibraryAdapter>,
    events: EventBus,
}

impl MediaLibrary {
    pub fn new(adapter: Arc<dyn MediaLibraryAdapter>, events: EventBus) -> Self {
        Self { adapter, events }
    }

    /// Make sure media access is granted, prompting when allowed.
    #[instrument(skip(self))]
    pub async fn ensure_permission(&self) -> Result<()> {
        let current = self.adapter.permission_status().await?;
        if current.granted {
            return Ok(());
        }

        if current.is_blocked() {
            return Err(self.denied(false));
        }

        debug!("Requesting media permission");
        let requested = self.adapter.request_permission().await?;
        if requested.granted {
            info!("Media permission granted");
            return Ok(());
        }

        Err(self.denied(requested.can_ask_again))
    }

    /// Enumerate every audio track on the device.
    ///
    /// # Errors
    ///
    /// - `LibraryError::PermissionDenied` when access is refused
    /// - `LibraryError::Bridge` when the host fails to enumerate
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<AudioTrack>> {
        self.ensure_permission().await?;

        let tracks: Vec<AudioTrack> = self
            .adapter
            .list_audio_assets()
            .await?
            .into_iter()
            .map(AudioTrack::from)
            .collect();

        info!(track_count = tracks.len(), "Library loaded");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::Loaded {
                track_count: tracks.len(),
            }))
            .ok();

        Ok(tracks)
    }

    fn denied(&self, can_ask_again: bool) -> LibraryError {
        warn!(can_ask_again, "Media permission denied");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::PermissionDenied {
                can_ask_again,
            }))
            .ok();
        LibraryError::PermissionDenied { can_ask_again }
    }
}
