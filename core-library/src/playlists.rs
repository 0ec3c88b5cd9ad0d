//! User playlists persisted in the settings store.

use crate::error::{LibraryError, Result};
use crate::models::{AudioTrack, Playlist};
use bridge_traits::storage::SettingsStore;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Settings key holding every playlist as one JSON array.
pub const PLAYLISTS_KEY: &str = "playlists";

/// The user's playlists.
///
/// Playlists are only ever created or appended to. Every change is written
/// to the [`SettingsStore`] before it becomes visible, so a failed write
/// leaves the in-memory book unchanged.
pub struct PlaylistBook {
    store: Arc<dyn SettingsStore>,
    events: EventBus,
    playlists: Mutex<Option<Vec<Playlist>>>,
}

impl PlaylistBook {
    pub fn new(store: Arc<dyn SettingsStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            playlists: Mutex::new(None),
        }
    }

    async fn read_stored(&self) -> Result<Vec<Playlist>> {
        match self.store.get_string(PLAYLISTS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_stored(&self, playlists: &[Playlist]) -> Result<()> {
        let json = serde_json::to_string(playlists)?;
        self.store.set_string(PLAYLISTS_KEY, &json).await?;
        Ok(())
    }

    /// Run `change` against a copy of the book, persist it, then commit.
    async fn update<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Playlist>) -> Result<T> + Send,
        T: Send,
    {
        let mut guard = self.playlists.lock().await;
        let mut playlists = match guard.as_ref() {
            Some(cached) => cached.clone(),
            None => self.read_stored().await?,
        };

        let outcome = change(&mut playlists)?;
        self.write_stored(&playlists).await?;
        *guard = Some(playlists);
        Ok(outcome)
    }

    /// All playlists in creation order.
    pub async fn list(&self) -> Result<Vec<Playlist>> {
        let mut guard = self.playlists.lock().await;
        if guard.is_none() {
            let stored = self.read_stored().await?;
            debug!(count = stored.len(), "Loaded playlists");
            *guard = Some(stored);
        }
        Ok(guard.clone().unwrap_or_default())
    }

    pub async fn get(&self, name: &str) -> Result<Playlist> {
        let wanted = Playlist::normalize(name);
        self.list()
            .await?
            .into_iter()
            .find(|playlist| Playlist::normalize(&playlist.name) == wanted)
            .ok_or_else(|| LibraryError::PlaylistNotFound(name.to_string()))
    }

    /// Create a playlist, optionally seeded with its first track.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a blank name
    /// - `DuplicatePlaylist` when the name is taken (case-insensitive)
    #[instrument(skip(self, first_track))]
    pub async fn create(&self, name: &str, first_track: Option<AudioTrack>) -> Result<Playlist> {
        let playlist = Playlist::new(name.trim()).with_audios(first_track.into_iter().collect());
        playlist
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "name".to_string(),
                message,
            })?;

        let created = self
            .update(|playlists| {
                let normalized = Playlist::normalize(&playlist.name);
                if playlists
                    .iter()
                    .any(|existing| Playlist::normalize(&existing.name) == normalized)
                {
                    return Err(LibraryError::DuplicatePlaylist(playlist.name.clone()));
                }
                playlists.push(playlist.clone());
                Ok(playlist)
            })
            .await?;

        info!(name = %created.name, tracks = created.len(), "Playlist created");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::PlaylistCreated {
                name: created.name.clone(),
            }))
            .ok();

        Ok(created)
    }

    /// Append a track to the end of a playlist.
    ///
    /// # Errors
    ///
    /// - `PlaylistNotFound` when no playlist has that name
    /// - `DuplicateTrack` when the track is already in it
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn append(&self, name: &str, track: AudioTrack) -> Result<Playlist> {
        let wanted = Playlist::normalize(name);
        let track_id = track.id.to_string();

        let updated = self
            .update(|playlists| {
                let playlist = playlists
                    .iter_mut()
                    .find(|playlist| Playlist::normalize(&playlist.name) == wanted)
                    .ok_or_else(|| LibraryError::PlaylistNotFound(name.to_string()))?;

                if playlist.contains(&track.id) {
                    return Err(LibraryError::DuplicateTrack {
                        playlist: playlist.name.clone(),
                        track_id: track.id.to_string(),
                    });
                }

                playlist.audios.push(track);
                Ok(playlist.clone())
            })
            .await?;

        debug!(name = %updated.name, tracks = updated.len(), "Track appended");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::PlaylistUpdated {
                name: updated.name.clone(),
                track_id,
                track_count: updated.len(),
            }))
            .ok();

        Ok(updated)
    }
}
