//! # Playback State
//!
//! The single authoritative snapshot of what is playing, held in a
//! `tokio::sync::watch` channel so any number of observers can follow it.
//!
//! Only the transport layer writes to the store; everyone else gets
//! read-only access through [`PlaybackStateStore::get`] and
//! [`PlaybackStateStore::subscribe`].

use crate::queue::QueueMode;
use bridge_traits::playback::SessionId;
use core_library::models::{AudioTrack, Playlist};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Transport state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerStatus {
    /// Nothing loaded in the engine.
    #[default]
    Idle,
    /// A load was issued and has not settled yet.
    Loading,
    Playing,
    Paused,
}

/// Current playback state.
///
/// `current_index`, when set, indexes into the active list: the playlist in
/// `queue` when queue mode is on, the library otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub current_track: Option<AudioTrack>,
    pub current_index: Option<usize>,
    pub status: PlayerStatus,
    pub queue: QueueMode,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    /// Engine session currently loaded, if any.
    pub session: Option<SessionId>,
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        self.status == PlayerStatus::Playing
    }

    /// Traversal follows a playlist instead of the library.
    pub fn is_queue_mode_active(&self) -> bool {
        self.queue.is_playlist()
    }

    pub fn active_queue(&self) -> Option<&Playlist> {
        self.queue.playlist()
    }

    /// Playing or paused with an engine session behind it.
    pub fn has_live_session(&self) -> bool {
        self.session.is_some()
            && matches!(self.status, PlayerStatus::Playing | PlayerStatus::Paused)
    }

    pub fn is_current(&self, track: &AudioTrack) -> bool {
        self.current_track
            .as_ref()
            .map_or(false, |current| current.id == track.id)
    }
}

/// Observable holder of the [`PlaybackSnapshot`].
#[derive(Debug)]
pub struct PlaybackStateStore {
    sender: watch::Sender<PlaybackSnapshot>,
}

impl Default for PlaybackStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStateStore {
    /// Store holding an empty snapshot.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(PlaybackSnapshot::default());
        Self { sender }
    }

    /// Copy of the current snapshot.
    pub fn get(&self) -> PlaybackSnapshot {
        self.sender.borrow().clone()
    }

    /// Receiver notified after every change. The current value is available
    /// immediately through `borrow()`.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.sender.subscribe()
    }

    /// Mutate the snapshot in place and notify subscribers if anything
    /// changed. Returns whether it changed.
    pub(crate) fn update(&self, apply: impl FnOnce(&mut PlaybackSnapshot)) -> bool {
        self.sender.send_if_modified(|snapshot| {
            let before = snapshot.clone();
            apply(snapshot);
            *snapshot != before
        })
    }
}
