//! Playback engine bridge trait and supporting status types.
//!
//! The core never decodes or outputs audio itself. Host applications wrap the
//! device's audio primitives (AVPlayer, ExoPlayer, expo-av, rodio, ...) behind
//! [`PlaybackEngineAdapter`] and the transport layer drives it through this
//! async-first surface.
//!
//! One adapter instance exists per process and owns at most one loaded audio
//! session at a time. Every call may fail; callers are expected to catch the
//! error at their own boundary.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default interval between status updates while a session is loaded.
pub const DEFAULT_PROGRESS_UPDATE_INTERVAL_MS: u64 = 1000;

/// Identifier of one loaded audio session.
///
/// A new identifier is minted by every successful [`PlaybackEngineAdapter::load`]
/// and stamped onto each [`EngineStatus`] the adapter emits for that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Options supplied alongside a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Start playing as soon as the source is loaded.
    pub autoplay: bool,
    /// How often the adapter should emit status updates while loaded.
    pub progress_update_interval_ms: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            progress_update_interval_ms: DEFAULT_PROGRESS_UPDATE_INTERVAL_MS,
        }
    }
}

impl LoadOptions {
    /// Attach the autoplay flag.
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Attach the progress interval.
    pub fn with_progress_interval(mut self, interval_ms: u64) -> Self {
        self.progress_update_interval_ms = interval_ms;
        self
    }
}

/// Status report emitted by the adapter, either as the result of a command or
/// periodically while a session is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Session this status belongs to, `None` when nothing is loaded.
    pub session: Option<SessionId>,
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_millis: Option<u64>,
    pub duration_millis: Option<u64>,
    /// Set exactly once, on the tick where the loaded source reached its end.
    pub did_just_finish: bool,
}

impl EngineStatus {
    /// Status of an adapter with nothing loaded.
    pub fn unloaded() -> Self {
        Self {
            session: None,
            is_loaded: false,
            is_playing: false,
            position_millis: None,
            duration_millis: None,
            did_just_finish: false,
        }
    }

    /// Status of a loaded session.
    pub fn loaded(session: SessionId, is_playing: bool) -> Self {
        Self {
            session: Some(session),
            is_loaded: true,
            is_playing,
            position_millis: None,
            duration_millis: None,
            did_just_finish: false,
        }
    }

    /// Attach position and duration.
    pub fn with_progress(mut self, position_millis: u64, duration_millis: u64) -> Self {
        self.position_millis = Some(position_millis);
        self.duration_millis = Some(duration_millis);
        self
    }

    /// Mark this status as the end-of-source tick.
    pub fn finished(mut self) -> Self {
        self.did_just_finish = true;
        self.is_playing = false;
        self
    }
}

/// Channel end the adapter pushes status updates into.
pub type StatusSender = mpsc::UnboundedSender<EngineStatus>;

/// Channel end the core drains status updates from.
pub type StatusReceiver = mpsc::UnboundedReceiver<EngineStatus>;

/// Create a connected status channel.
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    mpsc::unbounded_channel()
}

/// Trait for platform-specific adapters that drive the native audio engine.
#[async_trait::async_trait]
pub trait PlaybackEngineAdapter: Send + Sync {
    /// Load a playable resource. Any previously loaded session must have been
    /// stopped and unloaded by the caller. Returns the new session identifier.
    async fn load(&self, uri: &str, options: LoadOptions) -> Result<SessionId>;

    /// Start playback of the loaded session from an absolute position.
    async fn play_from_position(&self, position_millis: u64) -> Result<EngineStatus>;

    /// Pause without releasing the session.
    async fn pause(&self) -> Result<EngineStatus>;

    /// Resume a paused session.
    async fn resume(&self) -> Result<EngineStatus>;

    /// Seek to an absolute position within the loaded session.
    async fn seek_to(&self, position_millis: u64) -> Result<EngineStatus>;

    /// Stop playback and rewind the loaded session.
    async fn stop(&self) -> Result<()>;

    /// Release the loaded session.
    async fn unload(&self) -> Result<()>;

    /// Query the adapter's current view of its session.
    async fn status(&self) -> Result<EngineStatus>;

    /// Register the channel status updates are delivered on. Replaces any
    /// previously registered sender.
    fn set_status_sender(&self, sender: StatusSender);
}
