//! # Transport Controller
//!
//! The playback state machine. Every user intent and every engine status
//! report goes through [`TransportController`], which drives the
//! [`PlaybackEngineAdapter`], writes the [`PlaybackStateStore`] and records
//! the last-played slot.
//!
//! ## States
//!
//! ```text
//!            select                 engine confirms
//!   Idle ───────────────> Loading ──────────────────> Playing <──┐
//!    ^                       ^                          │  ^     │ resume /
//!    │ end of library        │ advance / finish /       │  │     │ tap / seek
//!    │                       │ different track          │  │     │
//!    └───────────────────────┴──────────────────────────┘  │     │
//!                                                   pause  v     │
//!                                                        Paused ─┘
//! ```
//!
//! ## Ordering
//!
//! Engine commands are serialized through one async mutex, so a new load
//! always stops and unloads the previous session first. Track-changing intents
//! bump an epoch counter when issued; a load whose epoch is no longer current
//! once it resolves is a stale completion and does not touch the track
//! identity in the snapshot. Engine status reports carry the [`SessionId`]
//! they belong to and are discarded unless it matches the loaded session.
//!
//! ## Errors
//!
//! Operations return a [`Transition`] rather than `Result`. An engine failure
//! is logged, published as [`PlaybackEvent::Error`] and reported as
//! [`Transition::Failed`]; the snapshot keeps its previous track.

use crate::error::{PlaybackError, Result};
use crate::persistence::{LastPlayed, PersistenceBridge};
use crate::queue::{next_index, position_of, Direction, QueueContext, QueueMode};
use crate::state::{PlaybackSnapshot, PlayerStatus, PlaybackStateStore};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::playback::{EngineStatus, LoadOptions, PlaybackEngineAdapter, SessionId};
use bridge_traits::time::{Clock, SystemClock};
use core_library::models::{AudioTrack, Playlist, TrackId};
use core_runtime::config::PlayerConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::strip_path;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Settings the controller needs from [`PlayerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Status interval requested from the engine on every load.
    pub progress_update_interval_ms: u64,
    /// Upper bound for one engine command. `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&PlayerConfig::default())
    }
}

impl From<&PlayerConfig> for TransportConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            progress_update_interval_ms: config.progress_update_interval_ms,
            command_timeout: config.command_timeout(),
        }
    }
}

// ============================================================================
// Transition
// ============================================================================

/// Outcome of one transport operation.
#[derive(Debug)]
pub enum Transition {
    /// A track was loaded and is playing.
    Played { track_id: TrackId, index: usize },
    /// Playback paused. `position_ms` is the engine's position, if reported.
    Paused { position_ms: Option<u64> },
    Resumed,
    Seeked { position_ms: u64 },
    /// The library ran out; the first track is current and not playing.
    ResetToStart,
    /// The snapshot was rehydrated from the last-played record.
    Restored { track_id: TrackId, index: usize },
    /// Position or duration mirrored from an engine status report.
    Progress,
    /// Nothing to do in the current state.
    Ignored,
    /// A newer intent or session took over; the result was discarded.
    Superseded,
    /// The engine failed. The snapshot still shows the previous track.
    Failed(PlaybackError),
}

impl Transition {
    pub fn is_failed(&self) -> bool {
        matches!(self, Transition::Failed(_))
    }

    /// Returns the error of a failed transition.
    pub fn error(&self) -> Option<&PlaybackError> {
        match self {
            Transition::Failed(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// TransportController
// ============================================================================

/// Single writer of the playback snapshot.
pub struct TransportController {
    engine: Arc<dyn PlaybackEngineAdapter>,
    persistence: Arc<dyn PersistenceBridge>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: TransportConfig,
    store: PlaybackStateStore,
    library: RwLock<Arc<Vec<AudioTrack>>>,
    /// Serializes engine command sequences.
    engine_lock: tokio::sync::Mutex<()>,
    /// Bumped by every track-changing intent.
    epoch: AtomicU64,
    /// Where the restored track left off, consumed by its first play.
    resume_position: Mutex<Option<(TrackId, u64)>>,
}

impl TransportController {
    pub fn new(
        engine: Arc<dyn PlaybackEngineAdapter>,
        persistence: Arc<dyn PersistenceBridge>,
        events: EventBus,
        config: TransportConfig,
    ) -> Self {
        Self {
            engine,
            persistence,
            events,
            clock: Arc::new(SystemClock),
            config,
            store: PlaybackStateStore::new(),
            library: RwLock::new(Arc::new(Vec::new())),
            engine_lock: tokio::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
            resume_position: Mutex::new(None),
        }
    }

    /// Replace the clock used to stamp last-played records.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Read-only access to the snapshot store.
    pub fn state(&self) -> &PlaybackStateStore {
        &self.store
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.store.get()
    }

    /// The library tracks in enumeration order.
    pub fn library(&self) -> Arc<Vec<AudioTrack>> {
        Arc::clone(&self.library.read())
    }

    /// Replace the library. In library mode the current index is recomputed
    /// against the new list.
    pub fn set_library(&self, tracks: Vec<AudioTrack>) {
        let library = Arc::new(tracks);
        *self.library.write() = Arc::clone(&library);

        self.store.update(|snapshot| {
            if snapshot.queue.is_playlist() {
                return;
            }
            snapshot.current_index = snapshot
                .current_track
                .as_ref()
                .and_then(|track| position_of(&library, &track.id));
        });
        debug!(track_count = library.len(), "Library replaced");
    }

    /// Pick up a changed copy of the playlist being traversed.
    ///
    /// Does nothing unless queue mode is on for a playlist with the same
    /// name. The current index is recomputed against the new track list.
    pub fn refresh_playlist(&self, playlist: &Playlist) -> bool {
        let wanted = Playlist::normalize(&playlist.name);
        let refreshed = self.store.update(|snapshot| {
            let QueueMode::Playlist(active) = &snapshot.queue else {
                return;
            };
            if Playlist::normalize(&active.name) != wanted || active == playlist {
                return;
            }
            snapshot.current_index = snapshot
                .current_track
                .as_ref()
                .and_then(|track| position_of(&playlist.audios, &track.id));
            snapshot.queue = QueueMode::Playlist(playlist.clone());
        });
        if refreshed {
            debug!(name = %playlist.name, tracks = playlist.len(), "Active playlist refreshed");
        }
        refreshed
    }

    // ------------------------------------------------------------------------
    // User intents
    // ------------------------------------------------------------------------

    /// The user tapped `track`.
    ///
    /// Tapping the current track toggles pause and resume. Any other tap
    /// loads and plays the track in the queue described by `context`, or in
    /// the library when no context is given.
    #[instrument(skip(self, track, context), fields(track_id = %track.id))]
    pub async fn select_track(&self, track: AudioTrack, context: Option<QueueContext>) -> Transition {
        let snapshot = self.store.get();
        if snapshot.is_current(&track) && snapshot.has_live_session() {
            return match snapshot.status {
                PlayerStatus::Playing => self.pause().await,
                PlayerStatus::Paused => self.resume().await,
                _ => Transition::Ignored,
            };
        }

        let mode = context.map(QueueContext::into_mode).unwrap_or_default();
        let library = self.library();
        let Some(index) = position_of(mode.active_list(&library), &track.id) else {
            warn!("Selected track is not in the active list");
            return Transition::Ignored;
        };

        let start = self
            .resume_position
            .lock()
            .as_ref()
            .filter(|(id, _)| *id == track.id)
            .map(|(_, position)| *position);

        let epoch = self.begin_intent();
        self.load_and_play(epoch, track, index, mode, start).await
    }

    /// Pause the playing session.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Transition {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let guard = self.engine_lock.lock().await;
        if !self.is_current(epoch) {
            return Transition::Superseded;
        }

        let snapshot = self.store.get();
        if snapshot.session.is_none() || snapshot.status != PlayerStatus::Playing {
            return Transition::Ignored;
        }
        let track_id = snapshot.current_track.as_ref().map(|track| track.id.clone());

        let reported = match self.call("pause", self.engine.pause()).await {
            Ok(status) => status,
            Err(err) => {
                drop(guard);
                return self.fail(track_id.as_ref(), err);
            }
        };

        let position = reported.position_millis.or(snapshot.position_ms);
        self.store.update(|s| {
            s.status = PlayerStatus::Paused;
            if position.is_some() {
                s.position_ms = position;
            }
            if reported.duration_millis.is_some() {
                s.duration_ms = reported.duration_millis;
            }
        });
        drop(guard);

        if let Some(track) = &snapshot.current_track {
            info!(track_id = %track.id, position_ms = ?position, "Paused");
            self.emit(PlaybackEvent::Paused {
                track_id: track.id.to_string(),
                position_ms: position.unwrap_or(0),
            });
            self.persist(track, position.unwrap_or(0)).await;
        }

        Transition::Paused { position_ms: position }
    }

    /// Resume the paused session.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Transition {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let guard = self.engine_lock.lock().await;
        if !self.is_current(epoch) {
            return Transition::Superseded;
        }

        let snapshot = self.store.get();
        if snapshot.session.is_none() || snapshot.status != PlayerStatus::Paused {
            return Transition::Ignored;
        }
        let track_id = snapshot.current_track.as_ref().map(|track| track.id.clone());

        let reported = match self.call("resume", self.engine.resume()).await {
            Ok(status) => status,
            Err(err) => {
                drop(guard);
                return self.fail(track_id.as_ref(), err);
            }
        };

        let position = reported.position_millis.or(snapshot.position_ms);
        self.store.update(|s| {
            s.status = PlayerStatus::Playing;
            if position.is_some() {
                s.position_ms = position;
            }
        });
        drop(guard);

        if let Some(id) = track_id {
            info!(track_id = %id, "Resumed");
            self.emit(PlaybackEvent::Resumed {
                track_id: id.to_string(),
                position_ms: position.unwrap_or(0),
            });
        }

        Transition::Resumed
    }

    /// Skip to the next or previous track of the active queue, wrapping at
    /// both ends. Does nothing when the queue is empty.
    #[instrument(skip(self))]
    pub async fn advance(&self, direction: Direction) -> Transition {
        let snapshot = self.store.get();
        let library = self.library();
        let list = snapshot.queue.active_list(&library);
        let current = snapshot.current_track.as_ref().map(|track| &track.id);

        let Some(index) = next_index(list, current, direction) else {
            debug!("Active queue is empty");
            return Transition::Ignored;
        };
        let track = list[index].clone();

        let epoch = self.begin_intent();
        self.load_and_play(epoch, track, index, snapshot.queue.clone(), None)
            .await
    }

    /// Jump to `fraction` of the current track and keep playing.
    ///
    /// A paused session resumes after the seek. Without a loaded session this
    /// is a no-op.
    #[instrument(skip(self))]
    pub async fn seek(&self, fraction: f64) -> Transition {
        if !(0.0..=1.0).contains(&fraction) {
            let track_id = self.store.get().current_track.map(|track| track.id);
            return self.fail(track_id.as_ref(), PlaybackError::InvalidSeek(fraction));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let guard = self.engine_lock.lock().await;
        if !self.is_current(epoch) {
            return Transition::Superseded;
        }

        let snapshot = self.store.get();
        let Some(track) = snapshot.current_track.clone() else {
            return Transition::Ignored;
        };
        if !snapshot.has_live_session() {
            debug!("No live session to seek in");
            return Transition::Ignored;
        }

        let duration_ms = snapshot.duration_ms.unwrap_or(track.duration_ms);
        let target = (fraction * duration_ms as f64).floor() as u64;

        let result = async {
            self.call("seek_to", self.engine.seek_to(target)).await?;
            self.call("resume", self.engine.resume()).await
        }
        .await;
        if let Err(err) = result {
            drop(guard);
            return self.fail(Some(&track.id), err);
        }

        self.store.update(|s| {
            s.position_ms = Some(target);
            s.duration_ms = Some(duration_ms);
            s.status = PlayerStatus::Playing;
        });
        drop(guard);

        debug!(track_id = %track.id, position_ms = target, "Seeked");
        self.emit(PlaybackEvent::PositionChanged {
            track_id: track.id.to_string(),
            position_ms: target,
            duration_ms,
        });

        Transition::Seeked { position_ms: target }
    }

    // ------------------------------------------------------------------------
    // Engine status
    // ------------------------------------------------------------------------

    /// Apply one status report from the engine.
    ///
    /// Reports from any session other than the loaded one are discarded.
    #[instrument(skip(self, status), fields(session = ?status.session))]
    pub async fn on_engine_status(&self, status: EngineStatus) -> Transition {
        let snapshot = self.store.get();
        if status.session.is_none() || status.session != snapshot.session {
            debug!("Discarding status of a stale session");
            return Transition::Superseded;
        }

        if status.did_just_finish {
            return self.on_finished(snapshot).await;
        }

        if !status.is_loaded
            || !matches!(snapshot.status, PlayerStatus::Playing | PlayerStatus::Paused)
        {
            return Transition::Ignored;
        }

        self.store.update(|s| {
            if s.session != status.session {
                return;
            }
            if status.position_millis.is_some() {
                s.position_ms = status.position_millis;
            }
            if status.duration_millis.is_some() {
                s.duration_ms = status.duration_millis;
            }
        });

        if !status.is_playing {
            if let Some(track) = &snapshot.current_track {
                let position = status.position_millis.or(snapshot.position_ms);
                self.persist(track, position.unwrap_or(0)).await;
            }
        }

        Transition::Progress
    }

    async fn on_finished(&self, snapshot: PlaybackSnapshot) -> Transition {
        let Some(finished) = snapshot.current_track else {
            return Transition::Ignored;
        };

        let epoch = self.begin_intent();
        info!(track_id = %finished.id, "Track finished");
        self.emit(PlaybackEvent::Completed {
            track_id: finished.id.to_string(),
        });

        match &snapshot.queue {
            QueueMode::Playlist(playlist) => {
                let Some(index) = next_index(&playlist.audios, Some(&finished.id), Direction::Next) else {
                    return Transition::Ignored;
                };
                let track = playlist.audios[index].clone();
                self.load_and_play(epoch, track, index, snapshot.queue.clone(), None)
                    .await
            }
            QueueMode::Library => {
                let library = self.library();
                let next = position_of(&library, &finished.id).map_or(0, |p| p + 1);
                match library.get(next) {
                    Some(track) => {
                        self.load_and_play(epoch, track.clone(), next, QueueMode::Library, None)
                            .await
                    }
                    None => self.reset_to_start(epoch, &finished, &library).await,
                }
            }
        }
    }

    /// End of the library: release the engine and park on the first track
    /// without playing it.
    async fn reset_to_start(&self, epoch: u64, finished: &AudioTrack, library: &[AudioTrack]) -> Transition {
        let guard = self.engine_lock.lock().await;
        if !self.is_current(epoch) {
            return Transition::Superseded;
        }

        if let Err(err) = self.teardown().await {
            drop(guard);
            return self.fail(Some(&finished.id), err);
        }

        let first = library.first().cloned();
        self.store.update(|s| {
            s.current_track = first.clone();
            s.current_index = first.as_ref().map(|_| 0);
            s.status = PlayerStatus::Idle;
            s.queue = QueueMode::Library;
            s.position_ms = None;
            s.duration_ms = None;
        });
        *self.resume_position.lock() = None;
        drop(guard);

        info!("Reached end of library");
        self.emit(PlaybackEvent::Stopped {
            track_id: finished.id.to_string(),
        });
        if let Some(track) = &first {
            self.persist(track, 0).await;
        }

        Transition::ResetToStart
    }

    // ------------------------------------------------------------------------
    // Rehydration
    // ------------------------------------------------------------------------

    /// Make the last-played track current again after a restart.
    ///
    /// The track is looked up by id in the library, then by the saved index,
    /// then the first library track is used. Nothing is loaded into the
    /// engine; the saved position is applied when that same track is first
    /// played. Does nothing once a session is loaded, and never supersedes a
    /// pending selection.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Transition {
        let _guard = self.engine_lock.lock().await;
        if self.store.get().session.is_some() {
            return Transition::Ignored;
        }

        let library = self.library();
        if library.is_empty() {
            return Transition::Ignored;
        }

        let record = match self.persistence.load_last_played().await {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "Could not read last played, starting from the top");
                None
            }
        };

        let (index, position) = match &record {
            Some(saved) => match position_of(&library, &saved.track.id) {
                Some(index) => (index, Some(saved.position_ms)),
                None if saved.index < library.len() => (saved.index, None),
                None => (0, None),
            },
            None => (0, None),
        };
        let track = library[index].clone();

        self.store.update(|s| {
            s.current_track = Some(track.clone());
            s.current_index = Some(index);
            s.status = PlayerStatus::Idle;
            s.queue = QueueMode::Library;
            s.position_ms = position;
            s.duration_ms = None;
        });
        *self.resume_position.lock() = position
            .filter(|position| *position > 0)
            .map(|position| (track.id.clone(), position));

        info!(track_id = %track.id, index, position_ms = ?position, "Restored last played");
        Transition::Restored {
            track_id: track.id,
            index,
        }
    }

    // ------------------------------------------------------------------------
    // Engine sequences
    // ------------------------------------------------------------------------

    /// Replace the loaded session with `track` and commit it as current.
    ///
    /// With `start` set the track is loaded paused and then played from that
    /// position; otherwise it autoplays from the beginning.
    async fn load_and_play(
        &self,
        epoch: u64,
        track: AudioTrack,
        index: usize,
        mode: QueueMode,
        start: Option<u64>,
    ) -> Transition {
        let guard = self.engine_lock.lock().await;
        if !self.is_current(epoch) {
            debug!(track_id = %track.id, "Selection superseded before load");
            return Transition::Superseded;
        }

        let previous_status = self.store.get().status;
        self.store.update(|s| s.status = PlayerStatus::Loading);

        info!(
            track_id = %track.id,
            file = %strip_path(&track.uri),
            index,
            start_ms = ?start,
            "Loading track"
        );

        if let Err(err) = self.swap_session(&track, start).await {
            self.store.update(|s| {
                s.status = if s.session.is_some() {
                    previous_status
                } else {
                    PlayerStatus::Idle
                };
            });
            drop(guard);
            return self.fail(Some(&track.id), err);
        }

        if !self.is_current(epoch) {
            debug!(track_id = %track.id, "Load completed after a newer selection");
            if let Err(err) = self.teardown().await {
                warn!(track_id = %track.id, error = %err, "Failed to release superseded session");
            }
            self.store.update(|s| s.status = PlayerStatus::Idle);
            return Transition::Superseded;
        }

        self.store.update(|s| {
            s.current_track = Some(track.clone());
            s.current_index = Some(index);
            s.queue = mode;
            s.status = PlayerStatus::Playing;
            s.position_ms = start;
            s.duration_ms = None;
        });
        *self.resume_position.lock() = None;
        drop(guard);

        self.emit(PlaybackEvent::Started {
            track_id: track.id.to_string(),
            filename: track.filename.clone(),
            index,
        });
        self.persist(&track, start.unwrap_or(0)).await;

        Transition::Played {
            track_id: track.id,
            index,
        }
    }

    async fn swap_session(&self, track: &AudioTrack, start: Option<u64>) -> Result<SessionId> {
        self.teardown().await?;

        let options = LoadOptions::default()
            .with_autoplay(start.is_none())
            .with_progress_interval(self.config.progress_update_interval_ms);
        let session = self.call("load", self.engine.load(&track.uri, options)).await?;
        self.store.update(|s| s.session = Some(session));

        if let Some(position) = start {
            self.call("play_from_position", self.engine.play_from_position(position))
                .await?;
        }

        Ok(session)
    }

    /// Stop and release the loaded session, if any.
    async fn teardown(&self) -> Result<()> {
        if self.store.get().session.is_none() {
            return Ok(());
        }

        self.call("stop", self.engine.stop()).await?;
        self.call("unload", self.engine.unload()).await?;
        self.store.update(|s| s.session = None);
        Ok(())
    }

    /// Await one engine command, bounded by the configured timeout.
    async fn call<T, F>(&self, operation: &'static str, command: F) -> Result<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        match self.config.command_timeout {
            Some(after) => match tokio::time::timeout(after, command).await {
                Ok(result) => result.map_err(PlaybackError::from),
                Err(_) => Err(PlaybackError::Timeout { operation, after }),
            },
            None => command.await.map_err(PlaybackError::from),
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn begin_intent(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }

    fn fail(&self, track_id: Option<&TrackId>, err: PlaybackError) -> Transition {
        error!(
            track_id = track_id.map(TrackId::as_str),
            error = %err,
            "Transport command failed"
        );
        self.emit(PlaybackEvent::Error {
            track_id: track_id.map(ToString::to_string),
            message: err.to_string(),
            recoverable: err.is_transient(),
        });
        Transition::Failed(err)
    }

    /// Save the last-played slot. Failures are logged and otherwise ignored.
    async fn persist(&self, track: &AudioTrack, position_ms: u64) {
        let Some(index) = position_of(&self.library(), &track.id) else {
            debug!(track_id = %track.id, "Track is not in the library, not saving");
            return;
        };

        let record = LastPlayed {
            track: track.clone(),
            index,
            position_ms,
            saved_at: self.clock.now(),
        };
        if let Err(err) = self.persistence.save_last_played(&record).await {
            warn!(track_id = %track.id, error = %err, "Failed to save last played");
        }
    }
}
