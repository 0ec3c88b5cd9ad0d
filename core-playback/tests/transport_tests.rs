//! Transport state machine tests against a scripted engine.
//!
//! This test suite verifies:
//! - Tap toggling, skipping and seeking
//! - Auto-advance at the end of a track, in library and playlist mode
//! - Stale completions and stale status reports being discarded
//! - Engine failures and timeouts leaving the snapshot in place

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    EngineStatus, LoadOptions, PlaybackEngineAdapter, SessionId, StatusSender,
};
use core_library::models::{AudioTrack, Playlist, TrackId};
use core_playback::{
    Direction, LastPlayed, PersistenceBridge, PlayerStatus, PlaybackError, QueueContext,
    QueueMode, Result, TransportConfig, TransportController, Transition,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Scripted Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Load { uri: String, autoplay: bool },
    PlayFrom(u64),
    Pause,
    Resume,
    SeekTo(u64),
    Stop,
    Unload,
}

#[derive(Default)]
struct ScriptedEngine {
    calls: Mutex<Vec<Call>>,
    session: Mutex<Option<SessionId>>,
    position_ms: Mutex<u64>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing_loads: Mutex<HashSet<String>>,
    fail_pause: Mutex<bool>,
    hang_pause: Mutex<bool>,
}

impl ScriptedEngine {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn session(&self) -> SessionId {
        self.session.lock().unwrap().expect("no session loaded")
    }

    /// Hold loads of `uri` until the returned handle is notified.
    fn gate(&self, uri: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(uri.to_string(), Arc::clone(&gate));
        gate
    }

    fn fail_loads_of(&self, uri: &str) {
        self.failing_loads.lock().unwrap().insert(uri.to_string());
    }

    fn report(&self, is_playing: bool) -> EngineStatus {
        let position = *self.position_ms.lock().unwrap();
        EngineStatus::loaded(self.session(), is_playing).with_progress(position, 10_000)
    }
}

#[async_trait]
impl PlaybackEngineAdapter for ScriptedEngine {
    async fn load(&self, uri: &str, options: LoadOptions) -> BridgeResult<SessionId> {
        self.record(Call::Load {
            uri: uri.to_string(),
            autoplay: options.autoplay,
        });

        let gate = self.gates.lock().unwrap().remove(uri);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failing = self.failing_loads.lock().unwrap().contains(uri);
        if failing {
            return Err(BridgeError::OperationFailed(format!("cannot decode {}", uri)));
        }

        let session = SessionId::new();
        *self.session.lock().unwrap() = Some(session);
        *self.position_ms.lock().unwrap() = 0;
        Ok(session)
    }

    async fn play_from_position(&self, position_millis: u64) -> BridgeResult<EngineStatus> {
        self.record(Call::PlayFrom(position_millis));
        *self.position_ms.lock().unwrap() = position_millis;
        Ok(self.report(true))
    }

    async fn pause(&self) -> BridgeResult<EngineStatus> {
        self.record(Call::Pause);
        let hang = *self.hang_pause.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        let fail = *self.fail_pause.lock().unwrap();
        if fail {
            return Err(BridgeError::OperationFailed("audio focus lost".to_string()));
        }
        Ok(self.report(false))
    }

    async fn resume(&self) -> BridgeResult<EngineStatus> {
        self.record(Call::Resume);
        Ok(self.report(true))
    }

    async fn seek_to(&self, position_millis: u64) -> BridgeResult<EngineStatus> {
        self.record(Call::SeekTo(position_millis));
        *self.position_ms.lock().unwrap() = position_millis;
        Ok(self.report(false))
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record(Call::Stop);
        Ok(())
    }

    async fn unload(&self) -> BridgeResult<()> {
        self.record(Call::Unload);
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn status(&self) -> BridgeResult<EngineStatus> {
        let loaded = self.session.lock().unwrap().is_some();
        Ok(if loaded {
            self.report(false)
        } else {
            EngineStatus::unloaded()
        })
    }

    fn set_status_sender(&self, _sender: StatusSender) {}
}

// ============================================================================
// In-memory Persistence
// ============================================================================

#[derive(Default)]
struct MemoryPersistence {
    slot: Mutex<Option<LastPlayed>>,
}

impl MemoryPersistence {
    fn saved(&self) -> Option<(String, usize, u64)> {
        self.slot
            .lock()
            .unwrap()
            .as_ref()
            .map(|record| (record.track.id.to_string(), record.index, record.position_ms))
    }
}

#[async_trait]
impl PersistenceBridge for MemoryPersistence {
    async fn save_last_played(&self, record: &LastPlayed) -> Result<()> {
        *self.slot.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    async fn load_last_played(&self) -> Result<Option<LastPlayed>> {
        Ok(self.slot.lock().unwrap().clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn track(id: &str) -> AudioTrack {
    AudioTrack::new(id, uri(id), format!("{}.mp3", id), 10_000)
}

fn uri(id: &str) -> String {
    format!("file:///music/{}.mp3", id)
}

struct Harness {
    engine: Arc<ScriptedEngine>,
    persistence: Arc<MemoryPersistence>,
    events: EventBus,
    controller: Arc<TransportController>,
}

fn harness_with(library: &[&str], config: TransportConfig) -> Harness {
    let engine = Arc::new(ScriptedEngine::default());
    let persistence = Arc::new(MemoryPersistence::default());
    let events = EventBus::new(64);

    let controller = TransportController::new(
        Arc::clone(&engine) as Arc<dyn PlaybackEngineAdapter>,
        Arc::clone(&persistence) as Arc<dyn PersistenceBridge>,
        events.clone(),
        config,
    );
    controller.set_library(library.iter().map(|id| track(id)).collect());

    Harness {
        engine,
        persistence,
        events,
        controller: Arc::new(controller),
    }
}

fn harness(library: &[&str]) -> Harness {
    harness_with(library, TransportConfig::default())
}

fn current_id(controller: &TransportController) -> Option<TrackId> {
    controller.snapshot().current_track.map(|track| track.id)
}

// ============================================================================
// Selection and toggling
// ============================================================================

#[tokio::test]
async fn test_tapping_playing_track_alternates_pause_and_resume() {
    let h = harness(&["a", "b", "c"]);

    assert!(matches!(
        h.controller.select_track(track("b"), None).await,
        Transition::Played { index: 1, .. }
    ));

    let mut playing = Vec::new();
    for _ in 0..3 {
        h.controller.select_track(track("b"), None).await;
        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.current_index, Some(1));
        playing.push(snapshot.is_playing());
    }

    assert_eq!(playing, vec![false, true, false]);
    assert_eq!(
        h.engine.calls(),
        vec![
            Call::Load { uri: uri("b"), autoplay: true },
            Call::Pause,
            Call::Resume,
            Call::Pause,
        ]
    );
}

#[tokio::test]
async fn test_different_track_unloads_previous_session_first() {
    let h = harness(&["a", "b"]);
    h.controller.select_track(track("a"), None).await;
    h.controller.select_track(track("b"), None).await;

    assert_eq!(
        h.engine.calls(),
        vec![
            Call::Load { uri: uri("a"), autoplay: true },
            Call::Stop,
            Call::Unload,
            Call::Load { uri: uri("b"), autoplay: true },
        ]
    );
    assert_eq!(current_id(&h.controller), Some(TrackId::from("b")));
    assert_eq!(h.persistence.saved(), Some(("b".to_string(), 1, 0)));
}

#[tokio::test]
async fn test_later_tap_wins_over_slow_load() {
    let h = harness(&["a", "b"]);
    let gate = h.engine.gate(&uri("a"));

    let first = h.controller.select_track(track("a"), None);
    let second = h.controller.select_track(track("b"), None);
    let release = async {
        tokio::task::yield_now().await;
        gate.notify_one();
    };
    let (first, second, _) = tokio::join!(first, second, release);

    assert!(matches!(first, Transition::Superseded));
    assert!(matches!(second, Transition::Played { .. }));

    let snapshot = h.controller.snapshot();
    assert_eq!(current_id(&h.controller), Some(TrackId::from("b")));
    assert_eq!(snapshot.current_index, Some(1));
    assert!(snapshot.is_playing());
    assert_eq!(snapshot.session, Some(h.engine.session()));
}

#[tokio::test]
async fn test_superseded_load_releases_its_session() {
    let h = harness(&["a", "b"]);
    let gate = h.engine.gate(&uri("a"));
    h.engine.fail_loads_of(&uri("b"));

    let first = h.controller.select_track(track("a"), None);
    let second = h.controller.select_track(track("b"), None);
    let release = async {
        tokio::task::yield_now().await;
        gate.notify_one();
    };
    let (first, second, _) = tokio::join!(first, second, release);

    assert!(matches!(first, Transition::Superseded));
    assert!(second.is_failed());

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.status, PlayerStatus::Idle);
    assert_eq!(snapshot.session, None);
    assert_eq!(snapshot.current_track, None);
    assert_eq!(
        h.engine.calls(),
        vec![
            Call::Load { uri: uri("a"), autoplay: true },
            Call::Stop,
            Call::Unload,
            Call::Load { uri: uri("b"), autoplay: true },
        ]
    );
}

// ============================================================================
// Auto-advance
// ============================================================================

#[tokio::test]
async fn test_finishing_last_library_track_resets_to_first_without_playing() {
    let h = harness(&["a", "b", "c"]);
    let mut events = h.events.subscribe();
    h.controller.select_track(track("c"), None).await;
    let session = h.engine.session();

    let transition = h
        .controller
        .on_engine_status(EngineStatus::loaded(session, false).finished())
        .await;

    assert!(matches!(transition, Transition::ResetToStart));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.current_track, Some(track("a")));
    assert_eq!(snapshot.current_index, Some(0));
    assert!(!snapshot.is_playing());
    assert_eq!(snapshot.session, None);
    assert_eq!(h.persistence.saved(), Some(("a".to_string(), 0, 0)));

    let mut seen = Vec::new();
    while let Ok(CoreEvent::Playback(event)) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&PlaybackEvent::Completed {
        track_id: "c".to_string()
    }));
    assert!(seen.contains(&PlaybackEvent::Stopped {
        track_id: "c".to_string()
    }));
}

#[tokio::test]
async fn test_finishing_mid_library_autoplays_next() {
    let h = harness(&["a", "b", "c"]);
    h.controller.select_track(track("a"), None).await;
    let session = h.engine.session();

    let transition = h
        .controller
        .on_engine_status(EngineStatus::loaded(session, false).finished())
        .await;

    assert!(matches!(transition, Transition::Played { index: 1, .. }));
    assert!(h.controller.snapshot().is_playing());
    assert_eq!(
        h.engine.calls().last(),
        Some(&Call::Load { uri: uri("b"), autoplay: true })
    );
}

#[tokio::test]
async fn test_playlist_next_wraps_to_first_and_plays() {
    let h = harness(&["a", "b", "c"]);
    let mix = Playlist::new("Mix").with_audios(vec![track("x"), track("y")]);

    h.controller
        .select_track(track("y"), Some(QueueContext::playlist(mix.clone())))
        .await;
    assert_eq!(h.controller.snapshot().current_index, Some(1));

    let transition = h.controller.advance(Direction::Next).await;

    assert!(matches!(transition, Transition::Played { index: 0, .. }));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.current_track, Some(track("x")));
    assert!(snapshot.is_playing());
    assert_eq!(snapshot.queue, QueueMode::Playlist(mix));
}

#[tokio::test]
async fn test_playlist_finish_stays_in_playlist() {
    let h = harness(&["a", "b", "c"]);
    let mix = Playlist::new("Mix").with_audios(vec![track("x"), track("y")]);
    h.controller
        .select_track(track("y"), Some(QueueContext::playlist(mix)))
        .await;
    let session = h.engine.session();

    h.controller
        .on_engine_status(EngineStatus::loaded(session, false).finished())
        .await;

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.current_track, Some(track("x")));
    assert!(snapshot.is_playing());
    assert!(snapshot.is_queue_mode_active());
}

#[tokio::test]
async fn test_appended_playlist_track_joins_running_queue() {
    let h = harness(&["a", "b", "c"]);
    let mix = Playlist::new("Mix").with_audios(vec![track("c"), track("a")]);
    h.controller
        .select_track(track("a"), Some(QueueContext::playlist(mix.clone())))
        .await;

    let other = Playlist::new("Other").with_audios(vec![track("b")]);
    assert!(!h.controller.refresh_playlist(&other));

    let grown = mix.with_audios(vec![track("c"), track("a"), track("b")]);
    assert!(h.controller.refresh_playlist(&grown));
    assert_eq!(h.controller.snapshot().current_index, Some(1));

    let transition = h.controller.advance(Direction::Next).await;
    assert!(matches!(transition, Transition::Played { index: 2, .. }));
    assert_eq!(current_id(&h.controller), Some(TrackId::from("b")));
    assert_eq!(h.controller.snapshot().queue, QueueMode::Playlist(grown));
}

#[tokio::test]
async fn test_previous_from_first_wraps_to_last() {
    let h = harness(&["a", "b", "c"]);
    h.controller.select_track(track("a"), None).await;

    h.controller.advance(Direction::Previous).await;
    assert_eq!(current_id(&h.controller), Some(TrackId::from("c")));
    assert_eq!(h.controller.snapshot().current_index, Some(2));
}

#[tokio::test]
async fn test_advance_without_current_or_tracks() {
    let h = harness(&["a", "b", "c"]);
    h.controller.advance(Direction::Previous).await;
    assert_eq!(current_id(&h.controller), Some(TrackId::from("c")));

    let empty = harness(&[]);
    assert!(matches!(
        empty.controller.advance(Direction::Next).await,
        Transition::Ignored
    ));
    assert!(empty.engine.calls().is_empty());
}

// ============================================================================
// Status reports
// ============================================================================

#[tokio::test]
async fn test_status_of_replaced_session_is_discarded() {
    let h = harness(&["a", "b"]);
    h.controller.select_track(track("a"), None).await;
    let old_session = h.engine.session();
    h.controller.select_track(track("b"), None).await;

    let transition = h
        .controller
        .on_engine_status(EngineStatus::loaded(old_session, true).with_progress(9_000, 10_000))
        .await;

    assert!(matches!(transition, Transition::Superseded));
    assert_eq!(h.controller.snapshot().position_ms, None);

    let stale_finish = h
        .controller
        .on_engine_status(EngineStatus::loaded(old_session, false).finished())
        .await;
    assert!(matches!(stale_finish, Transition::Superseded));
    assert_eq!(current_id(&h.controller), Some(TrackId::from("b")));
}

#[tokio::test]
async fn test_progress_is_mirrored_and_paused_position_saved() {
    let h = harness(&["a", "b"]);
    h.controller.select_track(track("b"), None).await;
    let session = h.engine.session();

    h.controller
        .on_engine_status(EngineStatus::loaded(session, true).with_progress(2_000, 10_000))
        .await;
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.position_ms, Some(2_000));
    assert_eq!(snapshot.duration_ms, Some(10_000));

    h.controller
        .on_engine_status(EngineStatus::loaded(session, false).with_progress(3_500, 10_000))
        .await;
    assert_eq!(h.persistence.saved(), Some(("b".to_string(), 1, 3_500)));
}

// ============================================================================
// Seeking
// ============================================================================

#[tokio::test]
async fn test_seek_without_session_is_noop() {
    let h = harness(&["a", "b"]);
    let before = h.controller.snapshot();

    assert!(matches!(h.controller.seek(0.5).await, Transition::Ignored));
    assert_eq!(h.controller.snapshot(), before);
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn test_seek_while_paused_resumes() {
    let h = harness(&["a"]);
    h.controller.select_track(track("a"), None).await;
    h.controller.pause().await;
    assert_eq!(h.controller.snapshot().status, PlayerStatus::Paused);

    let transition = h.controller.seek(0.25).await;

    assert!(matches!(transition, Transition::Seeked { position_ms: 2_500 }));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.position_ms, Some(2_500));
    assert!(snapshot.is_playing());
    assert!(h.engine.calls().ends_with(&[Call::SeekTo(2_500), Call::Resume]));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failed_pause_leaves_snapshot_unchanged() {
    let h = harness(&["a"]);
    h.controller.select_track(track("a"), None).await;
    *h.engine.fail_pause.lock().unwrap() = true;
    let mut events = h.events.subscribe();
    let before = h.controller.snapshot();

    let transition = h.controller.pause().await;

    assert!(matches!(transition, Transition::Failed(PlaybackError::Engine(_))));
    assert_eq!(h.controller.snapshot(), before);
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Playback(PlaybackEvent::Error { .. })
    ));
}

#[tokio::test]
async fn test_failed_load_keeps_previous_track_current() {
    let h = harness(&["a", "b"]);
    h.controller.select_track(track("a"), None).await;
    h.engine.fail_loads_of(&uri("b"));

    let transition = h.controller.select_track(track("b"), None).await;

    assert!(transition.is_failed());
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.current_track, Some(track("a")));
    assert_eq!(snapshot.current_index, Some(0));
    assert_eq!(snapshot.session, None);
    assert_eq!(snapshot.status, PlayerStatus::Idle);
    assert_eq!(h.persistence.saved(), Some(("a".to_string(), 0, 0)));
}

#[tokio::test]
async fn test_hung_engine_command_times_out() {
    let h = harness_with(
        &["a"],
        TransportConfig {
            progress_update_interval_ms: 500,
            command_timeout: Some(Duration::from_millis(20)),
        },
    );
    h.controller.select_track(track("a"), None).await;
    *h.engine.hang_pause.lock().unwrap() = true;

    let transition = h.controller.pause().await;

    match transition {
        Transition::Failed(err @ PlaybackError::Timeout { operation: "pause", .. }) => {
            assert!(err.is_transient());
        }
        other => panic!("expected a pause timeout, got {:?}", other),
    }
    assert!(h.controller.snapshot().is_playing());
}

// ============================================================================
// Resume after restart
// ============================================================================

#[tokio::test]
async fn test_restart_resumes_paused_position() {
    let h = harness(&["a", "b", "c"]);
    h.controller.select_track(track("b"), None).await;
    let session = h.engine.session();
    h.controller
        .on_engine_status(EngineStatus::loaded(session, false).with_progress(6_000, 10_000))
        .await;

    let restarted = TransportController::new(
        Arc::new(ScriptedEngine::default()),
        Arc::clone(&h.persistence) as Arc<dyn PersistenceBridge>,
        EventBus::new(8),
        TransportConfig::default(),
    );
    restarted.set_library(vec![track("a"), track("b"), track("c")]);

    assert!(matches!(
        restarted.restore().await,
        Transition::Restored { index: 1, .. }
    ));
    let snapshot = restarted.snapshot();
    assert_eq!(snapshot.current_track, Some(track("b")));
    assert_eq!(snapshot.position_ms, Some(6_000));
    assert_eq!(snapshot.status, PlayerStatus::Idle);

    restarted.select_track(track("b"), None).await;
    assert_eq!(restarted.snapshot().position_ms, Some(6_000));
    assert!(restarted.snapshot().is_playing());
}

#[tokio::test]
async fn test_restore_waits_for_pending_selection() {
    let h = harness(&["a", "b", "c"]);
    let gate = h.engine.gate(&uri("a"));

    let selection = h.controller.select_track(track("a"), None);
    let restore = h.controller.restore();
    let release = async {
        tokio::task::yield_now().await;
        gate.notify_one();
    };
    let (selection, restore, _) = tokio::join!(selection, restore, release);

    assert!(matches!(selection, Transition::Played { index: 0, .. }));
    assert!(matches!(restore, Transition::Ignored));

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.current_track, Some(track("a")));
    assert_eq!(snapshot.status, PlayerStatus::Playing);
    assert!(snapshot.has_live_session());
    assert_eq!(
        h.engine.calls(),
        vec![Call::Load { uri: uri("a"), autoplay: true }]
    );

    assert!(matches!(h.controller.pause().await, Transition::Paused { .. }));
}
