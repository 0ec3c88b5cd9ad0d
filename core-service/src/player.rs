//! Player loop and the handle hosts use to drive it.
//!
//! One task owns the [`TransportController`] and feeds it user intents and
//! engine status reports one at a time, in arrival order. The same task
//! follows playlist edits so the active queue never goes stale.

use crate::error::{CoreError, Result};
use bridge_traits::playback::StatusReceiver;
use core_library::models::AudioTrack;
use core_library::PlaylistBook;
use core_playback::{
    Direction, PlaybackSnapshot, QueueContext, TransportController, Transition,
};
use core_runtime::events::{CoreEvent, EventBus, EventStream, LibraryEvent, Receiver, RecvError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// A user action for the transport.
#[derive(Debug, Clone)]
pub enum Intent {
    SelectTrack {
        track: AudioTrack,
        context: Option<QueueContext>,
    },
    Pause,
    Resume,
    Advance(Direction),
    /// Seek to a fraction of the current track, in `[0, 1]`.
    Seek(f64),
}

struct Command {
    intent: Intent,
    reply: oneshot::Sender<Transition>,
}

/// Cloneable handle to the running player.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<Command>,
    controller: Arc<TransportController>,
    events: EventBus,
}

impl PlayerHandle {
    /// Queue `intent` and wait for the transition it produced.
    ///
    /// # Errors
    ///
    /// `CoreError::PlayerStopped` once the player loop has shut down.
    pub async fn send(&self, intent: Intent) -> Result<Transition> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command { intent, reply })
            .await
            .map_err(|_| CoreError::PlayerStopped)?;
        outcome.await.map_err(|_| CoreError::PlayerStopped)
    }

    pub async fn select_track(&self, track: AudioTrack, context: Option<QueueContext>) -> Result<Transition> {
        self.send(Intent::SelectTrack { track, context }).await
    }

    pub async fn pause(&self) -> Result<Transition> {
        self.send(Intent::Pause).await
    }

    pub async fn resume(&self) -> Result<Transition> {
        self.send(Intent::Resume).await
    }

    pub async fn next(&self) -> Result<Transition> {
        self.send(Intent::Advance(Direction::Next)).await
    }

    pub async fn previous(&self) -> Result<Transition> {
        self.send(Intent::Advance(Direction::Previous)).await
    }

    pub async fn seek(&self, fraction: f64) -> Result<Transition> {
        self.send(Intent::Seek(fraction)).await
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.controller.snapshot()
    }

    /// Snapshot-changed notifications.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.controller.state().subscribe()
    }

    /// Discrete playback and library events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Library tracks in enumeration order.
    pub fn library(&self) -> Arc<Vec<AudioTrack>> {
        self.controller.library()
    }
}

/// Start the player loop on the current runtime.
pub(crate) fn spawn(
    controller: Arc<TransportController>,
    playlists: Arc<PlaylistBook>,
    statuses: StatusReceiver,
    events: EventBus,
    capacity: usize,
    shutdown: CancellationToken,
) -> (PlayerHandle, tokio::task::JoinHandle<()>) {
    let (commands, intents) = mpsc::channel(capacity);
    let edits = Edits {
        playlists,
        events: events.subscribe(),
    };
    let task = tokio::spawn(run(Arc::clone(&controller), intents, statuses, edits, shutdown));

    let handle = PlayerHandle {
        commands,
        controller,
        events,
    };
    (handle, task)
}

/// Playlist edits the loop follows.
struct Edits {
    playlists: Arc<PlaylistBook>,
    events: Receiver<CoreEvent>,
}

async fn run(
    controller: Arc<TransportController>,
    mut intents: mpsc::Receiver<Command>,
    mut statuses: StatusReceiver,
    edits: Edits,
    shutdown: CancellationToken,
) {
    let Edits {
        playlists,
        events: mut library_events,
    } = edits;
    info!("Player loop started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Player loop cancelled");
                break;
            }
            Some(status) = statuses.recv() => {
                let transition = controller.on_engine_status(status).await;
                trace!(?transition, "Engine status applied");
            }
            Some(command) = intents.recv() => {
                let transition = apply(&controller, command.intent).await;
                debug!(?transition, "Intent applied");
                command.reply.send(transition).ok();
            }
            event = library_events.recv() => match event {
                Ok(CoreEvent::Library(LibraryEvent::PlaylistUpdated { name, .. })) => {
                    refresh_playlist(&controller, &playlists, &name).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Player loop fell behind on events");
                }
                Err(RecvError::Closed) => break,
            },
            else => break,
        }
    }

    info!("Player loop stopped");
}

async fn refresh_playlist(controller: &TransportController, playlists: &PlaylistBook, name: &str) {
    match playlists.get(name).await {
        Ok(playlist) => {
            controller.refresh_playlist(&playlist);
        }
        Err(err) => warn!(playlist = name, error = %err, "Could not reread updated playlist"),
    }
}

async fn apply(controller: &TransportController, intent: Intent) -> Transition {
    match intent {
        Intent::SelectTrack { track, context } => controller.select_track(track, context).await,
        Intent::Pause => controller.pause().await,
        Intent::Resume => controller.resume().await,
        Intent::Advance(direction) => controller.advance(direction).await,
        Intent::Seek(fraction) => controller.seek(fraction).await,
    }
}
