//! Core service façade and bootstrap.
//!
//! This crate wires the host-provided bridges (audio engine, media library,
//! settings store) into the player core and starts the player loop. Desktop
//! apps typically enable the `desktop-shims` feature, which lets
//! [`CoreConfig::builder`](core_runtime::config::CoreConfig::builder) fall
//! back to the adapters from `bridge-desktop`.
//!
//! ```no_run
//! # async fn example(engine: std::sync::Arc<dyn bridge_traits::PlaybackEngineAdapter>) -> core_service::Result<()> {
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder().playback_engine(engine).build()?;
//! let core = CoreService::bootstrap(config).await?;
//!
//! let first = core.player().library().first().cloned();
//! if let Some(track) = first {
//!     core.player().select_track(track, None).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod player;

pub use error::{CoreError, Result};
pub use player::{Intent, PlayerHandle};

use bridge_traits::playback::status_channel;
use core_library::{AudioTrack, LibraryError, MediaLibrary, PlaylistBook};
use core_playback::{
    QueueContext, SettingsPersistence, TransportConfig, TransportController, Transition,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Whether the device library could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LibraryStatus {
    Loading,
    Ready { track_count: usize },
    /// Media access was refused. With `can_ask_again == false` the refusal
    /// is final and only the system settings can lift it.
    PermissionDenied { can_ask_again: bool },
}

/// Primary façade exposed to host applications.
pub struct CoreService {
    library: MediaLibrary,
    playlists: Arc<PlaylistBook>,
    controller: Arc<TransportController>,
    restore_last_played: bool,
    player: PlayerHandle,
    library_status: watch::Sender<LibraryStatus>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CoreService {
    /// Start the core.
    ///
    /// Reads the device library (prompting for permission when needed),
    /// rehydrates the last played track and starts the player loop. A
    /// refused permission does not fail the bootstrap; it is reported through
    /// [`CoreService::library_status`] and the library stays empty.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `CoreError::Runtime` when the configuration is invalid
    /// - `CoreError::Library` when the host fails to enumerate media
    #[instrument(skip(config))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.player.event_buffer_size);
        let persistence = Arc::new(SettingsPersistence::new(Arc::clone(&config.settings_store)));
        let controller = Arc::new(
            TransportController::new(
                Arc::clone(&config.playback_engine),
                persistence,
                events.clone(),
                TransportConfig::from(&config.player),
            )
            .with_clock(Arc::clone(&config.clock)),
        );

        let (library_status, _) = watch::channel(LibraryStatus::Loading);
        let library = MediaLibrary::new(Arc::clone(&config.media_library), events.clone());
        let playlists = Arc::new(PlaylistBook::new(
            Arc::clone(&config.settings_store),
            events.clone(),
        ));

        load_library(&library, &controller, &library_status).await?;
        if config.player.restore_last_played {
            controller.restore().await;
        }

        let (status_tx, status_rx) = status_channel();
        config.playback_engine.set_status_sender(status_tx);

        let shutdown = CancellationToken::new();
        let (player, task) = player::spawn(
            Arc::clone(&controller),
            Arc::clone(&playlists),
            status_rx,
            events,
            config.player.intent_buffer_size,
            shutdown.clone(),
        );

        info!("Core service started");
        Ok(Self {
            library,
            playlists,
            controller,
            restore_last_played: config.player.restore_last_played,
            player,
            library_status,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Handle for driving playback.
    pub fn player(&self) -> &PlayerHandle {
        &self.player
    }

    /// The user's playlists. Appending to the playlist being played extends
    /// the running queue.
    pub fn playlists(&self) -> &PlaylistBook {
        &self.playlists
    }

    pub fn library_status(&self) -> watch::Receiver<LibraryStatus> {
        self.library_status.subscribe()
    }

    /// Read the device library again, prompting for permission if the host
    /// still may. Returns the number of tracks.
    ///
    /// When nothing is current yet, e.g. because access was only granted
    /// now, the last played track is rehydrated the same way as on bootstrap.
    pub async fn reload_library(&self) -> Result<usize> {
        load_library(&self.library, &self.controller, &self.library_status).await?;
        if self.restore_last_played && self.controller.snapshot().current_track.is_none() {
            self.controller.restore().await;
        }
        Ok(self.controller.library().len())
    }

    /// Play `track` with traversal following the playlist called `name`.
    pub async fn play_from_playlist(&self, name: &str, track: AudioTrack) -> Result<Transition> {
        let playlist = self.playlists.get(name).await?;
        self.player
            .select_track(track, Some(QueueContext::playlist(playlist)))
            .await
    }

    /// Stop the player loop and wait for it to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Player loop ended abnormally");
            }
        }
        info!("Core service stopped");
    }
}

impl Drop for CoreService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn load_library(
    library: &MediaLibrary,
    controller: &TransportController,
    status: &watch::Sender<LibraryStatus>,
) -> Result<()> {
    match library.load().await {
        Ok(tracks) => {
            let track_count = tracks.len();
            controller.set_library(tracks);
            status.send_replace(LibraryStatus::Ready { track_count });
            Ok(())
        }
        Err(LibraryError::PermissionDenied { can_ask_again }) => {
            status.send_replace(LibraryStatus::PermissionDenied { can_ask_again });
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
