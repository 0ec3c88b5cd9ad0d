//! # Core Configuration Module
//!
//! Builder-based configuration for the player core.
//!
//! ## Overview
//!
//! `CoreConfig` carries the host bridges the core consumes plus the tunable
//! [`PlayerConfig`]. The builder fails fast with an actionable
//! [`Error::CapabilityMissing`] when a required bridge is absent.
//!
//! ## Required Dependencies
//!
//! - `PlaybackEngineAdapter` - always injected by the host
//! - `MediaLibraryAdapter` - device audio enumeration
//! - `SettingsStore` - last-played slot and playlists
//!
//! When the `desktop-shims` feature is enabled, a JSON-file `SettingsStore`
//! under the user data directory and a `MediaLibraryAdapter` scanning the
//! user's music directory are injected when not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlayerConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .playback_engine(Arc::new(MyEngine::new()))
//!     .media_library(Arc::new(MyMediaLibrary))
//!     .settings_store(Arc::new(MySettings))
//!     .player(PlayerConfig::default().with_command_timeout_ms(5_000))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, MediaLibraryAdapter, PlaybackEngineAdapter, SettingsStore, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Player Configuration
// ============================================================================

/// Tunables of the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Interval the engine is asked to report status at while loaded.
    ///
    /// Default: 1000 ms.
    #[serde(default = "default_progress_update_interval_ms")]
    pub progress_update_interval_ms: u64,

    /// Upper bound for a single engine command. `None` waits indefinitely.
    ///
    /// Default: `None`.
    #[serde(default)]
    pub command_timeout_ms: Option<u64>,

    /// Rehydrate the last played track on start.
    ///
    /// Default: true.
    #[serde(default = "default_restore_last_played")]
    pub restore_last_played: bool,

    /// Capacity of the event bus.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Capacity of the intent queue feeding the player loop.
    ///
    /// Default: 32.
    #[serde(default = "default_intent_buffer_size")]
    pub intent_buffer_size: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            progress_update_interval_ms: default_progress_update_interval_ms(),
            command_timeout_ms: None,
            restore_last_played: default_restore_last_played(),
            event_buffer_size: default_event_buffer_size(),
            intent_buffer_size: default_intent_buffer_size(),
        }
    }
}

impl PlayerConfig {
    pub fn with_progress_update_interval_ms(mut self, interval_ms: u64) -> Self {
        self.progress_update_interval_ms = interval_ms;
        self
    }

    pub fn with_command_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.command_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_restore_last_played(mut self, restore: bool) -> Self {
        self.restore_last_played = restore;
        self
    }

    /// Engine command timeout as a `Duration`.
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values that would stall the player.
    pub fn validate(&self) -> Result<()> {
        if self.progress_update_interval_ms == 0 {
            return Err(Error::Config(
                "Progress update interval must be greater than 0 ms".to_string(),
            ));
        }

        if self.command_timeout_ms == Some(0) {
            return Err(Error::Config(
                "Command timeout must be greater than 0 ms. Leave it unset to wait indefinitely."
                    .to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.intent_buffer_size == 0 {
            return Err(Error::Config(
                "Intent buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_progress_update_interval_ms() -> u64 {
    bridge_traits::playback::DEFAULT_PROGRESS_UPDATE_INTERVAL_MS
}

fn default_restore_last_played() -> bool {
    true
}

fn default_event_buffer_size() -> usize {
    crate::events::DEFAULT_EVENT_BUFFER_SIZE
}

fn default_intent_buffer_size() -> usize {
    32
}

// ============================================================================
// Core Configuration
// ============================================================================

/// Bridges and settings required to start the core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Native audio engine wrapper (required)
    pub playback_engine: Arc<dyn PlaybackEngineAdapter>,

    /// Device audio enumeration (required, desktop default available)
    pub media_library: Arc<dyn MediaLibraryAdapter>,

    /// Durable key-value storage (required, desktop default available)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Time source used to stamp persisted records
    pub clock: Arc<dyn Clock>,

    pub player: PlayerConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("playback_engine", &"PlaybackEngineAdapter { ... }")
            .field("media_library", &"MediaLibraryAdapter { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("player", &self.player)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.player.validate()
    }
}

fn playback_engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlaybackEngineAdapter".to_string(),
        message: "PlaybackEngineAdapter implementation is required for audio output. \
                 Mobile: wrap the native player (AVPlayer/ExoPlayer). \
                 Desktop: inject an adapter over the audio backend of your choice."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn media_library_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaLibraryAdapter".to_string(),
        message: "MediaLibraryAdapter implementation is required for library enumeration. \
                 Desktop: enable the 'desktop-shims' feature to scan the user's music directory. \
                 Mobile: inject MediaStore/MPMediaLibrary access."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for resume state and playlists. \
                 Desktop: enable the 'desktop-shims' feature to use the default JsonSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_media_library() -> Result<Arc<dyn MediaLibraryAdapter>> {
    use bridge_desktop::DirectoryMediaLibrary;

    let library = DirectoryMediaLibrary::user_music_dir().ok_or_else(|| Error::CapabilityMissing {
        capability: "MediaLibraryAdapter".to_string(),
        message: "No music directory could be determined for this user. \
                 Inject a MediaLibraryAdapter pointing at an explicit directory."
            .to_string(),
    })?;

    let library: Arc<dyn MediaLibraryAdapter> = Arc::new(library);
    Ok(library)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_media_library() -> Result<Arc<dyn MediaLibraryAdapter>> {
    Err(media_library_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store() -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::JsonSettingsStore;

    let path = JsonSettingsStore::default_location().map_err(|e| {
        Error::Internal(format!("Failed to locate default settings file: {}", e))
    })?;

    let store: Arc<dyn SettingsStore> = Arc::new(JsonSettingsStore::new(path));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store() -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    playback_engine: Option<Arc<dyn PlaybackEngineAdapter>>,
    media_library: Option<Arc<dyn MediaLibraryAdapter>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    player: Option<PlayerConfig>,
}

impl CoreConfigBuilder {
    /// Sets the playback engine adapter.
    pub fn playback_engine(mut self, engine: Arc<dyn PlaybackEngineAdapter>) -> Self {
        self.playback_engine = Some(engine);
        self
    }

    /// Sets the media library adapter.
    pub fn media_library(mut self, library: Arc<dyn MediaLibraryAdapter>) -> Self {
        self.media_library = Some(library);
        self
    }

    /// Sets the settings store implementation.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Overrides the wall clock, mainly for tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn player(mut self, player: PlayerConfig) -> Self {
        self.player = Some(player);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` when a required bridge is absent and no
    ///   desktop default applies
    /// - `Error::Config` when the player configuration is invalid
    pub fn build(self) -> Result<CoreConfig> {
        let playback_engine = self
            .playback_engine
            .ok_or_else(playback_engine_missing_error)?;

        let media_library = match self.media_library {
            Some(library) => library,
            None => provide_default_media_library()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store()?,
        };

        let config = CoreConfig {
            playback_engine,
            media_library,
            settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            player: self.player.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
