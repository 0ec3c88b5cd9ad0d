//! # Resume Persistence
//!
//! One durable "last played" slot so playback can pick up where it left off
//! after a restart.

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use chrono::{DateTime, Utc};
use core_library::models::AudioTrack;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Settings key of the last-played slot.
pub const LAST_PLAYED_KEY: &str = "last_played";

/// What was playing, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPlayed {
    pub track: AudioTrack,
    /// Index of `track` in the library.
    pub index: usize,
    pub position_ms: u64,
    pub saved_at: DateTime<Utc>,
}

/// Durable storage of the last-played record. Each save replaces the
/// previous one.
#[async_trait]
pub trait PersistenceBridge: Send + Sync {
    async fn save_last_played(&self, record: &LastPlayed) -> Result<()>;

    /// `None` when nothing was ever saved.
    async fn load_last_played(&self) -> Result<Option<LastPlayed>>;
}

/// [`PersistenceBridge`] storing the record as JSON in a [`SettingsStore`].
pub struct SettingsPersistence {
    store: Arc<dyn SettingsStore>,
}

impl SettingsPersistence {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PersistenceBridge for SettingsPersistence {
    async fn save_last_played(&self, record: &LastPlayed) -> Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| PlaybackError::Persistence(format!("Failed to encode record: {}", e)))?;

        self.store
            .set_string(LAST_PLAYED_KEY, &json)
            .await
            .map_err(|e| PlaybackError::Persistence(e.to_string()))?;

        debug!(
            track_id = %record.track.id,
            index = record.index,
            position_ms = record.position_ms,
            "Saved last played"
        );
        Ok(())
    }

    async fn load_last_played(&self) -> Result<Option<LastPlayed>> {
        let Some(json) = self
            .store
            .get_string(LAST_PLAYED_KEY)
            .await
            .map_err(|e| PlaybackError::Persistence(e.to_string()))?
        else {
            return Ok(None);
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| PlaybackError::Persistence(format!("Corrupt last played record: {}", e)))
    }
}
