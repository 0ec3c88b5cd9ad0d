//! # Playback Transport Module
//!
//! The playback state machine of the player core.
//!
//! ## Overview
//!
//! This module handles:
//! - Next/previous resolution over the library or a playlist (`queue`)
//! - The observable playback snapshot (`state`)
//! - Driving the host audio engine from user intents and status reports
//!   (`controller`)
//! - The durable last-played slot used to resume after restart
//!   (`persistence`)

pub mod controller;
pub mod error;
pub mod persistence;
pub mod queue;
pub mod state;

pub use controller::{TransportConfig, TransportController, Transition};
pub use error::{PlaybackError, Result};
pub use persistence::{LastPlayed, PersistenceBridge, SettingsPersistence, LAST_PLAYED_KEY};
pub use queue::{next_index, position_of, Direction, QueueContext, QueueMode};
pub use state::{PlaybackSnapshot, PlaybackStateStore, PlayerStatus};
