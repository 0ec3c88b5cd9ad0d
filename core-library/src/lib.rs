//! # Library Module
//!
//! The device's audio collection and the user's playlists.
//!
//! ## Overview
//!
//! This module manages:
//! - `AudioTrack` / `Playlist` domain models
//! - Loading the device library behind the media permission flow
//! - Creating and appending to playlists, persisted in the settings store

pub mod error;
pub mod library;
pub mod models;
pub mod playlists;

pub use error::{LibraryError, Result};
pub use library::MediaLibrary;
pub use models::{AudioTrack, Playlist, TrackId};
pub use playlists::PlaylistBook;
