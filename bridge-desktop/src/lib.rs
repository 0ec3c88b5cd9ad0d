//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` backed by a JSON file in the user data directory
//! - `MediaLibraryAdapter` scanning a music directory, durations via `lofty`
//!
//! There is no desktop `PlaybackEngineAdapter`; hosts inject one.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DirectoryMediaLibrary, JsonSettingsStore};
//!
//! let settings = JsonSettingsStore::new(JsonSettingsStore::default_location()?);
//! let library = DirectoryMediaLibrary::new("/home/me/Music");
//! ```

mod media;
mod settings;

pub use media::DirectoryMediaLibrary;
pub use settings::JsonSettingsStore;
