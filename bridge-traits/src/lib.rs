//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and
//! platform-specific implementations. Each trait represents a capability the
//! core consumes but never implements itself.
//!
//! ## Traits
//!
//! ### Audio
//! - [`PlaybackEngineAdapter`](playback::PlaybackEngineAdapter) - load/play/pause/seek/unload plus status updates
//! - [`MediaLibraryAdapter`](media::MediaLibraryAdapter) - permission prompt and audio asset enumeration
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | Settings + media library |
//! | iOS      | host app            | Injected |
//! | Android  | host app            | Injected |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod media;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use media::{AudioAsset, MediaLibraryAdapter, PermissionStatus};
pub use playback::{
    status_channel, EngineStatus, LoadOptions, PlaybackEngineAdapter, SessionId, StatusReceiver,
    StatusSender,
};
pub use storage::SettingsStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
