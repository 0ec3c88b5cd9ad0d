//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-playback`). Host applications can depend on
//! `tapedeck-workspace` and enable the documented features without wiring each
//! crate individually.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_playback as playback;
#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service::{CoreError, CoreService, Intent, LibraryStatus, PlayerHandle};
