//! # Queue Resolution
//!
//! Which track comes next, for both the flat library and a playlist.
//!
//! Traversal always goes through [`next_index`], so both modes share the same
//! wraparound rules:
//!
//! | current            | `Next`      | `Previous`  |
//! |--------------------|-------------|-------------|
//! | index `p`          | `p + 1`     | `p - 1`     |
//! | last               | `0`         | `len - 2`   |
//! | first              | `1`         | `len - 1`   |
//! | absent / unknown   | `0`         | `len - 1`   |

use core_library::models::{AudioTrack, Playlist, TrackId};
use serde::{Deserialize, Serialize};

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Next,
    Previous,
}

/// The list governing next/previous resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueueMode {
    /// Whole device library, in enumeration order.
    #[default]
    Library,
    /// A user playlist, in play order.
    Playlist(Playlist),
}

impl QueueMode {
    /// The tracks this mode traverses.
    pub fn active_list<'a>(&'a self, library: &'a [AudioTrack]) -> &'a [AudioTrack] {
        match self {
            QueueMode::Library => library,
            QueueMode::Playlist(playlist) => &playlist.audios,
        }
    }

    pub fn is_playlist(&self) -> bool {
        matches!(self, QueueMode::Playlist(_))
    }

    pub fn playlist(&self) -> Option<&Playlist> {
        match self {
            QueueMode::Library => None,
            QueueMode::Playlist(playlist) => Some(playlist),
        }
    }
}

/// Queue information supplied with a track selection, e.g. when the user taps
/// a track inside a playlist view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueContext {
    pub active_queue: Option<Playlist>,
    pub queue_mode_active: bool,
}

impl QueueContext {
    /// Traverse the flat library.
    pub fn library() -> Self {
        Self::default()
    }

    /// Traverse `playlist`.
    pub fn playlist(playlist: Playlist) -> Self {
        Self {
            active_queue: Some(playlist),
            queue_mode_active: true,
        }
    }

    /// Queue mode is only on when a playlist is actually supplied.
    pub fn into_mode(self) -> QueueMode {
        match (self.queue_mode_active, self.active_queue) {
            (true, Some(playlist)) => QueueMode::Playlist(playlist),
            _ => QueueMode::Library,
        }
    }
}

/// Position of `id` in `list`, by identity.
pub fn position_of(list: &[AudioTrack], id: &TrackId) -> Option<usize> {
    list.iter().position(|track| &track.id == id)
}

/// Index of the track after (or before) `current` in `list`, wrapping at both
/// ends.
///
/// A `current` that is `None` or not found in `list` resolves to the first
/// track going forward and the last track going backward. Returns `None` only
/// for an empty list.
pub fn next_index(list: &[AudioTrack], current: Option<&TrackId>, direction: Direction) -> Option<usize> {
    let len = list.len();
    if len == 0 {
        return None;
    }

    let position = current.and_then(|id| position_of(list, id));
    let index = match (position, direction) {
        (None, Direction::Next) => 0,
        (None, Direction::Previous) => len - 1,
        (Some(p), Direction::Next) => (p + 1) % len,
        (Some(0), Direction::Previous) => len - 1,
        (Some(p), Direction::Previous) => p - 1,
    };

    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(ids: &[&str]) -> Vec<AudioTrack> {
        ids.iter()
            .map(|id| AudioTrack::new(*id, format!("file:///{}.mp3", id), format!("{}.mp3", id), 1000))
            .collect()
    }

    fn id(value: &str) -> TrackId {
        TrackId::from(value)
    }

    #[test]
    fn test_forward_wraps_from_last_to_first() {
        let list = tracks(&["a", "b", "c"]);
        assert_eq!(next_index(&list, Some(&id("c")), Direction::Next), Some(0));
    }

    #[test]
    fn test_backward_wraps_from_first_to_last() {
        let list = tracks(&["a", "b", "c"]);
        assert_eq!(next_index(&list, Some(&id("a")), Direction::Previous), Some(2));
    }

    #[test]
    fn test_result_always_in_range() {
        for len in 1..6 {
            let ids: Vec<String> = (0..len).map(|i| i.to_string()).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let list = tracks(&refs);

            for current in ids.iter().map(|s| Some(id(s))).chain([None, Some(id("missing"))]) {
                for direction in [Direction::Next, Direction::Previous] {
                    let index = next_index(&list, current.as_ref(), direction).unwrap();
                    assert!(index < len);
                }
            }
        }
    }

    #[test]
    fn test_forward_then_backward_returns_to_start() {
        let list = tracks(&["a", "b", "c", "d"]);
        for start in 0..list.len() {
            let forward = next_index(&list, Some(&list[start].id), Direction::Next).unwrap();
            let back = next_index(&list, Some(&list[forward].id), Direction::Previous).unwrap();
            assert_eq!(back, start);
        }
    }

    #[test]
    fn test_absent_current_resolves_to_edges() {
        let list = tracks(&["a", "b", "c"]);
        assert_eq!(next_index(&list, Some(&id("zzz")), Direction::Next), Some(0));
        assert_eq!(next_index(&list, Some(&id("zzz")), Direction::Previous), Some(2));
        assert_eq!(next_index(&list, None, Direction::Next), Some(0));
        assert_eq!(next_index(&list, None, Direction::Previous), Some(2));
    }

    #[test]
    fn test_single_track_list_wraps_to_itself() {
        let list = tracks(&["only"]);
        assert_eq!(next_index(&list, Some(&id("only")), Direction::Next), Some(0));
        assert_eq!(next_index(&list, Some(&id("only")), Direction::Previous), Some(0));
    }

    #[test]
    fn test_empty_list_has_no_next() {
        assert_eq!(next_index(&[], Some(&id("a")), Direction::Next), None);
        assert_eq!(next_index(&[], None, Direction::Previous), None);
    }

    #[test]
    fn test_modes_share_traversal() {
        let library = tracks(&["a", "b", "c"]);
        let playlist = Playlist::new("Mix").with_audios(tracks(&["x", "y"]));

        let library_mode = QueueMode::Library;
        let playlist_mode = QueueMode::Playlist(playlist);

        let in_library = library_mode.active_list(&library);
        assert_eq!(next_index(in_library, Some(&id("c")), Direction::Next), Some(0));

        let in_playlist = playlist_mode.active_list(&library);
        assert_eq!(in_playlist.len(), 2);
        assert_eq!(next_index(in_playlist, Some(&id("y")), Direction::Next), Some(0));
        assert_eq!(in_playlist[0].id, id("x"));
    }

    #[test]
    fn test_queue_context_into_mode() {
        let playlist = Playlist::new("Mix");
        assert_eq!(
            QueueContext::playlist(playlist.clone()).into_mode(),
            QueueMode::Playlist(playlist.clone())
        );
        assert_eq!(QueueContext::library().into_mode(), QueueMode::Library);

        let inactive = QueueContext {
            active_queue: Some(playlist),
            queue_mode_active: false,
        };
        assert_eq!(inactive.into_mode(), QueueMode::Library);
    }
}
