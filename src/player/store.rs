//! Playlist store: the single source of truth for playback state.
//!
//! State lives in immutable [`PlayerState`] snapshots. Every [`Action`] is
//! reduced into a brand new snapshot by [`reduce`]; the previous snapshot is
//! never touched, so observers can diff old against new to decide which
//! engine calls to issue. Untouched substructures (the playlist in particular)
//! are shared between snapshots through `Arc`.

use std::sync::Arc;

/// Catalog identifier of a track.
pub type TrackId = i64;

/// Input record for [`Action::CreatePlaylist`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub id: TrackId,
    pub title: String,
    /// Source URI handed to the audio engine.
    pub src: String,
}

/// One playlist entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub src: String,
    /// Per-track play intent. At most one track has this set.
    pub is_playing: bool,
}

/// The currently selected track.
///
/// Before any selection has been made this is the sentinel
/// `{ index: 0, id: None, title: "" }`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub index: usize,
    pub id: Option<TrackId>,
    pub title: String,
}

impl Selection {
    pub fn is_unselected(&self) -> bool {
        self.id.is_none()
    }
}

/// Immutable snapshot of the whole player state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub playlist: Arc<Vec<Track>>,
    /// Bumped every time a new playlist replaces the old one.
    pub playlist_generation: u64,
    pub selection: Selection,
    /// Bumped by every successful `SelectTrack`, including re-selecting the
    /// same track (which restarts it).
    pub selection_serial: u64,
    pub is_playing: bool,
    /// Global output volume, always within `[0, 1]`.
    pub volume: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            playlist: Arc::new(Vec::new()),
            playlist_generation: 0,
            selection: Selection::default(),
            selection_serial: 0,
            is_playing: false,
            volume: 1.0,
        }
    }
}

impl PlayerState {
    /// Fresh state with the given starting volume (clamped).
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume: clamp_volume(volume).unwrap_or(1.0),
            ..Self::default()
        }
    }

    pub fn position_of(&self, id: TrackId) -> Option<usize> {
        self.playlist.iter().position(|t| t.id == id)
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.playlist.iter().find(|t| t.id == id)
    }

    /// The track referenced by the current selection, if any.
    pub fn selected_track(&self) -> Option<&Track> {
        self.selection.id.and_then(|id| self.track(id))
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }
}

/// Transitions understood by [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the playlist wholesale and reset selection and play state.
    CreatePlaylist(Vec<TrackInfo>),
    /// Point the selection at a track. Unknown ids are ignored.
    SelectTrack(TrackId),
    /// Set the global play flag.
    SetPlaying(bool),
    /// Set one track's play flag, clearing every other track's flag.
    SetPlayingForTrack { id: TrackId, playing: bool },
    /// Set the global volume, clamped to `[0, 1]`.
    SetVolume(f32),
}

fn clamp_volume(value: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value.clamp(0.0, 1.0))
    }
}

/// Rebuild the playlist so that only `playing_id` (if any) carries the flag.
fn with_play_flag(playlist: &[Track], playing_id: Option<TrackId>) -> Vec<Track> {
    playlist
        .iter()
        .map(|t| Track {
            is_playing: Some(t.id) == playing_id,
            ..t.clone()
        })
        .collect()
}

/// Pure transition function: `state` + `action` -> new state.
pub fn reduce(state: &PlayerState, action: Action) -> PlayerState {
    match action {
        Action::CreatePlaylist(tracks) => {
            let playlist: Vec<Track> = tracks
                .into_iter()
                .map(|t| Track {
                    id: t.id,
                    title: t.title,
                    src: t.src,
                    is_playing: false,
                })
                .collect();

            PlayerState {
                playlist: Arc::new(playlist),
                playlist_generation: state.playlist_generation + 1,
                selection: Selection::default(),
                selection_serial: state.selection_serial,
                is_playing: false,
                volume: state.volume,
            }
        }
        Action::SelectTrack(id) => {
            let Some(index) = state.position_of(id) else {
                return state.clone();
            };
            let title = state.playlist[index].title.clone();

            // The handle for the new selection starts from scratch, so nothing
            // is audibly playing until the engine says so.
            let playlist = if state.playlist.iter().any(|t| t.is_playing) {
                Arc::new(with_play_flag(&state.playlist, None))
            } else {
                Arc::clone(&state.playlist)
            };

            PlayerState {
                playlist,
                selection: Selection {
                    index,
                    id: Some(id),
                    title,
                },
                selection_serial: state.selection_serial + 1,
                is_playing: false,
                ..state.clone()
            }
        }
        Action::SetPlaying(playing) => {
            if playing && state.selection.is_unselected() {
                return state.clone();
            }
            PlayerState {
                is_playing: playing,
                ..state.clone()
            }
        }
        Action::SetPlayingForTrack { id, playing } => {
            if state.position_of(id).is_none() {
                return state.clone();
            }

            let playlist = if playing {
                with_play_flag(&state.playlist, Some(id))
            } else {
                state
                    .playlist
                    .iter()
                    .map(|t| Track {
                        is_playing: t.is_playing && t.id != id,
                        ..t.clone()
                    })
                    .collect()
            };

            // Pausing the selected track also drops the global flag so the
            // "playing implies selected track playing" invariant holds.
            let is_playing = if !playing && state.selection.id == Some(id) {
                false
            } else {
                state.is_playing
            };

            PlayerState {
                playlist: Arc::new(playlist),
                is_playing,
                ..state.clone()
            }
        }
        Action::SetVolume(value) => match clamp_volume(value) {
            Some(volume) => PlayerState {
                volume,
                ..state.clone()
            },
            None => state.clone(),
        },
    }
}

/// Holder of the current snapshot.
#[derive(Debug, Default)]
pub struct Store {
    current: Arc<PlayerState>,
}

impl Store {
    pub fn new(initial: PlayerState) -> Self {
        Self {
            current: Arc::new(initial),
        }
    }

    /// Current snapshot. Cheap to clone and safe to keep around.
    pub fn snapshot(&self) -> Arc<PlayerState> {
        Arc::clone(&self.current)
    }

    /// Reduce `action` and return `(previous, next)` snapshots.
    pub fn dispatch(&mut self, action: Action) -> (Arc<PlayerState>, Arc<PlayerState>) {
        let next = Arc::new(reduce(&self.current, action));
        let prev = std::mem::replace(&mut self.current, Arc::clone(&next));
        (prev, next)
    }
}
