//! Playback core.
//!
//! [`Player`] ties the pure playlist [`store`] to an [`AudioEngine`] through
//! the [`binding`]. Every state change goes through [`Player::dispatch`],
//! which reduces the action and lets the binding reconcile the engine with
//! the new snapshot. Engine callbacks are queued and applied by
//! [`Player::pump`], so they never re-enter a dispatch in progress.

pub mod binding;
pub mod format;
pub mod store;
pub mod transport;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use tracing::debug;

use crate::audio::AudioEngine;

use binding::{EngineBinding, EngineEvent, Progress};
use store::{Action, PlayerState, Store, TrackId, TrackInfo};
use transport::{Bounds, Direction, seek_fraction_from_pointer, skip_target};

pub struct Player<E: AudioEngine> {
    store: Store,
    binding: EngineBinding<E>,
    events: Receiver<EngineEvent>,
    pending: VecDeque<Action>,
    dispatching: bool,
}

impl<E: AudioEngine> Player<E> {
    pub fn new(engine: E, volume: f32) -> Self {
        let initial = PlayerState::with_volume(volume);
        let (tx, rx) = mpsc::channel();
        let binding = EngineBinding::new(engine, tx, &initial);
        Self {
            store: Store::new(initial),
            binding,
            events: rx,
            pending: VecDeque::new(),
            dispatching: false,
        }
    }

    pub fn state(&self) -> Arc<PlayerState> {
        self.store.snapshot()
    }

    pub fn progress(&self) -> &Progress {
        self.binding.progress()
    }

    pub fn duration_label(&self) -> &str {
        self.binding.duration_label()
    }

    pub fn is_ticking(&self) -> bool {
        self.binding.is_ticking()
    }

    #[cfg(test)]
    pub(crate) fn binding(&self) -> &EngineBinding<E> {
        &self.binding
    }

    /// Apply `action` and reconcile the engine.
    ///
    /// Actions are processed strictly in order; an action queued while
    /// another is being reconciled runs after it.
    pub fn dispatch(&mut self, action: Action) {
        self.pending.push_back(action);
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(action) = self.pending.pop_front() {
            debug!(?action, "dispatch");
            let (prev, next) = self.store.dispatch(action);
            self.binding.reconcile(&prev, &next);
        }
        self.dispatching = false;
    }

    /// Drive the engine and apply any callbacks it produced.
    pub fn pump(&mut self) {
        self.binding.poll();
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: EngineEvent) {
        let selected = self.state().selection.id;
        match event {
            EngineEvent::Audible(id) => {
                if selected != Some(id) {
                    debug!(track = id, "stale audible ignored");
                    return;
                }
                if self.binding.on_audible(id) {
                    self.dispatch(Action::SetPlayingForTrack { id, playing: true });
                    self.dispatch(Action::SetPlaying(true));
                }
            }
            EngineEvent::Ended(id) => {
                if selected != Some(id) {
                    debug!(track = id, "stale end ignored");
                    return;
                }
                debug!(track = id, "ended, advancing");
                self.binding.on_ended(id);
                self.dispatch(Action::SetPlayingForTrack { id, playing: false });
                self.skip(Direction::Next);
            }
        }
    }

    /// One animation frame: refresh the progress sample.
    pub fn frame(&mut self) {
        let state = self.state();
        self.binding.frame(&state);
    }

    /// Select `id` and mark it as wanting to play.
    ///
    /// The current selection is resumed where it stopped, not restarted.
    pub fn play_track(&mut self, id: TrackId) {
        let state = self.state();
        if state.track(id).is_none() {
            return;
        }
        if state.selection.id != Some(id) {
            self.dispatch(Action::SelectTrack(id));
        }
        self.dispatch(Action::SetPlayingForTrack { id, playing: true });
    }

    /// Move to the previous or next track, wrapping around.
    ///
    /// The old handle is stopped by the selection change. With a single
    /// track the target is the current selection, which is just resumed.
    pub fn skip(&mut self, direction: Direction) {
        let state = self.state();
        let Some(target) = skip_target(state.selection.index, state.playlist.len(), direction)
        else {
            return;
        };
        let id = state.playlist[target].id;
        self.play_track(id);
    }

    /// Play/pause toggle.
    ///
    /// With nothing selected this starts the first track.
    pub fn toggle_play(&mut self) {
        let state = self.state();
        if state.is_empty() {
            return;
        }
        match state.selected_track() {
            None => {
                let first = state.playlist[0].id;
                self.play_track(first);
            }
            Some(track) if track.is_playing => {
                let id = track.id;
                self.dispatch(Action::SetPlayingForTrack { id, playing: false });
                self.dispatch(Action::SetPlaying(false));
            }
            Some(track) => {
                let id = track.id;
                self.dispatch(Action::SetPlayingForTrack { id, playing: true });
            }
        }
    }

    pub fn pause(&mut self) {
        let state = self.state();
        if let Some(track) = state.selected_track().filter(|t| t.is_playing) {
            let id = track.id;
            self.dispatch(Action::SetPlayingForTrack { id, playing: false });
            self.dispatch(Action::SetPlaying(false));
        }
    }

    /// Seek the selected track to `fraction` of its length.
    pub fn seek(&mut self, fraction: f64) {
        let state = self.state();
        self.binding.seek(&state, fraction);
    }

    /// Seek to where the pointer sits on the track bar.
    pub fn seek_from_pointer(&mut self, x: f64, bar: &Bounds) {
        self.seek(seek_fraction_from_pointer(x, bar));
    }

    /// Move the playhead by `delta` seconds. No-op while the length is unknown.
    pub fn scrub(&mut self, delta: f64) {
        let state = self.state();
        let Some(duration) = self.binding.selected_duration(&state) else {
            return;
        };
        let Some(position) = self.binding.position(&state) else {
            return;
        };
        self.binding.seek(&state, (position + delta) / duration);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.dispatch(Action::SetVolume(volume));
    }

    pub fn change_volume(&mut self, delta: f32) {
        let volume = self.state().volume;
        self.set_volume(volume + delta);
    }

    /// Replace the playlist, releasing every handle of the old one first.
    pub fn load_playlist(&mut self, tracks: Vec<TrackInfo>) {
        self.binding.release_all();
        self.dispatch(Action::CreatePlaylist(tracks));
    }

    /// Pause whatever plays and unload the engine.
    pub fn shutdown(&mut self) {
        self.pause();
        self.binding.release_all();
    }
}

impl<E: AudioEngine> Drop for Player<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
