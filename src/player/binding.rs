//! Playback engine binding.
//!
//! Owns one lazily created sound per track (a side table keyed by track id,
//! never stored in the playlist itself) and turns store snapshot diffs into
//! engine calls. Engine callbacks are forwarded as [`EngineEvent`]s over a
//! channel so they re-enter the store through the normal dispatch path.

use std::collections::HashMap;
use std::sync::mpsc::Sender;

use tracing::{debug, warn};

use crate::audio::{AudioEngine, Sound, SoundOptions};

use super::format::{ZERO_DURATION, format_secs};
use super::store::{PlayerState, Track, TrackId};

/// Lifecycle notification from a sound.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Playback of the track actually started producing sound.
    Audible(TrackId),
    /// Playback of the track ran to the end.
    Ended(TrackId),
}

/// What the progress bar shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub elapsed: String,
    /// Elapsed / duration, in `[0, 1]`, rounded to 4 decimals.
    pub fraction: f64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            elapsed: ZERO_DURATION.to_string(),
            fraction: 0.0,
        }
    }
}

impl Progress {
    pub fn sample(position: f64, duration: Option<f64>) -> Self {
        let fraction = match duration {
            Some(d) if d > 0.0 && position.is_finite() => {
                ((position / d).clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
            }
            _ => 0.0,
        };
        Self {
            elapsed: format_secs(Some(position)),
            fraction,
        }
    }
}

struct Slot<S> {
    sound: S,
    /// Last play/pause command issued, used to skip redundant calls.
    wants_play: bool,
}

pub struct EngineBinding<E: AudioEngine> {
    engine: E,
    sounds: HashMap<TrackId, Slot<E::Sound>>,
    events: Sender<EngineEvent>,
    durations: HashMap<TrackId, f64>,
    progress: Progress,
    duration_label: String,
    ticking: bool,
}

fn usable(d: f64) -> bool {
    d.is_finite() && d > 0.0
}

impl<E: AudioEngine> EngineBinding<E> {
    pub fn new(mut engine: E, events: Sender<EngineEvent>, initial: &PlayerState) -> Self {
        engine.set_volume(initial.volume);
        Self {
            engine,
            sounds: HashMap::new(),
            events,
            durations: HashMap::new(),
            progress: Progress::default(),
            duration_label: ZERO_DURATION.to_string(),
            ticking: false,
        }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn duration_label(&self) -> &str {
        &self.duration_label
    }

    /// Whether the per-frame progress sampling is active.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    #[cfg(test)]
    pub fn has_sound(&self, id: TrackId) -> bool {
        self.sounds.contains_key(&id)
    }

    /// Issue the engine calls implied by going from `prev` to `next`.
    pub fn reconcile(&mut self, prev: &PlayerState, next: &PlayerState) {
        if prev.playlist_generation != next.playlist_generation {
            self.release_all();
        } else if prev.selection_serial != next.selection_serial {
            if let Some(old) = prev.selection.id {
                self.stop_track(old);
            }
            self.reset_progress();
            if let Some(track) = next.selected_track() {
                self.start_track(track);
            }
        } else if let Some(track) = next.selected_track() {
            let flag_changed = prev.track(track.id).map(|t| t.is_playing) != Some(track.is_playing);
            if prev.is_playing != next.is_playing || flag_changed {
                if track.is_playing {
                    self.resume_track(track);
                } else {
                    self.pause_track(track.id);
                }
            }
        }

        if prev.volume != next.volume {
            debug!(volume = next.volume, "engine volume");
            self.engine.set_volume(next.volume);
        }
    }

    fn create_sound(&mut self, track: &Track) -> Option<&mut Slot<E::Sound>> {
        if !self.sounds.contains_key(&track.id) {
            let id = track.id;
            let audible_tx = self.events.clone();
            let ended_tx = self.events.clone();
            let options = SoundOptions {
                src: track.src.clone(),
                on_audible: Box::new(move || {
                    let _ = audible_tx.send(EngineEvent::Audible(id));
                }),
                on_ended: Box::new(move || {
                    let _ = ended_tx.send(EngineEvent::Ended(id));
                }),
            };

            match self.engine.create(options) {
                Ok(sound) => {
                    debug!(track = id, "sound handle created");
                    self.sounds.insert(
                        id,
                        Slot {
                            sound,
                            wants_play: false,
                        },
                    );
                }
                Err(e) => {
                    warn!(track = id, error = %e, "could not create sound");
                    return None;
                }
            }
        }
        self.sounds.get_mut(&track.id)
    }

    fn start_track(&mut self, track: &Track) {
        if let Some(slot) = self.create_sound(track) {
            debug!(track = track.id, "play");
            slot.sound.play();
            slot.wants_play = true;
        }
    }

    fn resume_track(&mut self, track: &Track) {
        if let Some(slot) = self.create_sound(track) {
            if !slot.wants_play {
                debug!(track = track.id, "resume");
                slot.sound.play();
                slot.wants_play = true;
            }
        }
    }

    fn pause_track(&mut self, id: TrackId) {
        if let Some(slot) = self.sounds.get_mut(&id) {
            if slot.wants_play {
                debug!(track = id, "pause");
                slot.sound.pause();
                slot.wants_play = false;
            }
        }
    }

    fn stop_track(&mut self, id: TrackId) {
        if let Some(slot) = self.sounds.get_mut(&id) {
            debug!(track = id, "stop");
            slot.sound.stop();
            slot.wants_play = false;
        }
    }

    /// The handle ran to its end and no longer plays; the next play call
    /// starts it over.
    pub fn on_ended(&mut self, id: TrackId) {
        if let Some(slot) = self.sounds.get_mut(&id) {
            slot.wants_play = false;
        }
        self.ticking = false;
    }

    /// Let every sound advance; callbacks fire from here.
    pub fn poll(&mut self) {
        for slot in self.sounds.values_mut() {
            slot.sound.poll();
        }
    }

    /// Handle an audible callback for the selected track.
    ///
    /// Returns `false` when the handle is no longer playing (paused or
    /// stopped after the callback fired), in which case the event is stale.
    pub fn on_audible(&mut self, id: TrackId) -> bool {
        let Some(slot) = self.sounds.get(&id) else {
            return false;
        };
        if !slot.sound.is_playing() {
            return false;
        }
        let position = slot.sound.position();
        let duration = self.duration_of(id);
        self.duration_label = format_secs(duration);
        self.progress = Progress::sample(position, duration);
        self.ticking = true;
        true
    }

    fn duration_of(&mut self, id: TrackId) -> Option<f64> {
        if let Some(d) = self.durations.get(&id) {
            return Some(*d);
        }
        let d = self
            .sounds
            .get(&id)
            .and_then(|slot| slot.sound.duration())
            .filter(|d| usable(*d))?;
        self.durations.insert(id, d);
        self.duration_label = format_secs(Some(d));
        Some(d)
    }

    /// One animation-frame tick. Stops itself once the handle stops playing.
    pub fn frame(&mut self, state: &PlayerState) {
        if !self.ticking {
            return;
        }
        let Some(id) = state.selection.id else {
            self.ticking = false;
            return;
        };
        let position = match self.sounds.get(&id) {
            Some(slot) if slot.sound.is_playing() => slot.sound.position(),
            _ => {
                self.ticking = false;
                return;
            }
        };
        let duration = self.duration_of(id);
        self.progress = Progress::sample(position, duration);
    }

    /// Current position of the selected track, in seconds.
    pub fn position(&self, state: &PlayerState) -> Option<f64> {
        let id = state.selection.id?;
        self.sounds.get(&id).map(|slot| slot.sound.position())
    }

    /// Duration of the selected track, if known.
    pub fn selected_duration(&mut self, state: &PlayerState) -> Option<f64> {
        let id = state.selection.id?;
        self.duration_of(id)
    }

    /// Seek the selected track to `fraction` of its duration.
    ///
    /// Deferred (no engine call) while the duration is still unknown.
    pub fn seek(&mut self, state: &PlayerState, fraction: f64) {
        let Some(id) = state.selection.id else {
            return;
        };
        if !fraction.is_finite() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        let Some(duration) = self.duration_of(id) else {
            debug!(track = id, "seek deferred, duration unknown");
            return;
        };
        let Some(slot) = self.sounds.get_mut(&id) else {
            return;
        };

        let target = fraction * duration;
        if let Err(e) = slot.sound.seek_to(target) {
            warn!(track = id, error = %e, "seek failed");
            return;
        }
        debug!(track = id, target, "seek");
        self.progress = Progress::sample(target, Some(duration));
    }

    fn reset_progress(&mut self) {
        self.ticking = false;
        self.progress = Progress::default();
        self.duration_label = ZERO_DURATION.to_string();
    }

    /// Stop and drop every handle and unload the engine.
    pub fn release_all(&mut self) {
        for (id, mut slot) in self.sounds.drain() {
            debug!(track = id, "release");
            slot.sound.stop();
        }
        self.engine.unload_all();
        self.durations.clear();
        self.reset_progress();
    }
}

impl<E: AudioEngine> Drop for EngineBinding<E> {
    fn drop(&mut self) {
        self.release_all();
    }
}
