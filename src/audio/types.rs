//! Audio-related small types and the engine capability traits.
//!
//! This module defines the construction options, error type and the two
//! traits ([`AudioEngine`], [`Sound`]) the player depends on.

use thiserror::Error;

/// Callback registered on a sound at construction time.
pub type Callback = Box<dyn FnMut() + Send>;

/// Everything needed to construct a [`Sound`].
///
/// Sources are always streamed: bytes are downloaded on a background thread
/// and decoding starts before the whole file has arrived.
pub struct SoundOptions {
    /// `http(s)://` URL or local file path.
    pub src: String,
    /// Fired every time playback actually starts producing sound.
    pub on_audible: Callback,
    /// Fired once per playback that runs to the end of the source.
    pub on_ended: Callback,
}

impl std::fmt::Debug for SoundOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundOptions")
            .field("src", &self.src)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    NoOutputDevice(String),
    #[error("failed to open {src}: {reason}")]
    Open { src: String, reason: String },
    #[error("failed to decode {src}: {reason}")]
    Decode { src: String, reason: String },
    #[error("seek failed: {0}")]
    Seek(String),
    #[error("sound is not loaded yet")]
    NotLoaded,
}

/// One playable handle bound to a single source.
pub trait Sound {
    /// Start from the beginning, or resume after `pause`.
    fn play(&mut self);
    fn pause(&mut self);
    /// Stop and rewind. Safe to call while the source is still loading.
    fn stop(&mut self);
    /// Jump to an absolute position in seconds.
    fn seek_to(&mut self, secs: f64) -> Result<(), AudioError>;
    /// Current position in seconds.
    fn position(&self) -> f64;
    /// Total duration in seconds, once known.
    fn duration(&self) -> Option<f64>;
    /// Whether sound is actually being produced right now.
    fn is_playing(&self) -> bool;
    /// Advance internal state; this is where callbacks fire.
    fn poll(&mut self) {}
}

/// Factory and global mixer controls.
pub trait AudioEngine {
    type Sound: Sound;

    fn create(&mut self, options: SoundOptions) -> Result<Self::Sound, AudioError>;
    /// Set the output volume applied to every sound.
    fn set_volume(&mut self, volume: f32);
    /// Stop and release every sound created by this engine.
    fn unload_all(&mut self);
}
