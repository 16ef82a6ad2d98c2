//! `rodio` implementation of [`AudioEngine`] / [`Sound`].
//!
//! Each sound owns a [`StreamBuffer`] filled by a loader thread. Starting a
//! sound spawns a decoder thread over a fresh reader; once the decoder has
//! probed the format it is handed back and attached to a new `Sink` during
//! the next [`Sound::poll`]. Replaying after `stop` reuses the buffer.

use std::cell::RefCell;
use std::rc::{self, Rc};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{self as stdsync, Arc};
use std::thread;
use std::time::Duration;

use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, warn};

use super::stream::{StreamBuffer, StreamReader, spawn_fill};
use super::types::{AudioEngine, AudioError, Callback, Sound, SoundOptions};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared between the engine and every sound it created.
struct Registry {
    volume: f32,
    /// Bumped by `unload_all`; sounds activated in an older epoch are dead.
    epoch: u64,
    sinks: Vec<rc::Weak<Sink>>,
    buffers: Vec<stdsync::Weak<StreamBuffer>>,
}

pub struct RodioEngine {
    stream: OutputStream,
    client: reqwest::blocking::Client,
    registry: Rc<RefCell<Registry>>,
}

impl RodioEngine {
    /// Open the default output device.
    pub fn new(volume: f32) -> Result<Self, AudioError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| AudioError::NoOutputDevice(e.to_string()))?;
        // rodio logs to stderr when OutputStream is dropped, which would
        // scribble over the TUI.
        stream.log_on_drop(false);

        // No overall timeout: a streamed body may take longer than any fixed limit.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()
            .map_err(|e| AudioError::Open {
                src: "http client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            stream,
            client,
            registry: Rc::new(RefCell::new(Registry {
                volume: volume.clamp(0.0, 1.0),
                epoch: 0,
                sinks: Vec::new(),
                buffers: Vec::new(),
            })),
        })
    }
}

impl AudioEngine for RodioEngine {
    type Sound = RodioSound;

    fn create(&mut self, options: SoundOptions) -> Result<RodioSound, AudioError> {
        let SoundOptions {
            src,
            on_audible,
            on_ended,
        } = options;

        let buffer = StreamBuffer::new();
        spawn_fill(src.clone(), Arc::clone(&buffer), self.client.clone()).map_err(|e| {
            AudioError::Open {
                src: src.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(src = %src, "sound created");

        let mut registry = self.registry.borrow_mut();
        registry.buffers.retain(|b| b.strong_count() > 0);
        registry.buffers.push(Arc::downgrade(&buffer));
        let epoch = registry.epoch;
        drop(registry);

        Ok(RodioSound {
            src,
            buffer,
            mixer: self.stream.mixer().clone(),
            registry: Rc::clone(&self.registry),
            epoch,
            phase: Phase::Idle,
            total: None,
            audible_fired: false,
            on_audible,
            on_ended,
        })
    }

    fn set_volume(&mut self, volume: f32) {
        let mut registry = self.registry.borrow_mut();
        registry.volume = volume.clamp(0.0, 1.0);
        let v = registry.volume;
        registry.sinks.retain(|s| match s.upgrade() {
            Some(sink) => {
                sink.set_volume(v);
                true
            }
            None => false,
        });
    }

    fn unload_all(&mut self) {
        let mut registry = self.registry.borrow_mut();
        registry.epoch += 1;
        for sink in registry.sinks.drain(..).filter_map(|s| s.upgrade()) {
            sink.stop();
        }
        for buffer in registry.buffers.drain(..).filter_map(|b| b.upgrade()) {
            buffer.abort();
        }
        debug!(epoch = registry.epoch, "all sounds unloaded");
    }
}

struct Decoded {
    source: Decoder<StreamReader>,
    total: Option<Duration>,
}

enum Phase {
    /// Never started, or stopped.
    Idle,
    /// Decoder is being prepared on a background thread.
    Starting {
        rx: Receiver<Result<Decoded, AudioError>>,
        paused: bool,
        seek: Option<f64>,
    },
    Active(Rc<Sink>),
    Ended,
    Failed,
}

pub struct RodioSound {
    src: String,
    buffer: Arc<StreamBuffer>,
    mixer: Mixer,
    registry: Rc<RefCell<Registry>>,
    epoch: u64,
    phase: Phase,
    total: Option<Duration>,
    /// Reset whenever playback (re)starts so `on_audible` fires once per start.
    audible_fired: bool,
    on_audible: Callback,
    on_ended: Callback,
}

fn spawn_decoder(
    src: String,
    reader: StreamReader,
) -> Result<Receiver<Result<Decoded, AudioError>>, AudioError> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("riffle-decoder".into())
        .spawn(move || {
            let result = Decoder::new(reader)
                .map(|source| {
                    let total = source.total_duration();
                    Decoded { source, total }
                })
                .map_err(|e| AudioError::Decode {
                    src,
                    reason: e.to_string(),
                });
            // The sound may have been stopped in the meantime.
            let _ = tx.send(result);
        })
        .map_err(|e| AudioError::Decode {
            src: String::new(),
            reason: e.to_string(),
        })?;
    Ok(rx)
}

impl RodioSound {
    fn start(&mut self) {
        self.audible_fired = false;
        match spawn_decoder(self.src.clone(), self.buffer.reader()) {
            Ok(rx) => {
                self.phase = Phase::Starting {
                    rx,
                    paused: false,
                    seek: None,
                };
            }
            Err(e) => {
                warn!(src = %self.src, error = %e, "could not start decoder");
                self.phase = Phase::Failed;
            }
        }
    }

    fn unloaded(&self) -> bool {
        self.registry.borrow().epoch != self.epoch
    }

    fn activate(&mut self, decoded: Decoded, paused: bool, seek: Option<f64>) {
        let sink = Rc::new(Sink::connect_new(&self.mixer));
        {
            let mut registry = self.registry.borrow_mut();
            sink.set_volume(registry.volume);
            registry.sinks.push(Rc::downgrade(&sink));
        }
        if decoded.total.is_some() {
            self.total = decoded.total;
        }
        sink.append(decoded.source);
        if let Some(secs) = seek {
            if let Err(e) = sink.try_seek(Duration::from_secs_f64(secs.max(0.0))) {
                warn!(src = %self.src, error = %e, "deferred seek failed");
            }
        }
        if paused {
            sink.pause();
        } else {
            sink.play();
        }
        debug!(src = %self.src, paused, "sound active");
        self.phase = Phase::Active(sink);
    }
}

impl Sound for RodioSound {
    fn play(&mut self) {
        if matches!(self.phase, Phase::Idle | Phase::Ended | Phase::Failed) {
            self.start();
            return;
        }
        match &mut self.phase {
            Phase::Starting { paused, .. } => *paused = false,
            Phase::Active(sink) => {
                if sink.is_paused() {
                    sink.play();
                    self.audible_fired = false;
                }
            }
            _ => {}
        }
    }

    fn pause(&mut self) {
        match &mut self.phase {
            Phase::Starting { paused, .. } => *paused = true,
            Phase::Active(sink) => {
                sink.pause();
                self.audible_fired = false;
            }
            _ => {}
        }
    }

    fn stop(&mut self) {
        if let Phase::Active(sink) = &self.phase {
            sink.stop();
        }
        // Dropping a pending receiver cancels the start.
        self.phase = Phase::Idle;
        self.audible_fired = false;
    }

    fn seek_to(&mut self, secs: f64) -> Result<(), AudioError> {
        match &mut self.phase {
            Phase::Active(sink) => sink
                .try_seek(Duration::from_secs_f64(secs.max(0.0)))
                .map_err(|e| AudioError::Seek(e.to_string())),
            Phase::Starting { seek, .. } => {
                *seek = Some(secs);
                Ok(())
            }
            _ => Err(AudioError::NotLoaded),
        }
    }

    fn position(&self) -> f64 {
        match &self.phase {
            Phase::Active(sink) => sink.get_pos().as_secs_f64(),
            Phase::Ended => self.duration().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.total
            .map(|d| d.as_secs_f64())
            .or_else(|| self.buffer.duration())
    }

    fn is_playing(&self) -> bool {
        match &self.phase {
            Phase::Active(sink) => !sink.is_paused() && !sink.empty(),
            _ => false,
        }
    }

    fn poll(&mut self) {
        if self.unloaded() {
            if !matches!(self.phase, Phase::Idle) {
                self.phase = Phase::Idle;
            }
            return;
        }

        let pending = match &self.phase {
            Phase::Starting { rx, paused, seek } => Some((rx.try_recv(), *paused, *seek)),
            _ => None,
        };
        if let Some((received, paused, seek)) = pending {
            match received {
                Ok(Ok(decoded)) => self.activate(decoded, paused, seek),
                Ok(Err(e)) => {
                    let load_error = self.buffer.error();
                    warn!(src = %self.src, error = %e, ?load_error, "sound failed to start");
                    self.phase = Phase::Failed;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.phase = Phase::Failed,
            }
        }

        let Phase::Active(sink) = &self.phase else {
            return;
        };

        if sink.is_paused() {
            return;
        }
        if sink.empty() {
            self.phase = Phase::Ended;
            self.audible_fired = false;
            (self.on_ended)();
        } else if !self.audible_fired {
            self.audible_fired = true;
            (self.on_audible)();
        }
    }
}

impl Drop for RodioSound {
    fn drop(&mut self) {
        if let Phase::Active(sink) = &self.phase {
            sink.stop();
        }
        self.buffer.abort();
    }
}
