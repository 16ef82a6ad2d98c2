//! Progressive source buffer.
//!
//! A loader fills a [`StreamBuffer`] chunk by chunk while any number of
//! [`StreamReader`]s consume it. Readers block until the bytes they ask for
//! have arrived, so a decoder can start long before the download finishes.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use lofty::prelude::AudioFile;
use lofty::probe::Probe;
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Loading,
    Complete,
    Failed(String),
    Aborted,
}

#[derive(Debug)]
struct Inner {
    bytes: Vec<u8>,
    state: LoadState,
    /// Duration probed from the complete source, in seconds.
    duration: Option<f64>,
}

#[derive(Debug)]
pub(super) struct StreamBuffer {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl StreamBuffer {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                bytes: Vec::new(),
                state: LoadState::Loading,
                duration: None,
            }),
            changed: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a chunk. Returns `false` once the buffer was aborted.
    fn append(&self, chunk: &[u8]) -> bool {
        let mut inner = self.lock();
        if inner.state == LoadState::Aborted {
            return false;
        }
        inner.bytes.extend_from_slice(chunk);
        self.changed.notify_all();
        true
    }

    fn finish(&self, result: Result<(), String>) {
        let mut inner = self.lock();
        if inner.state != LoadState::Loading {
            return;
        }
        inner.state = match result {
            Ok(()) => LoadState::Complete,
            Err(e) => LoadState::Failed(e),
        };
        self.changed.notify_all();
    }

    fn set_duration(&self, secs: f64) {
        self.lock().duration = Some(secs);
    }

    /// Stop loading and wake every blocked reader with an error.
    pub(super) fn abort(&self) {
        let mut inner = self.lock();
        if inner.state == LoadState::Loading {
            inner.state = LoadState::Aborted;
        }
        self.changed.notify_all();
    }

    pub(super) fn duration(&self) -> Option<f64> {
        self.lock().duration
    }

    pub(super) fn error(&self) -> Option<String> {
        match &self.lock().state {
            LoadState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    pub(super) fn reader(self: &Arc<Self>) -> StreamReader {
        StreamReader {
            buffer: Arc::clone(self),
            pos: 0,
        }
    }

    /// Block until loading is over, then return the total length.
    fn wait_len(&self) -> io::Result<u64> {
        let mut inner = self.lock();
        loop {
            match &inner.state {
                LoadState::Loading => {
                    inner = self
                        .changed
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                LoadState::Complete => return Ok(inner.bytes.len() as u64),
                LoadState::Failed(e) => return Err(io::Error::other(e.clone())),
                LoadState::Aborted => return Err(aborted()),
            }
        }
    }
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "stream aborted")
}

/// Blocking `Read + Seek` view over a [`StreamBuffer`].
#[derive(Debug)]
pub(super) struct StreamReader {
    buffer: Arc<StreamBuffer>,
    pos: u64,
}

impl Read for StreamReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut inner = self.buffer.lock();
        loop {
            let len = inner.bytes.len() as u64;
            if self.pos < len {
                let start = self.pos as usize;
                let n = out.len().min(inner.bytes.len() - start);
                out[..n].copy_from_slice(&inner.bytes[start..start + n]);
                self.pos += n as u64;
                return Ok(n);
            }
            match &inner.state {
                LoadState::Loading => {
                    inner = self
                        .buffer
                        .changed
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                LoadState::Complete => return Ok(0),
                LoadState::Failed(e) => return Err(io::Error::other(e.clone())),
                LoadState::Aborted => return Err(aborted()),
            }
        }
    }
}

impl Seek for StreamReader {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        let target = match to {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
            SeekFrom::End(d) => self.buffer.wait_len()?.checked_add_signed(d),
        };
        match target {
            Some(pos) => {
                self.pos = pos;
                Ok(pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            )),
        }
    }
}

fn is_remote(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

fn open_source(
    src: &str,
    client: &reqwest::blocking::Client,
) -> Result<Box<dyn Read + Send>, String> {
    if is_remote(src) {
        let response = client
            .get(src)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        Ok(Box::new(response))
    } else {
        let file = File::open(src).map_err(|e| e.to_string())?;
        Ok(Box::new(file))
    }
}

fn probe_duration(bytes: &[u8]) -> Option<f64> {
    let tagged = Probe::new(Cursor::new(bytes))
        .guess_file_type()
        .ok()?
        .read()
        .ok()?;
    let d = tagged.properties().duration();
    (!d.is_zero()).then(|| d.as_secs_f64())
}

/// Copy `src` into `buffer` until EOF, failure or abort.
pub(super) fn fill(src: &str, buffer: &StreamBuffer, client: &reqwest::blocking::Client) {
    let result = (|| {
        let mut reader = open_source(src, client)?;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.to_string()),
            };
            if !buffer.append(&chunk[..n]) {
                return Ok(());
            }
        }
    })();

    match &result {
        Ok(()) => debug!(src, "source fully loaded"),
        Err(e) => warn!(src, error = %e, "source load failed"),
    }
    buffer.finish(result);

    let bytes = {
        let inner = buffer.lock();
        (inner.state == LoadState::Complete).then(|| inner.bytes.clone())
    };
    if let Some(secs) = bytes.as_deref().and_then(probe_duration) {
        buffer.set_duration(secs);
    }
}

/// Run [`fill`] on a background thread.
pub(super) fn spawn_fill(
    src: String,
    buffer: Arc<StreamBuffer>,
    client: reqwest::blocking::Client,
) -> io::Result<()> {
    thread::Builder::new()
        .name("riffle-loader".into())
        .spawn(move || fill(&src, &buffer, &client))
        .map(|_| ())
}
