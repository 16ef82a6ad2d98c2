//! Audio engine surface and its `rodio` implementation.
//!
//! The player only talks to the [`AudioEngine`] and [`Sound`] traits. The
//! `rodio` backed engine streams sources over HTTP (or reads local files)
//! on background threads and is driven by [`Sound::poll`] from the UI loop.

mod engine;
mod stream;
mod types;

pub use engine::RodioEngine;
pub use types::*;
