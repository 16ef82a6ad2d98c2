//! Crate-level error type for startup and the terminal loop.

use thiserror::Error;

use crate::audio::AudioError;
use crate::catalog::FetchError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("catalog client error: {0}")]
    Catalog(#[from] FetchError),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
