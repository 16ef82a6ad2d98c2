use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/riffle/config.toml` or `~/.config/riffle/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `RIFFLE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub catalog: CatalogSettings,
    pub ui: UiSettings,
    pub controls: ControlsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output volume at startup, from 0 to 1.
    pub volume: f32,
    /// Volume change applied by `+` / `-`.
    pub volume_step: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            volume_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Free-text search endpoint; receives `term`, `media`, `entity` and `limit`.
    pub search_url: String,
    /// Album lookup endpoint; receives `id` and `entity`.
    pub lookup_url: String,
    pub media: String,
    pub entity: String,
    /// Maximum number of results requested per search.
    pub limit: u32,
    /// Optional two-letter store country.
    pub country: Option<String>,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            search_url: "https://itunes.apple.com/search".to_string(),
            lookup_url: "https://itunes.apple.com/lookup".to_string(),
            media: "music".to_string(),
            entity: "song".to_string(),
            limit: 50,
            country: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// The text rendered inside the top header box.
    pub header_text: String,
    /// Redraw / progress sampling interval while a track is playing (milliseconds).
    pub frame_interval_ms: u64,
    /// Input poll interval while nothing is playing (milliseconds).
    pub idle_poll_ms: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            header_text: " ~ riffle: search, preview, repeat ~ ".to_string(),
            frame_interval_ms: 16,
            idle_poll_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Number of seconds to scrub when pressing `H` / `L`.
    pub scrub_seconds: u64,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self { scrub_seconds: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for the rolling log file. Defaults to the XDG state dir.
    pub dir: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            filter: "riffle=info,warn".to_string(),
        }
    }
}
