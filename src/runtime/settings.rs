use crate::config;
use crate::error::Error;

/// Load and validate settings, falling back to defaults.
///
/// Config is optional, so a failure never prevents startup; it is handed back
/// so it can be logged once logging is up.
pub fn load_settings() -> (config::Settings, Option<Error>) {
    match config::Settings::load() {
        Ok(s) => match s.validate() {
            Ok(()) => (s, None),
            Err(msg) => {
                eprintln!("riffle: invalid config, using defaults: {msg}");
                (config::Settings::default(), Some(Error::InvalidConfig(msg)))
            }
        },
        Err(e) => {
            eprintln!("riffle: failed to load config, using defaults: {e}");
            (config::Settings::default(), Some(Error::Config(e)))
        }
    }
}
