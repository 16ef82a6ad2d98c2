//! Elapsed/total time labels shown by the player bar.

/// Label rendered for a missing, zero or non-finite time.
pub const ZERO_DURATION: &str = "0:00:00";

/// Format a millisecond count as `H:MM:SS`, rounding to the nearest second.
///
/// `None`, zero, negative and non-finite inputs all render as [`ZERO_DURATION`].
pub fn format_millis(ms: Option<f64>) -> String {
    let Some(ms) = ms.filter(|v| v.is_finite() && *v > 0.0) else {
        return ZERO_DURATION.to_string();
    };

    let total = (ms / 1000.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Same as [`format_millis`] for a position expressed in seconds.
pub fn format_secs(secs: Option<f64>) -> String {
    format_millis(secs.map(|s| s * 1000.0))
}
