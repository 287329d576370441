//! Display helpers for the playback controls.

/// Format seconds as zero-padded `mm:ss`. Negative or non-finite input shows `00:00`.
///
/// Minutes are not wrapped, so an hour reads `60:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// `"mm:ss / mm:ss"` for the elapsed and total playback time.
pub fn elapsed_text(elapsed: f64, duration: f64) -> String {
    format!("{} / {}", format_time(elapsed), format_time(duration))
}

/// How many seconds of real journey pass per second of playback.
/// 0 when the playback duration is not positive.
pub fn compression_ratio(journey_duration: f64, playback_duration: f64) -> f64 {
    if playback_duration > 0.0 {
        journey_duration / playback_duration
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(5.9), "00:05");
        assert_eq!(format_time(75.0), "01:15");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(-3.0), "00:00");
        assert_eq!(format_time(f64::NAN), "00:00");
    }

    #[test]
    fn test_elapsed_text() {
        assert_eq!(elapsed_text(15.0, 30.0), "00:15 / 00:30");
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(compression_ratio(3600.0, 30.0), 120.0);
        assert_eq!(compression_ratio(3600.0, 0.0), 0.0);
    }
}
