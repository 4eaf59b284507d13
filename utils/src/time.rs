//! Time formatting helpers.

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Format a millisecond delay, falling back to [`format_duration`] above one second.
pub fn format_millis(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else {
        format_duration(ms / 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_scale() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(3_600 + 120), "1h 2m");
        assert_eq!(format_duration(90_000), "1d 1h");
        assert_eq!(format_millis(250), "250ms");
        assert_eq!(format_millis(61_000), "1m 1s");
    }
}
