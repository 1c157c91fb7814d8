//! Human-readable label formatting for popups and measurement labels.

use chrono::{DateTime, Utc};

/// Format a millisecond duration as "2d 3h", "1h 30m", "45m" or "30s".
///
/// # Example
/// ```
/// use track_overlay::format::format_duration;
///
/// assert_eq!(format_duration(90 * 60 * 1000), "1h 30m");
/// assert_eq!(format_duration(6 * 60 * 1000), "6m");
/// ```
pub fn format_duration(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{total_seconds}s")
    }
}

/// Format a distance in meters as kilometers with two decimals.
pub fn format_km(meters: f64) -> String {
    format!("{:.2} km", meters / 1000.0)
}

/// Format a fix timestamp for popup display.
pub fn format_fix_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(30_000), "30s");
        assert_eq!(format_duration(6 * 60 * 1000), "6m");
        assert_eq!(format_duration(90 * 60 * 1000), "1h 30m");
        assert_eq!(format_duration(27 * 3600 * 1000), "1d 3h");
        assert_eq!(format_duration(-5_000), "0s");
    }

    #[test]
    fn test_format_km_rounds_to_two_decimals() {
        assert_eq!(format_km(1000.75), "1.00 km");
        assert_eq!(format_km(2001.5), "2.00 km");
        assert_eq!(format_km(12_340.0), "12.34 km");
        assert_eq!(format_km(0.0), "0.00 km");
    }

    #[test]
    fn test_format_fix_time() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(format_fix_time(t), "2024-05-01 08:30");
    }
}
