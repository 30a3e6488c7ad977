//! Small helpers shared by the library and the binary

use std::time::Duration;

/// Compact human-readable duration
///
/// ```
/// use std::time::Duration;
/// use mus::util::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
/// assert_eq!(format_duration(Duration::from_secs(125)), "2m:05s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    const MINUTE: u128 = 60 * 1000;
    const HOUR: u128 = 60 * MINUTE;
    const DAY: u128 = 24 * HOUR;

    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < MINUTE {
        format!("{:.1}s", duration.as_secs_f64())
    } else if ms < HOUR {
        format!("{}m:{:02}s", ms / MINUTE, (ms % MINUTE) / 1000)
    } else if ms < DAY {
        format!("{}h:{:02}m", ms / HOUR, (ms % HOUR) / MINUTE)
    } else {
        format!("{}d:{:02}h", ms / DAY, (ms % DAY) / HOUR)
    }
}
