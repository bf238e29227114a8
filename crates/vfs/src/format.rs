//! Human-readable sizes and durations for file listings.

use std::time::Duration;

const UNITS: [&str; 4] = ["K", "M", "G", "T"];

/// `123`, `1.2K`, `3.4M`, ... with one decimal above a kilobyte.
///
/// ```
/// use trove_vfs::format::size;
///
/// assert_eq!(size(512), "512");
/// assert_eq!(size(7270), "7.1K");
/// ```
pub fn size(bytes: u64) -> String {
    if bytes < 1024 {
        return bytes.to_string();
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1}{}", UNITS[unit])
}

/// `m:ss`, or `h:mm:ss` for anything an hour or longer.
pub fn duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    match hours {
        0 => format!("{minutes}:{seconds:02}"),
        _ => format!("{hours}:{minutes:02}:{seconds:02}"),
    }
}
