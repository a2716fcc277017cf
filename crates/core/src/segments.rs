//! Segment filename conventions.
//!
//! The media server names segment files `YYYY-MM-DD-HH-MM-SS-N.mp4`
//! (start timestamp plus an index) and prefixes in-progress files with a
//! dot. These helpers parse and clean those names without touching the
//! filesystem.

use chrono::NaiveDateTime;

use crate::types::Timestamp;

/// File suffix all segment files carry.
pub const SEGMENT_SUFFIX: &str = ".mp4";

/// Timestamp prefix format of a segment filename.
const FILENAME_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Length of the timestamp prefix, `2025-08-10-11-11-33`.
const FILENAME_TIME_LEN: usize = 19;

/// Whether a filename still carries the in-progress temp marker.
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(crate::paths::TEMP_MARKER)
}

/// Clean a webhook-supplied filename into its canonical base form.
///
/// Strips a single leading temp marker and forces the segment suffix
/// (replacing any other extension). Returns `None` when nothing usable
/// remains.
pub fn clean_filename(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix(crate::paths::TEMP_MARKER).unwrap_or(trimmed);
    if name.is_empty() {
        return None;
    }

    if name.ends_with(SEGMENT_SUFFIX) {
        return Some(name.to_string());
    }

    // Replace a foreign extension, or append when there is none.
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    };
    if stem.is_empty() {
        return None;
    }
    Some(format!("{stem}{SEGMENT_SUFFIX}"))
}

/// Parse the recording start time encoded in a segment filename.
///
/// Returns `None` when the name does not begin with the
/// `YYYY-MM-DD-HH-MM-SS` prefix. The encoded time is taken as UTC, the
/// timezone the recorder is run in.
pub fn start_time_from_filename(name: &str) -> Option<Timestamp> {
    if name.len() < FILENAME_TIME_LEN {
        return None;
    }
    let prefix = &name[..FILENAME_TIME_LEN];
    NaiveDateTime::parse_from_str(prefix, FILENAME_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn clean_plain_name_unchanged() {
        assert_eq!(
            clean_filename("2025-08-10-11-11-33-0.mp4").as_deref(),
            Some("2025-08-10-11-11-33-0.mp4")
        );
    }

    #[test]
    fn clean_strips_temp_marker() {
        assert_eq!(
            clean_filename(".2025-08-10-11-11-33-0.mp4").as_deref(),
            Some("2025-08-10-11-11-33-0.mp4")
        );
    }

    #[test]
    fn clean_forces_segment_suffix() {
        assert_eq!(
            clean_filename("2025-08-10-11-11-33-0.tmp").as_deref(),
            Some("2025-08-10-11-11-33-0.mp4")
        );
        assert_eq!(clean_filename("segment").as_deref(), Some("segment.mp4"));
    }

    #[test]
    fn clean_rejects_empty() {
        assert_eq!(clean_filename(""), None);
        assert_eq!(clean_filename("."), None);
        assert_eq!(clean_filename("   "), None);
    }

    #[test]
    fn start_time_parses_prefix() {
        let t = start_time_from_filename("2025-08-21-04-06-25-0.mp4").unwrap();
        assert_eq!(
            (t.year(), t.month(), t.day(), t.hour(), t.minute(), t.second()),
            (2025, 8, 21, 4, 6, 25)
        );
    }

    #[test]
    fn start_time_rejects_foreign_names() {
        assert!(start_time_from_filename("segment-1.mp4").is_none());
        assert!(start_time_from_filename("2025-13-40-99-99-99-0.mp4").is_none());
        assert!(start_time_from_filename("short").is_none());
    }

    #[test]
    fn temp_name_detection() {
        assert!(is_temp_name(".2025-08-10-11-11-33-0.mp4"));
        assert!(!is_temp_name("2025-08-10-11-11-33-0.mp4"));
    }
}
