//! Disposition rules for linking a discovered file to an open row.
//!
//! A row younger than the grace period may belong to a segment still
//! being written, so linking only attaches file metadata and leaves the
//! row open. Once the row has aged past the grace period the link also
//! closes it.

use chrono::Duration;

use crate::types::Timestamp;

/// What a link operation is allowed to do to the target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDisposition {
    /// Attach file metadata only; the row stays open.
    AttachOnly,
    /// Attach file metadata and close the row.
    Complete,
}

/// Decide the link disposition for a row.
///
/// `AttachOnly` applies only to rows that are still open and younger
/// than `grace`; everything else completes.
pub fn disposition(
    row_created: Timestamp,
    still_recording: bool,
    now: Timestamp,
    grace: Duration,
) -> LinkDisposition {
    if still_recording && now - row_created < grace {
        LinkDisposition::AttachOnly
    } else {
        LinkDisposition::Complete
    }
}

/// Compute the close time for a row being completed.
///
/// `start + duration` when both are known, otherwise the file's
/// modification time.
pub fn close_time(
    start_time: Option<Timestamp>,
    duration_secs: Option<i32>,
    file_modified: Timestamp,
) -> Timestamp {
    match (start_time, duration_secs) {
        (Some(start), Some(secs)) => start + Duration::seconds(i64::from(secs)),
        _ => file_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const GRACE_SECS: i64 = 1800;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_755_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn young_open_row_only_attaches() {
        let d = disposition(at(0), true, at(600), Duration::seconds(GRACE_SECS));
        assert_eq!(d, LinkDisposition::AttachOnly);
    }

    #[test]
    fn aged_open_row_completes() {
        let d = disposition(at(0), true, at(GRACE_SECS), Duration::seconds(GRACE_SECS));
        assert_eq!(d, LinkDisposition::Complete);
    }

    #[test]
    fn closed_row_completes_regardless_of_age() {
        let d = disposition(at(0), false, at(1), Duration::seconds(GRACE_SECS));
        assert_eq!(d, LinkDisposition::Complete);
    }

    #[test]
    fn close_time_prefers_start_plus_duration() {
        let t = close_time(Some(at(0)), Some(1800), at(9_999));
        assert_eq!(t, at(1800));
    }

    #[test]
    fn close_time_falls_back_to_mtime() {
        assert_eq!(close_time(Some(at(0)), None, at(42)), at(42));
        assert_eq!(close_time(None, Some(1800), at(42)), at(42));
    }
}
