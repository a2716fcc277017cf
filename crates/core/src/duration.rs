//! Segment duration estimation.
//!
//! Picks among the available duration signals in fixed priority order:
//! a probed media duration, the `end - start` timestamp delta, then the
//! file-mtime-to-row-creation delta. Every accepted value must fall
//! inside `(0, max_segment_secs * DURATION_TOLERANCE]`; when no signal
//! qualifies the duration stays unknown. A raw file-size heuristic is
//! deliberately not a signal.

use crate::types::Timestamp;

/// Tolerance factor applied to the configured maximum segment length.
pub const DURATION_TOLERANCE: f64 = 1.2;

/// The signals available when estimating one segment's duration.
#[derive(Debug, Clone, Default)]
pub struct DurationSignals {
    /// Duration probed from the media container itself, in seconds.
    pub probed_secs: Option<f64>,
    /// Known segment start time.
    pub start_time: Option<Timestamp>,
    /// Known segment end time.
    pub end_time: Option<Timestamp>,
    /// Filesystem modification time of the segment file.
    pub file_modified: Option<Timestamp>,
    /// Creation time of the metadata row the file is being linked to.
    pub row_created: Option<Timestamp>,
}

/// Clamp-check a candidate duration against the configured bound.
///
/// Returns the rounded whole-second value when it lies inside
/// `(0, max_segment_secs * DURATION_TOLERANCE]`, otherwise `None`.
pub fn bounded(secs: f64, max_segment_secs: u32) -> Option<i32> {
    let upper = f64::from(max_segment_secs) * DURATION_TOLERANCE;
    if secs > 0.0 && secs <= upper {
        Some(secs.round() as i32)
    } else {
        None
    }
}

/// Estimate a segment duration from the available signals.
///
/// First qualifying signal wins; `None` means unknown, never zero.
pub fn estimate(signals: &DurationSignals, max_segment_secs: u32) -> Option<i32> {
    if let Some(probed) = signals.probed_secs {
        if let Some(secs) = bounded(probed, max_segment_secs) {
            return Some(secs);
        }
    }

    if let (Some(start), Some(end)) = (signals.start_time, signals.end_time) {
        let delta = (end - start).num_milliseconds() as f64 / 1000.0;
        if let Some(secs) = bounded(delta, max_segment_secs) {
            return Some(secs);
        }
    }

    if let (Some(created), Some(modified)) = (signals.row_created, signals.file_modified) {
        let delta = (modified - created).num_milliseconds() as f64 / 1000.0;
        if let Some(secs) = bounded(delta, max_segment_secs) {
            return Some(secs);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    const MAX_SEGMENT_SECS: u32 = 1800;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_755_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn probed_signal_wins() {
        let signals = DurationSignals {
            probed_secs: Some(1795.4),
            start_time: Some(at(0)),
            end_time: Some(at(900)),
            ..Default::default()
        };
        assert_eq!(estimate(&signals, MAX_SEGMENT_SECS), Some(1795));
    }

    #[test]
    fn out_of_bounds_probe_falls_through_to_timestamps() {
        let signals = DurationSignals {
            probed_secs: Some(90_000.0),
            start_time: Some(at(0)),
            end_time: Some(at(1800)),
            ..Default::default()
        };
        assert_eq!(estimate(&signals, MAX_SEGMENT_SECS), Some(1800));
    }

    #[test]
    fn negative_timestamp_delta_is_rejected() {
        let signals = DurationSignals {
            start_time: Some(at(1800)),
            end_time: Some(at(0)),
            ..Default::default()
        };
        assert_eq!(estimate(&signals, MAX_SEGMENT_SECS), None);
    }

    #[test]
    fn mtime_delta_used_last() {
        let signals = DurationSignals {
            row_created: Some(at(0)),
            file_modified: Some(at(1500)),
            ..Default::default()
        };
        assert_eq!(estimate(&signals, MAX_SEGMENT_SECS), Some(1500));
    }

    #[test]
    fn mtime_delta_outside_tolerance_is_rejected() {
        // 1.2 * 1800 = 2160 is the upper bound.
        let inside = DurationSignals {
            row_created: Some(at(0)),
            file_modified: Some(at(2160)),
            ..Default::default()
        };
        assert_eq!(estimate(&inside, MAX_SEGMENT_SECS), Some(2160));

        let outside = DurationSignals {
            row_created: Some(at(0)),
            file_modified: Some(at(2161)),
            ..Default::default()
        };
        assert_eq!(estimate(&outside, MAX_SEGMENT_SECS), None);
    }

    #[test]
    fn no_qualifying_signal_means_unknown() {
        assert_eq!(estimate(&DurationSignals::default(), MAX_SEGMENT_SECS), None);

        let all_bad = DurationSignals {
            probed_secs: Some(0.0),
            start_time: Some(at(0)),
            end_time: Some(at(0)),
            row_created: Some(at(100)),
            file_modified: Some(at(0)),
        };
        assert_eq!(estimate(&all_bad, MAX_SEGMENT_SECS), None);
    }

    #[test]
    fn bounded_edges() {
        assert_eq!(bounded(0.0, MAX_SEGMENT_SECS), None);
        assert_eq!(bounded(-5.0, MAX_SEGMENT_SECS), None);
        assert_eq!(bounded(1.0, MAX_SEGMENT_SECS), Some(1));
        assert_eq!(bounded(2160.0, MAX_SEGMENT_SECS), Some(2160));
        assert_eq!(bounded(2160.5, MAX_SEGMENT_SECS), None);
    }

    #[test]
    fn sub_second_delta_rounds() {
        let signals = DurationSignals {
            start_time: Some(at(0)),
            end_time: Some(at(0) + Duration::milliseconds(1750)),
            ..Default::default()
        };
        assert_eq!(estimate(&signals, MAX_SEGMENT_SECS), Some(2));
    }
}
