//! Control-plane client for the external media recorder.
//!
//! Wraps the recorder's HTTP control API (start/stop recording, active
//! media listing, current segment lookup) using [`reqwest`]. Every call
//! carries a short timeout and at most one retry; a failing control
//! plane degrades one reconciliation cycle, it never crashes the loop.

pub mod api;

pub use api::{MediaStream, RecorderApi, RecorderApiError, RecorderSettings, SegmentInfo};
