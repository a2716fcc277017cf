//! Recording entity model and the file-fact DTO both write paths use.

use camvault_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{RecordingStatus, StatusId};

/// A row from the `recordings` table: one row per video segment.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Recording {
    pub id: DbId,
    pub camera_id: DbId,
    /// Canonical base filename; never carries a temp marker.
    pub filename: Option<String>,
    /// Canonical storage-relative path, set once the file is known.
    pub storage_path: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub duration_seconds: Option<i32>,
    pub start_time: Option<Timestamp>,
    /// Only set once the segment is known to be closed.
    pub end_time: Option<Timestamp>,
    pub status_id: StatusId,
    pub upload_status_id: StatusId,
    /// Provenance bag: which component last touched the row, when, how.
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Recording {
    /// Whether the row is still in `recording` status.
    pub fn is_open(&self) -> bool {
        self.status_id == RecordingStatus::Recording.id()
    }
}

/// Facts about a segment file, as observed by the webhook or the scanner.
#[derive(Debug, Clone)]
pub struct SegmentFileInfo {
    /// Cleaned base filename (no temp marker, segment suffix enforced).
    pub filename: String,
    /// Canonical storage-relative path.
    pub storage_path: String,
    pub file_size_bytes: Option<i64>,
    /// Duration from the notification or the estimator; may be unknown.
    pub duration_seconds: Option<i32>,
    pub start_time: Option<Timestamp>,
    /// Close time to write when the row completes.
    pub end_time: Option<Timestamp>,
}
