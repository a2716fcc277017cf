//! Camera entity model.

use camvault_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `cameras` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Camera {
    pub id: DbId,
    pub name: String,
    /// Whether recording should run for this camera at all.
    pub recording_enabled: bool,
    /// Cached mirror of the external recorder's state. Never
    /// authoritative; refreshed opportunistically by the sweep.
    pub is_recording: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
