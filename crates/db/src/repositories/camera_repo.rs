//! Repository for the `cameras` table.

use sqlx::PgPool;

use camvault_core::types::DbId;

use crate::models::camera::Camera;

/// Column list for `cameras` queries.
const COLUMNS: &str = "id, name, recording_enabled, is_recording, created_at, updated_at";

/// Provides reads and the mirror-flag write for cameras.
pub struct CameraRepo;

impl CameraRepo {
    /// Find a camera by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Camera>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cameras WHERE id = $1");
        sqlx::query_as::<_, Camera>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Refresh the cached `is_recording` mirror flag.
    pub async fn set_is_recording(
        pool: &PgPool,
        id: DbId,
        value: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cameras SET is_recording = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
