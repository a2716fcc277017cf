//! Repository for the `recordings` table.
//!
//! All status transitions go through conditional single-row updates
//! (`WHERE id = .. AND status_id = ..`), so a webhook delivery and a
//! sweep cycle racing on the same row cannot both win; the loser sees
//! `rows_affected == 0` and treats it as a benign conflict.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use camvault_core::linking::LinkDisposition;
use camvault_core::types::{DbId, Timestamp};

use crate::models::recording::{Recording, SegmentFileInfo};
use crate::models::status::RecordingStatus;

/// Column list for `recordings` queries.
const COLUMNS: &str = "\
    id, camera_id, filename, storage_path, file_size_bytes, \
    duration_seconds, start_time, end_time, status_id, upload_status_id, \
    metadata, created_at, updated_at";

/// How far back a webhook looks for a pathless row to attach to when no
/// open row exists for the camera.
const WEBHOOK_ATTACH_WINDOW_HOURS: i64 = 24;

/// How a webhook upsert resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new completed row was inserted.
    Created,
    /// An existing row was attached/refreshed.
    Updated,
}

/// Result of closing duplicate open rows for one camera.
#[derive(Debug, Clone)]
pub struct DuplicateResolution {
    /// The row retained as authoritative (the newest open row).
    pub kept: Recording,
    /// How many other open rows were closed.
    pub closed: u64,
}

/// Provides all reads and writes for recording rows.
pub struct RecordingRepo;

impl RecordingRepo {
    /// Find a recording by its canonical filename for one camera.
    pub async fn find_by_filename(
        pool: &PgPool,
        camera_id: DbId,
        filename: &str,
    ) -> Result<Option<Recording>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recordings \
             WHERE camera_id = $1 AND filename = $2 \
             ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(camera_id)
            .bind(filename)
            .fetch_optional(pool)
            .await
    }

    /// All open rows for a camera, newest first.
    pub async fn find_open_by_camera(
        pool: &PgPool,
        camera_id: DbId,
    ) -> Result<Vec<Recording>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recordings \
             WHERE camera_id = $1 AND status_id = $2 \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(camera_id)
            .bind(RecordingStatus::Recording.id())
            .fetch_all(pool)
            .await
    }

    /// Rows with no storage path created after `since`, newest first.
    pub async fn find_recent_orphans(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<Vec<Recording>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recordings \
             WHERE storage_path IS NULL AND created_at >= $1 \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(since)
            .fetch_all(pool)
            .await
    }

    /// Idempotent ingest of a completed-segment notification.
    ///
    /// Re-delivery of the same `(camera_id, filename)` refreshes the
    /// existing row and reports `Updated`. Otherwise the file attaches
    /// to the newest open row, or to a recent pathless row, and closes
    /// it; with no candidate a new completed row is inserted.
    pub async fn upsert_from_webhook(
        pool: &PgPool,
        camera_id: DbId,
        file: &SegmentFileInfo,
    ) -> Result<(Recording, UpsertOutcome), sqlx::Error> {
        if let Some(existing) = Self::find_by_filename(pool, camera_id, &file.filename).await? {
            let refreshed = Self::attach_and_complete(pool, &existing, file).await?;
            return Ok((refreshed.unwrap_or(existing), UpsertOutcome::Updated));
        }

        let candidate = match Self::find_open_by_camera(pool, camera_id).await?.into_iter().next() {
            Some(row) => Some(row),
            None => Self::newest_recent_pathless(pool, camera_id).await?,
        };

        if let Some(row) = candidate {
            if let Some(refreshed) = Self::attach_and_complete(pool, &row, file).await? {
                return Ok((refreshed, UpsertOutcome::Updated));
            }
            // Lost the conditional update; whoever won has already
            // attached the file. Fall through to the filename lookup.
            tracing::debug!(recording_id = %row.id, "Webhook upsert lost a row race, benign");
            if let Some(existing) =
                Self::find_by_filename(pool, camera_id, &file.filename).await?
            {
                return Ok((existing, UpsertOutcome::Updated));
            }
        }

        match Self::insert_completed(pool, camera_id, file, "webhook").await? {
            Some(created) => Ok((created, UpsertOutcome::Created)),
            None => {
                // A concurrent delivery inserted first; benign.
                tracing::debug!(camera_id = %camera_id, file = %file.filename, "Webhook insert lost a race, benign");
                let existing = Self::find_by_filename(pool, camera_id, &file.filename)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((existing, UpsertOutcome::Updated))
            }
        }
    }

    /// Attach file facts to `row` and close it, conditional on the row
    /// still being in the status we read. Returns `None` when the
    /// conditional update lost.
    async fn attach_and_complete(
        pool: &PgPool,
        row: &Recording,
        file: &SegmentFileInfo,
    ) -> Result<Option<Recording>, sqlx::Error> {
        let provenance = json!({
            "processed_by": "webhook",
            "processed_at": Utc::now().to_rfc3339(),
            "previous_status": row.status_id,
        });

        let query = format!(
            "UPDATE recordings SET \
                 filename = $3, \
                 storage_path = $4, \
                 file_size_bytes = COALESCE($5, file_size_bytes), \
                 duration_seconds = COALESCE($6, duration_seconds), \
                 start_time = COALESCE(start_time, $7), \
                 end_time = COALESCE($8, end_time), \
                 status_id = $9, \
                 metadata = metadata || $10, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(row.id)
            .bind(row.status_id)
            .bind(&file.filename)
            .bind(&file.storage_path)
            .bind(file.file_size_bytes)
            .bind(file.duration_seconds)
            .bind(file.start_time)
            .bind(file.end_time)
            .bind(RecordingStatus::Completed.id())
            .bind(provenance)
            .fetch_optional(pool)
            .await
    }

    /// Newest pathless row for a camera inside the webhook attach window.
    async fn newest_recent_pathless(
        pool: &PgPool,
        camera_id: DbId,
    ) -> Result<Option<Recording>, sqlx::Error> {
        let since = Utc::now() - chrono::Duration::hours(WEBHOOK_ATTACH_WINDOW_HOURS);
        let query = format!(
            "SELECT {COLUMNS} FROM recordings \
             WHERE camera_id = $1 AND storage_path IS NULL AND created_at >= $2 \
             ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(camera_id)
            .bind(since)
            .fetch_optional(pool)
            .await
    }

    /// Attach a discovered file to an orphan row found by the sweep.
    ///
    /// `AttachOnly` keeps the row open (the file may still be written);
    /// `Complete` also closes it with the supplied end time. Returns
    /// whether the conditional update won.
    pub async fn link_orphan_file(
        pool: &PgPool,
        row: &Recording,
        file: &SegmentFileInfo,
        disposition: LinkDisposition,
    ) -> Result<bool, sqlx::Error> {
        let provenance = json!({
            "processed_by": "reconciliation_sweep",
            "processed_at": Utc::now().to_rfc3339(),
            "previous_status": row.status_id,
        });

        let result = match disposition {
            LinkDisposition::AttachOnly => {
                sqlx::query(
                    "UPDATE recordings SET \
                         filename = $3, \
                         storage_path = $4, \
                         file_size_bytes = $5, \
                         metadata = metadata || $6, \
                         updated_at = NOW() \
                     WHERE id = $1 AND status_id = $2",
                )
                .bind(row.id)
                .bind(row.status_id)
                .bind(&file.filename)
                .bind(&file.storage_path)
                .bind(file.file_size_bytes)
                .bind(provenance)
                .execute(pool)
                .await?
            }
            LinkDisposition::Complete => {
                sqlx::query(
                    "UPDATE recordings SET \
                         filename = $3, \
                         storage_path = $4, \
                         file_size_bytes = $5, \
                         duration_seconds = COALESCE($6, duration_seconds), \
                         start_time = COALESCE(start_time, $7), \
                         end_time = $8, \
                         status_id = $9, \
                         metadata = metadata || $10, \
                         updated_at = NOW() \
                     WHERE id = $1 AND status_id = $2",
                )
                .bind(row.id)
                .bind(row.status_id)
                .bind(&file.filename)
                .bind(&file.storage_path)
                .bind(file.file_size_bytes)
                .bind(file.duration_seconds)
                .bind(file.start_time)
                .bind(file.end_time)
                .bind(RecordingStatus::Completed.id())
                .bind(provenance)
                .execute(pool)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    /// Insert a brand-new completed row for a file with no prior record.
    ///
    /// `source` lands in the provenance bag (`webhook` for the ingest
    /// path, `sweep_created` for files the scanner found first). The
    /// insert is conditional on no row existing yet for
    /// `(camera_id, filename)`, so two racing writers produce one row;
    /// the loser gets `None`.
    pub async fn insert_completed(
        pool: &PgPool,
        camera_id: DbId,
        file: &SegmentFileInfo,
        source: &str,
    ) -> Result<Option<Recording>, sqlx::Error> {
        let provenance = json!({
            "processed_by": source,
            "processed_at": Utc::now().to_rfc3339(),
        });

        let query = format!(
            "INSERT INTO recordings \
                 (camera_id, filename, storage_path, file_size_bytes, \
                  duration_seconds, start_time, end_time, status_id, metadata) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM recordings WHERE camera_id = $1 AND filename = $2 \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(camera_id)
            .bind(&file.filename)
            .bind(&file.storage_path)
            .bind(file.file_size_bytes)
            .bind(file.duration_seconds)
            .bind(file.start_time)
            .bind(file.end_time)
            .bind(RecordingStatus::Completed.id())
            .bind(provenance)
            .fetch_optional(pool)
            .await
    }

    /// Cameras currently holding more than one open row.
    pub async fn cameras_with_duplicate_active(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT camera_id FROM recordings \
             WHERE status_id = $1 \
             GROUP BY camera_id HAVING COUNT(*) > 1",
        )
        .bind(RecordingStatus::Recording.id())
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Close duplicate open rows for one camera, keeping the newest.
    ///
    /// Only duplicates created before `aged_before` are closed; rows
    /// still inside the grace period are left to coexist until a later
    /// cycle. Returns `None` when nothing was closed.
    pub async fn resolve_duplicate_active(
        pool: &PgPool,
        camera_id: DbId,
        aged_before: Timestamp,
    ) -> Result<Option<DuplicateResolution>, sqlx::Error> {
        let open = Self::find_open_by_camera(pool, camera_id).await?;
        if open.len() < 2 {
            return Ok(None);
        }

        let kept = open[0].clone();
        let mut closed = 0u64;

        for row in &open[1..] {
            if row.created_at >= aged_before {
                continue;
            }

            let provenance = json!({
                "processed_by": "reconciliation_sweep",
                "processed_at": Utc::now().to_rfc3339(),
                "duplicate_resolved": true,
                "kept_recording_id": kept.id,
            });

            let result = sqlx::query(
                "UPDATE recordings SET \
                     status_id = $3, \
                     end_time = NOW(), \
                     metadata = metadata || $4, \
                     updated_at = NOW() \
                 WHERE id = $1 AND status_id = $2",
            )
            .bind(row.id)
            .bind(RecordingStatus::Recording.id())
            .bind(RecordingStatus::Completed.id())
            .bind(provenance)
            .execute(pool)
            .await?;

            if result.rows_affected() > 0 {
                closed += 1;
            } else {
                tracing::debug!(recording_id = %row.id, "Duplicate close lost a row race, benign");
            }
        }

        if closed == 0 {
            return Ok(None);
        }
        Ok(Some(DuplicateResolution { kept, closed }))
    }

    /// Mark one open row failed with a reason. Returns whether the
    /// conditional update won.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let provenance = json!({
            "processed_by": "reconciliation_sweep",
            "processed_at": Utc::now().to_rfc3339(),
            "failed_reason": reason,
        });

        let result = sqlx::query(
            "UPDATE recordings SET \
                 status_id = $3, \
                 metadata = metadata || $4, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(RecordingStatus::Recording.id())
        .bind(RecordingStatus::Failed.id())
        .bind(provenance)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pathless open rows created before `cutoff`: streams that crashed
    /// before their first segment landed. Oldest first.
    pub async fn find_stale_orphans(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<Recording>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recordings \
             WHERE status_id = $1 AND storage_path IS NULL AND created_at < $2 \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(RecordingStatus::Recording.id())
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// A bounded batch of completed rows whose files may still change
    /// on disk, newest activity first. Rows already uploaded are the
    /// upload pipeline's problem and are skipped.
    pub async fn find_completed_for_refresh(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<Recording>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recordings \
             WHERE status_id = $1 AND storage_path IS NOT NULL \
               AND upload_status_id <> $2 \
             ORDER BY updated_at DESC LIMIT $3"
        );
        sqlx::query_as::<_, Recording>(&query)
            .bind(RecordingStatus::Completed.id())
            .bind(crate::models::status::UploadStatus::Uploaded.id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Write back a drifted on-disk file size for a completed row.
    pub async fn update_file_size(
        pool: &PgPool,
        id: DbId,
        size_bytes: i64,
    ) -> Result<bool, sqlx::Error> {
        let provenance = json!({
            "processed_by": "reconciliation_sweep",
            "processed_at": Utc::now().to_rfc3339(),
            "size_refreshed": true,
        });

        let result = sqlx::query(
            "UPDATE recordings SET \
                 file_size_bytes = $3, \
                 metadata = metadata || $4, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(RecordingStatus::Completed.id())
        .bind(size_bytes)
        .bind(provenance)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fail a completed row whose file has vanished from storage.
    pub async fn mark_file_missing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let provenance = json!({
            "processed_by": "reconciliation_sweep",
            "processed_at": Utc::now().to_rfc3339(),
            "failed_reason": "segment file missing from storage",
        });

        let result = sqlx::query(
            "UPDATE recordings SET \
                 status_id = $3, \
                 metadata = metadata || $4, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(RecordingStatus::Completed.id())
        .bind(RecordingStatus::Failed.id())
        .bind(provenance)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
