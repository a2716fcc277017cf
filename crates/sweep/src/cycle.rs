//! One reconciliation pass: scanning → matching → linking →
//! resolving-duplicates → recorder-state reconciliation → expiry and
//! refresh housekeeping → done.
//!
//! Errors on individual files or rows are counted and never abort the
//! rest of the cycle. A shutdown request is honored between row-level
//! operations so no write is abandoned midway.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use camvault_core::duration::DurationSignals;
use camvault_core::types::{DbId, Timestamp};
use camvault_core::{duration, identity, linking, paths, probe, segments};
use camvault_db::models::recording::{Recording, SegmentFileInfo};
use camvault_db::repositories::{CameraRepo, RecordingRepo};
use camvault_recorder::RecorderApi;

use crate::scanner::{self, ScannedFile};
use crate::SweepConfig;

/// Counters published at the end of every cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub dirs_skipped: u64,
    /// Scanned files with no resolvable camera identity.
    pub unresolved_files: u64,
    pub orphans_found: u64,
    pub links_made: u64,
    /// Rows created for files that had no record at all.
    pub sweep_created: u64,
    /// Duplicate open rows closed.
    pub duplicates_resolved: u64,
    /// Live streams the recorder reported this cycle.
    pub live_streams: u64,
    /// Enabled cameras whose recording had to be restarted.
    pub recordings_started: u64,
    /// Pathless open rows failed after the TTL.
    pub rows_expired: u64,
    /// Completed rows whose on-disk size was written back.
    pub rows_refreshed: u64,
    /// Completed rows whose file has vanished.
    pub files_missing: u64,
    pub errors: u64,
}

/// Run one reconciliation cycle. Always returns stats, even when cut
/// short by shutdown.
pub async fn run_cycle(
    pool: &PgPool,
    recorder: &RecorderApi,
    config: &SweepConfig,
    cancel: &CancellationToken,
) -> CycleStats {
    let mut stats = CycleStats::default();
    let now = Utc::now();

    // -- scanning --
    let cutoff = now - Duration::seconds(config.lookback_secs);
    let report = scanner::scan_recent_segments(&config.storage_root, cutoff).await;
    stats.files_scanned = report.files.len() as u64;
    stats.files_skipped = report.files_skipped;
    stats.dirs_skipped = report.dirs_skipped;

    // -- matching --
    let orphans = match RecordingRepo::find_recent_orphans(pool, cutoff).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "Orphan query failed, linking skipped this cycle");
            stats.errors += 1;
            Vec::new()
        }
    };
    stats.orphans_found = orphans.len() as u64;

    // -- linking --
    let mut linked_rows: HashSet<DbId> = HashSet::new();
    for file in &report.files {
        if cancel.is_cancelled() {
            tracing::info!("Shutdown requested, ending cycle after current operation");
            return stats;
        }
        if let Err(e) =
            link_file(pool, config, file, &orphans, &mut linked_rows, now, &mut stats).await
        {
            tracing::warn!(file = %file.filename, error = %e, "Linking failed for one file");
            stats.errors += 1;
        }
    }

    // -- resolving duplicates --
    resolve_duplicates(pool, recorder, config, cancel, now, &mut stats).await;
    if cancel.is_cancelled() {
        return stats;
    }

    // -- recorder-state reconciliation --
    reconcile_recorder_state(pool, recorder, cancel, &mut stats).await;
    if cancel.is_cancelled() {
        return stats;
    }

    // -- expiring stale orphans --
    let ttl_cutoff = now - Duration::seconds(config.orphan_ttl_secs);
    match RecordingRepo::find_stale_orphans(pool, ttl_cutoff).await {
        Ok(rows) => {
            for row in rows {
                if cancel.is_cancelled() {
                    return stats;
                }
                match RecordingRepo::mark_failed(pool, row.id, "segment file never materialized")
                    .await
                {
                    Ok(true) => {
                        stats.rows_expired += 1;
                        tracing::info!(recording_id = %row.id, "Expired stale orphan recording");
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(recording_id = %row.id, error = %e, "Orphan expiry failed");
                        stats.errors += 1;
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stale orphan query failed");
            stats.errors += 1;
        }
    }

    // -- refreshing file facts on completed rows --
    refresh_completed(pool, config, cancel, &mut stats).await;

    stats
}

/// Link one scanned file to its row, or create a sweep-provenance row
/// when no record exists at all.
async fn link_file(
    pool: &PgPool,
    config: &SweepConfig,
    file: &ScannedFile,
    orphans: &[Recording],
    linked_rows: &mut HashSet<DbId>,
    now: Timestamp,
    stats: &mut CycleStats,
) -> Result<(), sqlx::Error> {
    let Some(camera_id) = file.camera_id else {
        tracing::debug!(path = %file.storage_path, "No camera identity in path, leaving for later");
        stats.unresolved_files += 1;
        return Ok(());
    };

    // A previous cycle may already have attached this file while its
    // row was inside the grace period; such a row is revisited every
    // cycle until it ages out and completes. Closed rows are done.
    let existing = RecordingRepo::find_by_filename(pool, camera_id, &file.filename).await?;
    let target: Option<&Recording> = match &existing {
        Some(row) if row.is_open() => Some(row),
        Some(_) => return Ok(()),
        None => {
            // Prefer an exact filename match among the orphans, then
            // fall back to the single open pathless row for the camera.
            // More than one open row defers to duplicate resolution
            // first.
            match orphans.iter().find(|r| {
                r.camera_id == camera_id
                    && !linked_rows.contains(&r.id)
                    && r.filename.as_deref() == Some(file.filename.as_str())
            }) {
                Some(row) => Some(row),
                None => {
                    let open: Vec<&Recording> = orphans
                        .iter()
                        .filter(|r| {
                            r.camera_id == camera_id && r.is_open() && !linked_rows.contains(&r.id)
                        })
                        .collect();
                    match open.len() {
                        0 => None,
                        1 => Some(open[0]),
                        _ => {
                            tracing::debug!(
                                camera_id = %camera_id,
                                open_rows = open.len(),
                                "Multiple open rows, deferring link until duplicates resolve"
                            );
                            return Ok(());
                        }
                    }
                }
            }
        }
    };

    let probed = match probe::probe_duration_secs(&file.abs_path).await {
        Ok(secs) => secs,
        Err(e) => {
            tracing::debug!(file = %file.filename, error = %e, "Duration probe unavailable");
            None
        }
    };

    match target {
        Some(row) => {
            let start_time = row
                .start_time
                .or_else(|| segments::start_time_from_filename(&file.filename));
            let estimated = duration::estimate(
                &DurationSignals {
                    probed_secs: probed,
                    start_time,
                    end_time: row.end_time,
                    file_modified: Some(file.modified),
                    row_created: Some(row.created_at),
                },
                config.max_segment_secs,
            );

            let disposition = linking::disposition(
                row.created_at,
                row.is_open(),
                now,
                Duration::seconds(config.grace_period_secs),
            );
            let end_time = match disposition {
                linking::LinkDisposition::AttachOnly => None,
                linking::LinkDisposition::Complete => {
                    Some(linking::close_time(start_time, estimated, file.modified))
                }
            };

            let info = SegmentFileInfo {
                filename: file.filename.clone(),
                storage_path: file.storage_path.clone(),
                file_size_bytes: Some(file.size_bytes),
                duration_seconds: estimated,
                start_time,
                end_time,
            };

            if RecordingRepo::link_orphan_file(pool, row, &info, disposition).await? {
                linked_rows.insert(row.id);
                stats.links_made += 1;
                tracing::info!(
                    recording_id = %row.id,
                    file = %file.filename,
                    ?disposition,
                    "Linked orphan file to recording"
                );
            } else {
                tracing::debug!(recording_id = %row.id, "Link lost a row race, benign");
            }
        }
        None => {
            let start_time = segments::start_time_from_filename(&file.filename);
            let estimated = duration::estimate(
                &DurationSignals {
                    probed_secs: probed,
                    start_time,
                    end_time: Some(file.modified),
                    ..Default::default()
                },
                config.max_segment_secs,
            );

            let info = SegmentFileInfo {
                filename: file.filename.clone(),
                storage_path: file.storage_path.clone(),
                file_size_bytes: Some(file.size_bytes),
                duration_seconds: estimated,
                start_time,
                end_time: Some(linking::close_time(start_time, estimated, file.modified)),
            };

            match RecordingRepo::insert_completed(pool, camera_id, &info, "sweep_created").await? {
                Some(created) => {
                    stats.sweep_created += 1;
                    tracing::info!(
                        recording_id = %created.id,
                        file = %file.filename,
                        "Created recording for unrecorded file"
                    );
                }
                None => {
                    tracing::debug!(file = %file.filename, "Row appeared concurrently, benign");
                }
            }
        }
    }

    Ok(())
}

/// Close aged duplicate open rows and resynchronize the recorder for
/// every affected camera.
async fn resolve_duplicates(
    pool: &PgPool,
    recorder: &RecorderApi,
    config: &SweepConfig,
    cancel: &CancellationToken,
    now: Timestamp,
    stats: &mut CycleStats,
) {
    let cameras = match RecordingRepo::cameras_with_duplicate_active(pool).await {
        Ok(cameras) => cameras,
        Err(e) => {
            tracing::warn!(error = %e, "Duplicate-active query failed");
            stats.errors += 1;
            return;
        }
    };

    let aged_before = now - Duration::seconds(config.grace_period_secs);

    for camera_id in cameras {
        if cancel.is_cancelled() {
            return;
        }

        match RecordingRepo::resolve_duplicate_active(pool, camera_id, aged_before).await {
            Ok(Some(resolution)) => {
                stats.duplicates_resolved += resolution.closed;
                tracing::info!(
                    camera_id = %camera_id,
                    kept = %resolution.kept.id,
                    closed = resolution.closed,
                    "Resolved duplicate active recordings"
                );
                resync_recorder(pool, recorder, camera_id, stats).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(camera_id = %camera_id, error = %e, "Duplicate resolution failed");
                stats.errors += 1;
            }
        }
    }
}

/// Reconcile the recorder's own view: enabled cameras with a live
/// stream but no active segment recording get their recording
/// restarted, and the cached `is_recording` mirror flag is refreshed
/// from what the recorder actually reports.
async fn reconcile_recorder_state(
    pool: &PgPool,
    recorder: &RecorderApi,
    cancel: &CancellationToken,
    stats: &mut CycleStats,
) {
    let media = match recorder.list_active_media().await {
        Ok(media) => media,
        Err(e) => {
            // Control-plane failure degrades this phase for one cycle.
            tracing::warn!(error = %e, "Active media listing failed, recorder state skipped");
            stats.errors += 1;
            return;
        }
    };
    stats.live_streams = media.len() as u64;

    for stream in media {
        if cancel.is_cancelled() {
            return;
        }

        let Some(camera_id) = identity::resolve_stream(&stream.stream) else {
            tracing::debug!(stream = %stream.stream, "Live stream without camera identity");
            continue;
        };

        let camera = match CameraRepo::find_by_id(pool, camera_id).await {
            Ok(Some(camera)) => camera,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(camera_id = %camera_id, error = %e, "Camera lookup failed");
                stats.errors += 1;
                continue;
            }
        };

        let segment = match recorder.current_segment_info(&stream.stream).await {
            Ok(segment) => segment,
            Err(e) => {
                tracing::warn!(stream = %stream.stream, error = %e, "Segment info lookup failed");
                stats.errors += 1;
                continue;
            }
        };
        let mut recording_active = segment.is_some();

        if camera.recording_enabled && !recording_active {
            match recorder.start_recording(&stream.stream).await {
                Ok(()) => {
                    recording_active = true;
                    stats.recordings_started += 1;
                    tracing::info!(
                        camera_id = %camera_id,
                        stream = %stream.stream,
                        "Restarted recording for live stream"
                    );
                }
                Err(e) => {
                    tracing::warn!(stream = %stream.stream, error = %e, "Recording restart failed");
                    stats.errors += 1;
                }
            }
        }

        if camera.is_recording != recording_active {
            if let Err(e) = CameraRepo::set_is_recording(pool, camera_id, recording_active).await {
                tracing::warn!(camera_id = %camera_id, error = %e, "Camera flag refresh failed");
                stats.errors += 1;
            }
        }
    }
}

/// Stop+start the recorder for a camera so its control state matches the
/// single retained row, then refresh the cached camera flag.
async fn resync_recorder(
    pool: &PgPool,
    recorder: &RecorderApi,
    camera_id: DbId,
    stats: &mut CycleStats,
) {
    let stream = camera_id.to_string();

    if let Err(e) = recorder.stop_recording(&stream).await {
        tracing::warn!(camera_id = %camera_id, error = %e, "Recorder stop failed during resync");
        stats.errors += 1;
        return;
    }

    match recorder.start_recording(&stream).await {
        Ok(()) => {
            if let Err(e) = CameraRepo::set_is_recording(pool, camera_id, true).await {
                tracing::warn!(camera_id = %camera_id, error = %e, "Camera flag refresh failed");
                stats.errors += 1;
            }
        }
        Err(e) => {
            tracing::warn!(camera_id = %camera_id, error = %e, "Recorder restart failed during resync");
            stats.errors += 1;
            if let Err(e) = CameraRepo::set_is_recording(pool, camera_id, false).await {
                tracing::warn!(camera_id = %camera_id, error = %e, "Camera flag refresh failed");
            }
        }
    }
}

/// Re-stat a bounded batch of completed rows: write back size drift,
/// fail rows whose file has vanished.
async fn refresh_completed(
    pool: &PgPool,
    config: &SweepConfig,
    cancel: &CancellationToken,
    stats: &mut CycleStats,
) {
    let rows = match RecordingRepo::find_completed_for_refresh(pool, config.refresh_batch).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "Refresh query failed");
            stats.errors += 1;
            return;
        }
    };

    for row in rows {
        if cancel.is_cancelled() {
            return;
        }

        let Some(storage_path) = row.storage_path.as_deref() else {
            continue;
        };
        let Some(abs_path) = paths::to_absolute(storage_path, &config.storage_root) else {
            tracing::debug!(recording_id = %row.id, path = storage_path, "Non-canonical path, refresh skipped");
            continue;
        };

        match tokio::fs::metadata(&abs_path).await {
            Ok(meta) => {
                let size = meta.len() as i64;
                if row.file_size_bytes != Some(size) {
                    match RecordingRepo::update_file_size(pool, row.id, size).await {
                        Ok(true) => stats.rows_refreshed += 1,
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!(recording_id = %row.id, error = %e, "Size refresh failed");
                            stats.errors += 1;
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match RecordingRepo::mark_file_missing(pool, row.id).await {
                    Ok(true) => {
                        stats.files_missing += 1;
                        tracing::warn!(recording_id = %row.id, path = storage_path, "Segment file missing from storage");
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(recording_id = %row.id, error = %e, "Missing-file update failed");
                        stats.errors += 1;
                    }
                }
            }
            Err(e) => {
                // Transient stat failure: skip, retried next cycle.
                tracing::debug!(recording_id = %row.id, error = %e, "File stat failed, refresh skipped");
            }
        }
    }
}
