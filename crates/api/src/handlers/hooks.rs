//! Recorder webhook ingestion.
//!
//! The recorder posts one notification per completed segment. The
//! handler resolves the camera, normalizes the path, and performs a
//! single idempotent gateway upsert — re-deliveries update the same row.
//! Everything that cannot be resolved right now is acknowledged as
//! `deferred`; the filesystem scanner will pick the file up later, so
//! the recorder must not keep retrying.

use axum::extract::State;
use axum::Json;
use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use camvault_core::types::Timestamp;
use camvault_core::{duration, identity, paths, segments};
use camvault_db::models::recording::SegmentFileInfo;
use camvault_db::repositories::{CameraRepo, RecordingRepo, UpsertOutcome};

use crate::error::AppResult;
use crate::state::AppState;

/// Completed-segment notification payload.
#[derive(Debug, Deserialize)]
pub struct RecordMp4Hook {
    /// Absolute, environment-specific path the recorder wrote to.
    pub file_path: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    /// Segment duration in seconds; 0 or absent means unknown.
    #[serde(default)]
    pub time_len: Option<f64>,
    /// Unix seconds the segment started.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Stream reference, normally the camera UUID.
    pub stream: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub app: Option<String>,
}

/// How the notification was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    Created,
    Updated,
    /// Could not be applied yet; the sweep retries from the file itself.
    Deferred,
}

/// Acknowledgement envelope; the recorder only checks `code == 0`.
#[derive(Debug, Serialize)]
pub struct HookAck {
    pub code: i32,
    pub msg: String,
    pub action: HookAction,
}

impl HookAck {
    fn applied(action: HookAction) -> Self {
        let msg = match action {
            HookAction::Created => "recording created",
            HookAction::Updated => "recording updated",
            HookAction::Deferred => "deferred",
        };
        Self {
            code: 0,
            msg: msg.to_string(),
            action,
        }
    }

    fn deferred(reason: &str) -> Self {
        Self {
            code: 0,
            msg: format!("deferred: {reason}"),
            action: HookAction::Deferred,
        }
    }
}

/// POST /api/v1/hooks/on_record_mp4
///
/// Ingest one completed-segment notification. Must answer inside the
/// hook timeout; idempotence at the gateway makes recorder retries safe.
pub async fn on_record_mp4(
    State(state): State<AppState>,
    Json(hook): Json<RecordMp4Hook>,
) -> AppResult<Json<HookAck>> {
    let Some(camera_id) = identity::resolve(Some(&hook.stream), Some(&hook.file_path)) else {
        tracing::warn!(
            stream = %hook.stream,
            file = %hook.file_name,
            "Webhook without resolvable camera identity"
        );
        return Ok(Json(HookAck::deferred("unresolved camera identity")));
    };

    let camera = match CameraRepo::find_by_id(&state.pool, camera_id).await? {
        Some(camera) => camera,
        None => {
            tracing::warn!(camera_id = %camera_id, "Webhook for unknown camera");
            return Ok(Json(HookAck::deferred("unknown camera")));
        }
    };

    let Some(filename) = segments::clean_filename(&hook.file_name) else {
        tracing::warn!(file = %hook.file_name, "Webhook with unusable filename");
        return Ok(Json(HookAck::deferred("unusable filename")));
    };

    let normalized = paths::normalize(&hook.file_path);
    if !normalized.canonical {
        tracing::warn!(
            path = %hook.file_path,
            "Webhook path outside canonical storage root, storing best-effort"
        );
    }
    let storage_path = replace_filename(&normalized.path, &filename);

    let start_time = hook
        .start_time
        .filter(|secs| *secs > 0)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    let duration_seconds = hook
        .time_len
        .and_then(|secs| duration::bounded(secs, state.engine.segment_secs));

    let end_time = close_time(start_time, duration_seconds);

    let info = SegmentFileInfo {
        filename,
        storage_path,
        file_size_bytes: hook.file_size.filter(|size| *size > 0),
        duration_seconds,
        start_time,
        end_time,
    };

    let (recording, outcome) =
        RecordingRepo::upsert_from_webhook(&state.pool, camera_id, &info).await?;

    let action = match outcome {
        UpsertOutcome::Created => HookAction::Created,
        UpsertOutcome::Updated => HookAction::Updated,
    };

    tracing::info!(
        recording_id = %recording.id,
        camera = %camera.name,
        file = %info.filename,
        ?action,
        "Segment notification ingested"
    );

    Ok(Json(HookAck::applied(action)))
}

/// Swap the final segment of a normalized path for the cleaned filename.
fn replace_filename(path: &str, filename: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{filename}"),
        None => filename.to_string(),
    }
}

/// End time for the webhook's already-closed segment, when computable.
fn close_time(start_time: Option<Timestamp>, duration_seconds: Option<i32>) -> Option<Timestamp> {
    match (start_time, duration_seconds) {
        (Some(start), Some(secs)) => Some(start + Duration::seconds(i64::from(secs))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_filename_swaps_last_segment() {
        assert_eq!(
            replace_filename("storage/www/record/live/cam/.a.mp4", "a.mp4"),
            "storage/www/record/live/cam/a.mp4"
        );
        assert_eq!(replace_filename("a.mp4", "b.mp4"), "b.mp4");
    }

    #[test]
    fn close_time_needs_both_signals() {
        let start = Utc.timestamp_opt(1_754_822_000, 0).single();
        assert!(close_time(start, None).is_none());
        assert!(close_time(None, Some(1800)).is_none());
        let end = close_time(start, Some(1800)).unwrap();
        assert_eq!(end.timestamp(), 1_754_822_000 + 1800);
    }

    #[test]
    fn ack_serializes_with_zero_code() {
        let ack = HookAck::applied(HookAction::Updated);
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["action"], "updated");
    }

    #[test]
    fn hook_payload_tolerates_missing_optionals() {
        let raw = r#"{
            "file_path": "/opt/media/bin/www/record/live/cam/2025-08-10/x.mp4",
            "file_name": "x.mp4",
            "stream": "3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d"
        }"#;
        let hook: RecordMp4Hook = serde_json::from_str(raw).unwrap();
        assert_eq!(hook.file_size, None);
        assert_eq!(hook.time_len, None);
        assert_eq!(hook.start_time, None);
    }
}
