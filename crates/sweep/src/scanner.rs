//! Bounded recursive scan of the segment storage tree.
//!
//! The scanner is read-only and runs while the media server is still
//! writing: files may vanish or change size mid-scan, directories may be
//! momentarily unreadable on a network mount. Both are skipped and
//! counted, never fatal.

use std::path::{Path, PathBuf};

use camvault_core::types::{DbId, Timestamp};
use camvault_core::{identity, paths, segments};

/// One candidate segment file found on disk.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Absolute on-disk path.
    pub abs_path: PathBuf,
    /// Canonical storage-relative path.
    pub storage_path: String,
    pub filename: String,
    pub size_bytes: i64,
    pub modified: Timestamp,
    /// Camera identity resolved from the path, when present.
    pub camera_id: Option<DbId>,
}

/// Outcome of one storage walk.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<ScannedFile>,
    /// Directories that could not be opened.
    pub dirs_skipped: u64,
    /// Files that failed to stat (vanished mid-scan, etc.).
    pub files_skipped: u64,
}

/// Walk `root` and return every segment file modified at or after
/// `cutoff`.
///
/// Only plain `.mp4` files count; temp-marker names are in-progress and
/// excluded. The walk is iterative so a deep tree cannot overflow the
/// stack.
pub async fn scan_recent_segments(root: &Path, cutoff: Timestamp) -> ScanReport {
    let mut report = ScanReport::default();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                report.dirs_skipped += 1;
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "Directory read aborted");
                    report.dirs_skipped += 1;
                    break;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(_) => {
                    report.files_skipped += 1;
                    continue;
                }
            };

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let filename = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !filename.ends_with(segments::SEGMENT_SUFFIX) || segments::is_temp_name(&filename)
            {
                continue;
            }

            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(_) => {
                    // Vanished between listing and stat: skip, not error.
                    report.files_skipped += 1;
                    continue;
                }
            };

            let modified: Timestamp = match meta.modified() {
                Ok(time) => time.into(),
                Err(_) => {
                    report.files_skipped += 1;
                    continue;
                }
            };
            if modified < cutoff {
                continue;
            }

            let storage_path = match path.strip_prefix(root) {
                Ok(rel) => paths::from_storage_relative(rel),
                Err(_) => continue,
            };

            report.files.push(ScannedFile {
                camera_id: identity::resolve_path(&storage_path),
                abs_path: path,
                storage_path,
                filename,
                size_bytes: meta.len() as i64,
                modified,
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const CAM: &str = "3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d";

    fn write_segment(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not really mp4 bytes").unwrap();
    }

    #[tokio::test]
    async fn finds_recent_segments_with_identity() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(dir.path(), &format!("{CAM}/2025-08-10/2025-08-10-11-11-33-0.mp4"));

        let cutoff = Utc::now() - Duration::hours(2);
        let report = scan_recent_segments(dir.path(), cutoff).await;

        assert_eq!(report.files.len(), 1);
        let file = &report.files[0];
        assert_eq!(file.filename, "2025-08-10-11-11-33-0.mp4");
        assert_eq!(file.camera_id.unwrap().to_string(), CAM);
        assert_eq!(
            file.storage_path,
            format!("storage/www/record/live/{CAM}/2025-08-10/2025-08-10-11-11-33-0.mp4")
        );
        assert_eq!(file.size_bytes, 20);
        assert_eq!(report.dirs_skipped, 0);
    }

    #[tokio::test]
    async fn cutoff_bounds_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(dir.path(), &format!("{CAM}/2025-08-10/2025-08-10-11-11-33-0.mp4"));

        // Every file in this tree was just written, so a future cutoff
        // must exclude all of them.
        let report = scan_recent_segments(dir.path(), Utc::now() + Duration::hours(1)).await;
        assert!(report.files.is_empty());
    }

    #[tokio::test]
    async fn skips_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(dir.path(), &format!("{CAM}/2025-08-10/.2025-08-10-11-41-33-0.mp4"));
        write_segment(dir.path(), &format!("{CAM}/2025-08-10/notes.txt"));
        write_segment(dir.path(), &format!("{CAM}/2025-08-10/2025-08-10-11-11-33-0.mp4"));

        let cutoff = Utc::now() - Duration::hours(2);
        let report = scan_recent_segments(dir.path(), cutoff).await;
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].filename, "2025-08-10-11-11-33-0.mp4");
    }

    #[tokio::test]
    async fn file_without_camera_folder_stays_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(dir.path(), "stray/2025-08-10-11-11-33-0.mp4");

        let cutoff = Utc::now() - Duration::hours(2);
        let report = scan_recent_segments(dir.path(), cutoff).await;
        assert_eq!(report.files.len(), 1);
        assert!(report.files[0].camera_id.is_none());
    }

    #[tokio::test]
    async fn missing_root_is_counted_not_fatal() {
        let report =
            scan_recent_segments(Path::new("/nonexistent/storage/root"), Utc::now()).await;
        assert!(report.files.is_empty());
        assert_eq!(report.dirs_skipped, 1);
    }
}
