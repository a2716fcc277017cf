//! Canonical storage path normalization.
//!
//! Segment files are observed under several raw spellings depending on
//! where they were seen: the media server reports container-absolute
//! paths, bind mounts add their own prefixes, Windows hosts contribute
//! drive letters and backslashes, and in-progress files carry a leading
//! temp marker on the filename. Every component that stores or compares
//! paths runs them through [`normalize`] first so one file has exactly
//! one spelling in the metadata store.
//!
//! `normalize` is idempotent: `normalize(normalize(p)).path == normalize(p).path`.

use std::path::{Path, PathBuf};

use crate::segments::SEGMENT_SUFFIX;

/// Storage-relative prefix every canonical segment path starts with.
pub const CANONICAL_ROOT: &str = "storage/www/record/live";

/// Leading character the media server gives files still being written.
pub const TEMP_MARKER: char = '.';

/// Known environment-absolute roots, mapped to their storage-relative
/// replacement. Order matters: longer prefixes first.
const ROOT_PREFIX_MAP: &[(&str, &str)] = &[
    ("/opt/media/bin/www/", "storage/www/"),
    ("/opt/media/www/", "storage/www/"),
    ("/opt/media/bin/", "storage/"),
    ("/opt/media/", "storage/"),
];

/// Result of path normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    /// The normalized path string.
    pub path: String,
    /// Whether the path is anchored at [`CANONICAL_ROOT`]. Non-canonical
    /// paths are best-effort only; callers must not auto-link on them.
    pub canonical: bool,
}

/// Normalize a raw path to its canonical storage-relative form.
///
/// Rules, applied in order:
/// 1. Replace a known environment-root prefix with its storage-relative
///    equivalent.
/// 2. Unify separators to `/`.
/// 3. Strip a single leading temp marker from the final segment, only
///    when the remainder is a plain segment filename.
/// 4. Anchor at the first segment-boundary occurrence of
///    [`CANONICAL_ROOT`], truncating anything before it. If the root
///    token is absent the path is returned unchanged with
///    `canonical = false`.
pub fn normalize(raw: &str) -> NormalizedPath {
    let mut path = raw.replace('\\', "/");

    for (env_root, replacement) in ROOT_PREFIX_MAP {
        if let Some(rest) = path.strip_prefix(env_root) {
            path = format!("{replacement}{rest}");
            break;
        }
    }

    path = strip_temp_marker(&path);

    match find_canonical_root(&path) {
        Some(0) => NormalizedPath {
            path,
            canonical: true,
        },
        Some(idx) => NormalizedPath {
            path: path[idx..].to_string(),
            canonical: true,
        },
        None => NormalizedPath {
            path,
            canonical: false,
        },
    }
}

/// Strip one leading temp marker from the final path segment.
///
/// The marker is removed only when the remainder is a non-empty segment
/// filename that does not itself start with the marker, which keeps the
/// operation idempotent. Intermediate directory segments are never
/// touched.
fn strip_temp_marker(path: &str) -> String {
    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    };

    let stripped = match name.strip_prefix(TEMP_MARKER) {
        Some(rest)
            if !rest.is_empty()
                && !rest.starts_with(TEMP_MARKER)
                && rest.ends_with(SEGMENT_SUFFIX) =>
        {
            rest
        }
        _ => return path.to_string(),
    };

    match dir {
        Some(dir) => format!("{dir}/{stripped}"),
        None => stripped.to_string(),
    }
}

/// Find the byte offset of the first occurrence of [`CANONICAL_ROOT`]
/// that sits on a path-segment boundary.
fn find_canonical_root(path: &str) -> Option<usize> {
    for (idx, _) in path.match_indices(CANONICAL_ROOT) {
        let before_ok = idx == 0 || path.as_bytes()[idx - 1] == b'/';
        let after = idx + CANONICAL_ROOT.len();
        let after_ok = after == path.len() || path.as_bytes()[after] == b'/';
        if before_ok && after_ok {
            return Some(idx);
        }
    }
    None
}

/// Resolve a canonical storage-relative path to an absolute filesystem
/// path under `storage_root` (the directory that corresponds to
/// [`CANONICAL_ROOT`] on disk).
///
/// Returns `None` for paths that are not anchored at the canonical root.
pub fn to_absolute(storage_path: &str, storage_root: &Path) -> Option<PathBuf> {
    let rest = storage_path.strip_prefix(CANONICAL_ROOT)?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() {
        return Some(storage_root.to_path_buf());
    }
    Some(storage_root.join(rest))
}

/// Build the canonical storage-relative path for a segment file observed
/// at `relative` below the storage root on disk.
pub fn from_storage_relative(relative: &Path) -> String {
    let rel = relative.to_string_lossy().replace('\\', "/");
    if rel.is_empty() {
        CANONICAL_ROOT.to_string()
    } else {
        format!("{CANONICAL_ROOT}/{rel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RAW_PATHS: &[&str] = &[
        "/opt/media/bin/www/record/live/3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d/2025-08-10/2025-08-10-11-11-33-0.mp4",
        "/opt/media/www/record/live/3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d/2025-08-10/.2025-08-10-11-41-33-0.mp4",
        "C:\\newcam\\storage\\www\\record\\live\\3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d\\2025-08-10\\2025-08-10-12-11-33-0.mp4",
        "storage/www/record/live/3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d/2025-08-10/2025-08-10-11-11-33-0.mp4",
        "/srv/exports/video-dump/segment-1.mp4",
        "2025-08-10-11-11-33-0.mp4",
    ];

    #[test]
    fn normalize_is_idempotent_on_sampled_paths() {
        for raw in SAMPLE_RAW_PATHS {
            let once = normalize(raw);
            let twice = normalize(&once.path);
            assert_eq!(once.path, twice.path, "not idempotent for {raw}");
            assert_eq!(once.canonical, twice.canonical);
        }
    }

    #[test]
    fn container_prefix_is_mapped() {
        let n = normalize("/opt/media/bin/www/record/live/cam/2025-08-10/a.mp4");
        assert!(n.canonical);
        assert_eq!(n.path, "storage/www/record/live/cam/2025-08-10/a.mp4");
    }

    #[test]
    fn shorter_container_prefix_is_mapped() {
        let n = normalize("/opt/media/www/record/live/cam/a.mp4");
        assert_eq!(n.path, "storage/www/record/live/cam/a.mp4");
        assert!(n.canonical);
    }

    #[test]
    fn windows_drive_and_backslashes() {
        let n = normalize("D:\\newcam\\storage\\www\\record\\live\\cam\\a.mp4");
        assert!(n.canonical);
        assert_eq!(n.path, "storage/www/record/live/cam/a.mp4");
    }

    #[test]
    fn temp_marker_stripped_from_filename_only() {
        let n = normalize("storage/www/record/live/cam/2025-08-10/.a.mp4");
        assert_eq!(n.path, "storage/www/record/live/cam/2025-08-10/a.mp4");
    }

    #[test]
    fn temp_marker_not_stripped_from_directories() {
        let n = normalize("storage/www/record/live/.hidden/a.mp4");
        assert_eq!(n.path, "storage/www/record/live/.hidden/a.mp4");
    }

    #[test]
    fn double_marker_left_alone() {
        // Stripping one marker here would break idempotence; a doubly
        // dotted name is not something the media server produces.
        let n = normalize("storage/www/record/live/cam/..a.mp4");
        assert_eq!(n.path, "storage/www/record/live/cam/..a.mp4");
    }

    #[test]
    fn marker_without_segment_suffix_left_alone() {
        let n = normalize("storage/www/record/live/cam/.gitkeep");
        assert_eq!(n.path, "storage/www/record/live/cam/.gitkeep");
    }

    #[test]
    fn embedded_root_is_truncated() {
        let n = normalize("/mnt/nfs/shared/storage/www/record/live/cam/a.mp4");
        assert!(n.canonical);
        assert_eq!(n.path, "storage/www/record/live/cam/a.mp4");
    }

    #[test]
    fn root_token_requires_segment_boundary() {
        let n = normalize("/mnt/mystorage/www/record/liveish/a.mp4");
        assert!(!n.canonical);
    }

    #[test]
    fn unknown_path_is_flagged_not_rewritten() {
        let n = normalize("/srv/exports/video-dump/segment-1.mp4");
        assert!(!n.canonical);
        assert_eq!(n.path, "/srv/exports/video-dump/segment-1.mp4");
    }

    #[test]
    fn to_absolute_round_trip() {
        let root = Path::new("/data/storage/www/record/live");
        let abs = to_absolute("storage/www/record/live/cam/2025-08-10/a.mp4", root).unwrap();
        assert_eq!(
            abs,
            Path::new("/data/storage/www/record/live/cam/2025-08-10/a.mp4")
        );
    }

    #[test]
    fn to_absolute_rejects_non_canonical() {
        let root = Path::new("/data/storage/www/record/live");
        assert!(to_absolute("/tmp/a.mp4", root).is_none());
    }

    #[test]
    fn from_storage_relative_builds_canonical_path() {
        let p = from_storage_relative(Path::new("cam/2025-08-10/a.mp4"));
        assert_eq!(p, "storage/www/record/live/cam/2025-08-10/a.mp4");
        assert!(normalize(&p).canonical);
    }
}
