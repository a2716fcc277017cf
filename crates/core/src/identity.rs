//! Camera identity resolution from stream names and file paths.
//!
//! Cameras are identified by a 36-character hyphenated hexadecimal token
//! (a UUID). Stream names are either the token itself or the token with
//! an underscore suffix; storage paths contain the token as the camera
//! directory segment. When no token is present the input stays
//! unresolved — callers must never fabricate an identity.

use uuid::Uuid;

/// Length of a hyphenated identity token.
const TOKEN_LEN: usize = 36;

/// Positions of the hyphens inside a token.
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Parse a candidate string as an identity token.
///
/// Stricter than [`Uuid::parse_str`]: only the 36-character hyphenated
/// form counts, so simple/braced/urn spellings (which never appear in
/// stream names or paths) are rejected.
pub fn parse_token(candidate: &str) -> Option<Uuid> {
    if candidate.len() != TOKEN_LEN {
        return None;
    }
    for (idx, ch) in candidate.char_indices() {
        let expect_hyphen = HYPHEN_POSITIONS.contains(&idx);
        if expect_hyphen != (ch == '-') {
            return None;
        }
        if !expect_hyphen && !ch.is_ascii_hexdigit() {
            return None;
        }
    }
    Uuid::parse_str(candidate).ok()
}

/// Resolve a camera identity from a stream name.
///
/// Fast path: the stream name is the token, or the token followed by an
/// underscore-separated qualifier (`<uuid>_sub`).
pub fn resolve_stream(stream: &str) -> Option<Uuid> {
    if let Some(id) = parse_token(stream) {
        return Some(id);
    }
    stream.split('_').next().and_then(parse_token)
}

/// Resolve a camera identity from a filesystem path.
///
/// Scans path segments for identity tokens and returns the first match.
/// More than one distinct token in a single path is logged for
/// monitoring — the directory layout should never produce that — but
/// the first token still wins.
pub fn resolve_path(path: &str) -> Option<Uuid> {
    let unified = path.replace('\\', "/");
    let mut found: Option<Uuid> = None;

    for segment in unified.split('/') {
        if let Some(id) = parse_token(segment) {
            match found {
                None => found = Some(id),
                Some(first) if first != id => {
                    tracing::warn!(
                        path = %path,
                        first = %first,
                        other = %id,
                        "Ambiguous camera identity in path, keeping first token"
                    );
                }
                Some(_) => {}
            }
        }
    }

    found
}

/// Resolve a camera identity from a stream name and/or a path, stream
/// name first.
pub fn resolve(stream: Option<&str>, path: Option<&str>) -> Option<Uuid> {
    stream
        .and_then(resolve_stream)
        .or_else(|| path.and_then(resolve_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAM: &str = "3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d";

    #[test]
    fn token_round_trip() {
        assert_eq!(parse_token(CAM).unwrap().to_string(), CAM);
    }

    #[test]
    fn token_rejects_wrong_shapes() {
        assert!(parse_token("not-a-uuid").is_none());
        assert!(parse_token("3c9f2a7e8e114a6f9d215f0f3a1b2c4d").is_none());
        assert!(parse_token("{3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2c4d}").is_none());
        assert!(parse_token("3c9f2a7e-8e11-4a6f-9d21-5f0f3a1b2cZZ").is_none());
    }

    #[test]
    fn stream_name_is_token() {
        assert!(resolve_stream(CAM).is_some());
    }

    #[test]
    fn stream_name_with_qualifier() {
        assert!(resolve_stream(&format!("{CAM}_sub")).is_some());
        assert_eq!(resolve_stream(&format!("{CAM}_sub")).unwrap().to_string(), CAM);
    }

    #[test]
    fn stream_name_without_token_is_unresolved() {
        assert!(resolve_stream("front-door").is_none());
        assert!(resolve_stream("").is_none());
    }

    #[test]
    fn path_segment_scan() {
        let path = format!("storage/www/record/live/{CAM}/2025-08-10/2025-08-10-11-11-33-0.mp4");
        assert_eq!(resolve_path(&path).unwrap().to_string(), CAM);
    }

    #[test]
    fn path_without_token_is_unresolved() {
        assert!(resolve_path("storage/www/record/live/misc/a.mp4").is_none());
    }

    #[test]
    fn ambiguous_path_keeps_first_token() {
        let other = "11111111-2222-4333-8444-555555555555";
        let path = format!("storage/www/record/live/{CAM}/{other}/a.mp4");
        assert_eq!(resolve_path(&path).unwrap().to_string(), CAM);
    }

    #[test]
    fn combined_prefers_stream() {
        let other = "11111111-2222-4333-8444-555555555555";
        let path = format!("storage/www/record/live/{other}/a.mp4");
        let resolved = resolve(Some(CAM), Some(&path)).unwrap();
        assert_eq!(resolved.to_string(), CAM);
    }

    #[test]
    fn combined_falls_back_to_path() {
        let path = format!("storage/www/record/live/{CAM}/a.mp4");
        let resolved = resolve(Some("front-door"), Some(&path)).unwrap();
        assert_eq!(resolved.to_string(), CAM);
    }
}
