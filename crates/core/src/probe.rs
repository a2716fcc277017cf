//! FFprobe media duration probing.
//!
//! Thin wrapper around the `ffprobe` binary used as the duration
//! estimator's first signal. Probe failures are ordinary: the caller
//! falls back to the next signal.

use std::path::Path;

use serde::Deserialize;

/// Error type for ffprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("ffprobe binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

/// Top-level ffprobe JSON output (`-print_format json -show_format`).
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Run `ffprobe` on a segment file and return the container duration in
/// seconds, or `None` when the container carries no duration field.
pub async fn probe_duration_secs(path: &Path) -> Result<Option<f64>, ProbeError> {
    if !path.exists() {
        return Err(ProbeError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await
        .map_err(ProbeError::NotFound)?;

    if !output.status.success() {
        return Err(ProbeError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe stdout into a duration value.
fn parse_output(stdout: &str) -> Result<Option<f64>, ProbeError> {
    let parsed: FfprobeOutput =
        serde_json::from_str(stdout).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    match parsed.format.duration {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|e| ProbeError::ParseError(format!("bad duration {raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_field() {
        let stdout = r#"{"format": {"duration": "1799.933000", "size": "101155463"}}"#;
        let secs = parse_output(stdout).unwrap().unwrap();
        assert!((secs - 1799.933).abs() < 1e-6);
    }

    #[test]
    fn missing_duration_is_none() {
        let stdout = r#"{"format": {"format_name": "mov,mp4,m4a"}}"#;
        assert!(parse_output(stdout).unwrap().is_none());
    }

    #[test]
    fn malformed_output_is_parse_error() {
        assert!(matches!(
            parse_output("not json"),
            Err(ProbeError::ParseError(_))
        ));
        assert!(matches!(
            parse_output(r#"{"format": {"duration": "abc"}}"#),
            Err(ProbeError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_video_not_found() {
        let err = probe_duration_secs(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::VideoNotFound(_)));
    }
}
