//! REST API client for the recorder control endpoints.
//!
//! The recorder answers every call with a `{code, msg, ...}` envelope
//! where `code == 0` means success. Start-when-already-started and
//! stop-when-already-stopped come back as `code == 0, result == false`
//! and are success from the caller's perspective.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Transport errors are retried once after this pause.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Connection settings for the recorder control API.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// Base control URL, e.g. `http://host:8000/index/api`.
    pub api_url: String,
    /// Shared secret sent with every call.
    pub secret: String,
    /// Application name streams are published under.
    pub app: String,
    /// Per-call timeout in seconds. Seconds, not tens of seconds: a
    /// stuck control plane must not stall a sweep cycle.
    pub timeout_secs: u64,
    /// Segment length passed to `startRecord`, in seconds.
    pub segment_secs: u32,
}

/// An active media stream reported by the recorder.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaStream {
    pub app: String,
    pub stream: String,
    /// Seconds this stream has been alive.
    #[serde(rename = "aliveSecond", default)]
    pub alive_secs: Option<i64>,
    #[serde(rename = "readerCount", default)]
    pub reader_count: Option<i64>,
}

/// What the recorder knows about a camera's in-progress segment.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    pub stream: String,
    /// Seconds the owning stream has been alive, when reported.
    pub alive_secs: Option<i64>,
}

/// Errors from the recorder control API layer.
#[derive(Debug, thiserror::Error)]
pub enum RecorderApiError {
    /// The HTTP request itself failed (network, DNS, timeout), after
    /// the one allowed retry.
    #[error("recorder request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The recorder returned a non-2xx status code.
    #[error("recorder HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    /// The recorder answered with a non-zero envelope code.
    #[error("recorder API error (code {code}): {msg}")]
    Api { code: i32, msg: String },
}

/// `{code, msg, data, result}` response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i32,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    result: Option<bool>,
}

/// `isRecording` has its own flat reply shape.
#[derive(Debug, Deserialize)]
struct RecordStatusReply {
    code: i32,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    status: Option<bool>,
}

/// HTTP client for the recorder control API.
pub struct RecorderApi {
    client: reqwest::Client,
    settings: RecorderSettings,
}

impl RecorderApi {
    /// Create a new control client. The per-call timeout is baked into
    /// the underlying [`reqwest::Client`].
    pub fn new(settings: RecorderSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_else(|e| panic!("Failed to build recorder HTTP client: {e}"));
        Self { client, settings }
    }

    /// Ask the recorder to start segment recording for a stream.
    ///
    /// Already-recording is success (`result: false` in the envelope).
    pub async fn start_recording(&self, stream: &str) -> Result<(), RecorderApiError> {
        let max_second = self.settings.segment_secs.to_string();
        let envelope: Envelope<serde_json::Value> = self
            .call(
                "startRecord",
                &[
                    ("type", "1"),
                    ("vhost", "__defaultVhost__"),
                    ("app", &self.settings.app),
                    ("stream", stream),
                    ("max_second", &max_second),
                ],
            )
            .await?;
        Self::expect_ok(envelope, "startRecord", stream)
    }

    /// Ask the recorder to stop segment recording for a stream.
    ///
    /// Already-stopped is success (`result: false` in the envelope).
    pub async fn stop_recording(&self, stream: &str) -> Result<(), RecorderApiError> {
        let envelope: Envelope<serde_json::Value> = self
            .call(
                "stopRecord",
                &[
                    ("type", "1"),
                    ("vhost", "__defaultVhost__"),
                    ("app", &self.settings.app),
                    ("stream", stream),
                ],
            )
            .await?;
        Self::expect_ok(envelope, "stopRecord", stream)
    }

    /// List the streams the recorder currently has live.
    pub async fn list_active_media(&self) -> Result<Vec<MediaStream>, RecorderApiError> {
        let envelope: Envelope<Vec<MediaStream>> = self
            .call("getMediaList", &[("app", &self.settings.app)])
            .await?;
        if envelope.code != 0 {
            return Err(RecorderApiError::Api {
                code: envelope.code,
                msg: envelope.msg.unwrap_or_default(),
            });
        }
        Ok(envelope.data.unwrap_or_default())
    }

    /// Fetch what the recorder knows about a camera's current segment,
    /// or `None` when it is not recording that stream.
    pub async fn current_segment_info(
        &self,
        stream: &str,
    ) -> Result<Option<SegmentInfo>, RecorderApiError> {
        let reply: RecordStatusReply = self
            .call(
                "isRecording",
                &[
                    ("type", "1"),
                    ("vhost", "__defaultVhost__"),
                    ("app", &self.settings.app),
                    ("stream", stream),
                ],
            )
            .await?;

        if reply.code != 0 {
            return Err(RecorderApiError::Api {
                code: reply.code,
                msg: reply.msg.unwrap_or_default(),
            });
        }
        if reply.status != Some(true) {
            return Ok(None);
        }

        let alive_secs = self
            .list_active_media()
            .await?
            .into_iter()
            .find(|m| m.stream == stream)
            .and_then(|m| m.alive_secs);

        Ok(Some(SegmentInfo {
            stream: stream.to_string(),
            alive_secs,
        }))
    }

    // ---- private helpers ----

    /// Issue one GET with the shared secret, retrying once on transport
    /// errors, and parse the JSON reply.
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RecorderApiError> {
        let url = format!("{}/{}", self.settings.api_url, endpoint);
        let mut attempt = 0u8;

        loop {
            attempt += 1;
            let request = self
                .client
                .get(&url)
                .query(&[("secret", self.settings.secret.as_str())])
                .query(params);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "<unreadable body>".to_string());
                        return Err(RecorderApiError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    return Ok(response.json::<T>().await?);
                }
                Err(err) if attempt == 1 && (err.is_timeout() || err.is_connect()) => {
                    tracing::warn!(endpoint, error = %err, "Recorder call failed, retrying once");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Map an envelope to success/failure for state-change calls.
    fn expect_ok(
        envelope: Envelope<serde_json::Value>,
        endpoint: &str,
        stream: &str,
    ) -> Result<(), RecorderApiError> {
        if envelope.code != 0 {
            return Err(RecorderApiError::Api {
                code: envelope.code,
                msg: envelope.msg.unwrap_or_default(),
            });
        }
        if envelope.result == Some(false) {
            tracing::debug!(endpoint, stream, "Recorder already in requested state");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_data_parses() {
        let raw = r#"{"code":0,"data":[{"app":"live","stream":"cam-1","aliveSecond":120,"readerCount":2}]}"#;
        let envelope: Envelope<Vec<MediaStream>> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.code, 0);
        let media = envelope.data.unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].stream, "cam-1");
        assert_eq!(media[0].alive_secs, Some(120));
    }

    #[test]
    fn envelope_without_optional_fields_parses() {
        let raw = r#"{"code":-500,"msg":"bad secret"}"#;
        let envelope: Envelope<Vec<MediaStream>> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.code, -500);
        assert_eq!(envelope.msg.as_deref(), Some("bad secret"));
        assert!(envelope.data.is_none());
    }

    #[test]
    fn already_in_state_is_success() {
        let raw = r#"{"code":0,"result":false}"#;
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert!(RecorderApi::expect_ok(envelope, "stopRecord", "cam-1").is_ok());
    }

    #[test]
    fn non_zero_code_is_api_error() {
        let raw = r#"{"code":-1,"msg":"stream not found"}"#;
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(raw).unwrap();
        let err = RecorderApi::expect_ok(envelope, "startRecord", "cam-1").unwrap_err();
        assert!(matches!(err, RecorderApiError::Api { code: -1, .. }));
    }

    #[test]
    fn record_status_reply_parses() {
        let reply: RecordStatusReply = serde_json::from_str(r#"{"code":0,"status":true}"#).unwrap();
        assert_eq!(reply.status, Some(true));

        let reply: RecordStatusReply = serde_json::from_str(r#"{"code":0}"#).unwrap();
        assert_eq!(reply.status, None);
    }
}
