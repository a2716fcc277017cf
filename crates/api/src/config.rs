use std::path::PathBuf;

use camvault_recorder::RecorderSettings;
use camvault_sweep::SweepConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Tighter timeout for the recorder webhook route (default: `5`).
    /// The recorder retries on slow replies, so the handler must answer
    /// fast and lean on gateway idempotence instead of blocking.
    pub hook_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `HOOK_TIMEOUT_SECS`     | `5`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", 30),
            hook_timeout_secs: env_u64("HOOK_TIMEOUT_SECS", 5),
            shutdown_timeout_secs: env_u64("SHUTDOWN_TIMEOUT_SECS", 30),
        }
    }
}

/// Reconciliation engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// On-disk directory holding the canonical storage tree.
    pub storage_root: PathBuf,
    /// Seconds between sweep cycles (default: `60`).
    pub sweep_interval_secs: u64,
    /// Scanner/orphan lookback window in seconds (default: `7200`).
    pub scan_lookback_secs: i64,
    /// Minimum open-row age before the sweep force-closes it
    /// (default: `1800`).
    pub grace_period_secs: i64,
    /// Age after which a pathless open row is failed (default: `86400`).
    pub orphan_ttl_secs: i64,
    /// Configured segment length in seconds (default: `1800`).
    pub segment_secs: u32,
    /// Completed rows re-statted per cycle (default: `50`).
    pub refresh_batch: i64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                        |
    /// |----------------------|--------------------------------|
    /// | `STORAGE_ROOT`       | `storage/www/record/live`      |
    /// | `SWEEP_INTERVAL_SECS`| `60`                           |
    /// | `SCAN_LOOKBACK_SECS` | `7200`                         |
    /// | `GRACE_PERIOD_SECS`  | `1800`                         |
    /// | `ORPHAN_TTL_SECS`    | `86400`                        |
    /// | `SEGMENT_SECS`       | `1800`                         |
    /// | `REFRESH_BATCH`      | `50`                           |
    pub fn from_env() -> Self {
        let storage_root = std::env::var("STORAGE_ROOT")
            .unwrap_or_else(|_| "storage/www/record/live".into())
            .into();

        Self {
            storage_root,
            sweep_interval_secs: env_u64("SWEEP_INTERVAL_SECS", 60),
            scan_lookback_secs: env_i64("SCAN_LOOKBACK_SECS", 7200),
            grace_period_secs: env_i64("GRACE_PERIOD_SECS", 1800),
            orphan_ttl_secs: env_i64("ORPHAN_TTL_SECS", 86_400),
            segment_secs: env_u64("SEGMENT_SECS", 1800) as u32,
            refresh_batch: env_i64("REFRESH_BATCH", 50),
        }
    }

    /// The sweep's view of this configuration.
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            storage_root: self.storage_root.clone(),
            interval_secs: self.sweep_interval_secs,
            lookback_secs: self.scan_lookback_secs,
            grace_period_secs: self.grace_period_secs,
            orphan_ttl_secs: self.orphan_ttl_secs,
            max_segment_secs: self.segment_secs,
            refresh_batch: self.refresh_batch,
        }
    }
}

/// Build the recorder client settings from environment variables.
///
/// | Env Var                 | Default                           |
/// |-------------------------|-----------------------------------|
/// | `RECORDER_API_URL`      | `http://localhost:8000/index/api` |
/// | `RECORDER_SECRET`       | (required)                        |
/// | `RECORDER_APP`          | `live`                            |
/// | `RECORDER_TIMEOUT_SECS` | `5`                               |
pub fn recorder_settings_from_env(segment_secs: u32) -> RecorderSettings {
    RecorderSettings {
        api_url: std::env::var("RECORDER_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000/index/api".into()),
        secret: std::env::var("RECORDER_SECRET").expect("RECORDER_SECRET must be set"),
        app: std::env::var("RECORDER_APP").unwrap_or_else(|_| "live".into()),
        timeout_secs: env_u64("RECORDER_TIMEOUT_SECS", 5),
        segment_secs,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid i64"))
}
