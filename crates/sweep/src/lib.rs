//! Reconciliation sweep: the timer-driven safety net that converges
//! physical storage, recorder control state, and the metadata store.
//!
//! A single loop task owns the whole sweep, so cycles can never overlap;
//! ticks missed while a slow cycle runs are skipped, not queued. All
//! mutations go through `camvault-db`'s conditional updates, so the
//! sweep can race the webhook path safely.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use camvault_core::types::Timestamp;
use camvault_recorder::RecorderApi;

pub mod cycle;
pub mod scanner;

pub use cycle::CycleStats;

/// Tuning for the sweep, built once at process start.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// On-disk directory corresponding to the canonical storage root.
    pub storage_root: PathBuf,
    /// Seconds between cycles.
    pub interval_secs: u64,
    /// How far back the scanner and orphan queries look, in seconds.
    pub lookback_secs: i64,
    /// Minimum age before the sweep may force-close an open row.
    pub grace_period_secs: i64,
    /// Age after which a pathless open row is failed.
    pub orphan_ttl_secs: i64,
    /// Configured maximum segment length, for duration bounds.
    pub max_segment_secs: u32,
    /// Completed rows re-statted per cycle.
    pub refresh_batch: i64,
}

/// Outcome of the most recent cycle, for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub finished_at: Timestamp,
    pub duration_ms: u64,
    pub stats: CycleStats,
}

/// Published sweep liveness snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStatus {
    pub cycles_completed: u64,
    pub last_cycle: Option<CycleOutcome>,
}

/// Owns the sweep loop and its status channel.
pub struct Sweeper {
    pool: PgPool,
    recorder: RecorderApi,
    config: SweepConfig,
    status_tx: watch::Sender<SweepStatus>,
}

impl Sweeper {
    /// Build a sweeper plus the receiver half of its status channel.
    pub fn new(
        pool: PgPool,
        recorder: RecorderApi,
        config: SweepConfig,
    ) -> (Self, watch::Receiver<SweepStatus>) {
        let (status_tx, status_rx) = watch::channel(SweepStatus::default());
        (
            Self {
                pool,
                recorder,
                config,
                status_tx,
            },
            status_rx,
        )
    }

    /// Run cycles until `cancel` is triggered. A cancel arriving
    /// mid-cycle finishes the current row-level operation, publishes the
    /// partial stats, and stops.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            lookback_secs = self.config.lookback_secs,
            grace_period_secs = self.config.grace_period_secs,
            storage_root = %self.config.storage_root.display(),
            "Reconciliation sweep started"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        // Coalesce: a cycle slower than the interval swallows the missed
        // ticks instead of queuing extra cycles.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reconciliation sweep stopping");
                    break;
                }
                _ = interval.tick() => {
                    let started = std::time::Instant::now();
                    let stats =
                        cycle::run_cycle(&self.pool, &self.recorder, &self.config, &cancel).await;
                    let duration_ms = started.elapsed().as_millis() as u64;

                    tracing::info!(
                        files_scanned = stats.files_scanned,
                        orphans_found = stats.orphans_found,
                        links_made = stats.links_made,
                        sweep_created = stats.sweep_created,
                        duplicates_resolved = stats.duplicates_resolved,
                        rows_expired = stats.rows_expired,
                        errors = stats.errors,
                        duration_ms,
                        "Reconciliation cycle finished"
                    );

                    self.status_tx.send_modify(|status| {
                        status.cycles_completed += 1;
                        status.last_cycle = Some(CycleOutcome {
                            finished_at: chrono::Utc::now(),
                            duration_ms,
                            stats: stats.clone(),
                        });
                    });

                    if cancel.is_cancelled() {
                        tracing::info!("Reconciliation sweep stopping");
                        break;
                    }
                }
            }
        }
    }
}
