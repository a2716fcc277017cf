//! Reconciliation sweep as a background task.
//!
//! Spawns the sweep loop next to the HTTP server so the webhook fast
//! path and the timer-driven safety net run in one process, sharing the
//! pool and shutting down together. Runs until `cancel` is triggered.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use camvault_db::DbPool;
use camvault_recorder::RecorderApi;
use camvault_sweep::{SweepConfig, SweepStatus, Sweeper};

/// Spawn the sweep loop. Returns the task handle and the status channel
/// the `/reconciliation/status` route reads from.
pub fn spawn(
    pool: DbPool,
    recorder: RecorderApi,
    config: SweepConfig,
    cancel: CancellationToken,
) -> (JoinHandle<()>, watch::Receiver<SweepStatus>) {
    let (sweeper, status_rx) = Sweeper::new(pool, recorder, config);
    let handle = tokio::spawn(sweeper.run(cancel));
    (handle, status_rx)
}
