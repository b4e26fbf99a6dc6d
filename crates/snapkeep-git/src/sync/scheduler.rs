//! Background snapshot scheduler.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::config::interval_from_minutes;
use crate::engine::SnapshotEngine;

/// Handle for a running timer task. Dropping it stops the task.
pub struct ScheduleHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ScheduleHandle {
    /// Signals the timer task to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Inner {
    interval_minutes: i64,
    enabled: bool,
    handle: Option<ScheduleHandle>,
}

/// Drives scheduled snapshots from a single repeating timer.
///
/// An interval of zero or less disables the timer; manual snapshots are
/// unaffected. Changing the interval stops the old timer before the new one
/// is spawned, so at most one timer exists at a time.
pub struct BackupScheduler {
    engine: Arc<SnapshotEngine>,
    inner: Mutex<Inner>,
}

impl BackupScheduler {
    /// Creates a stopped scheduler.
    pub fn new(engine: Arc<SnapshotEngine>, interval_minutes: i64) -> Self {
        Self {
            engine,
            inner: Mutex::new(Inner {
                interval_minutes,
                enabled: false,
                handle: None,
            }),
        }
    }

    /// Enables the timer. Does nothing while the interval is disabled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.enabled = true;
        self.respawn(&mut inner);
    }

    /// Stops the timer. A snapshot already running completes.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.enabled = false;
        if inner.handle.take().is_some() {
            info!("Snapshot scheduler stopped");
        }
    }

    /// Changes the interval, recreating the timer if the scheduler is started.
    pub fn set_interval(&self, minutes: i64) {
        let mut inner = self.inner.lock();
        inner.interval_minutes = minutes;
        if inner.enabled {
            self.respawn(&mut inner);
        }
    }

    /// Returns the interval in minutes.
    pub fn interval_minutes(&self) -> i64 {
        self.inner.lock().interval_minutes
    }

    /// Returns true if a timer task is active.
    pub fn is_running(&self) -> bool {
        self.inner.lock().handle.is_some()
    }

    fn respawn(&self, inner: &mut Inner) {
        // Stop the old timer before the new one exists.
        inner.handle = None;

        let Some(period) = interval_from_minutes(inner.interval_minutes) else {
            debug!(minutes = inner.interval_minutes, "Scheduling disabled");
            return;
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(Arc::clone(&self.engine), period, shutdown_rx));
        inner.handle = Some(ScheduleHandle { shutdown_tx });

        info!(minutes = inner.interval_minutes, "Snapshot scheduler started");
    }
}

impl std::fmt::Debug for BackupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BackupScheduler")
            .field("interval_minutes", &inner.interval_minutes)
            .field("enabled", &inner.enabled)
            .field("running", &inner.handle.is_some())
            .finish()
    }
}

/// Timer loop. The first tick fires one full period after start.
async fn run(engine: Arc<SnapshotEngine>, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                debug!("Scheduled snapshot tick");
                match engine.scheduled_snapshot().await {
                    Some(Ok(result)) => {
                        debug!(branch = %result.branch_name, "Scheduled snapshot done");
                    },
                    Some(Err(e)) => warn!(error = %e, "Scheduled snapshot failed"),
                    None => {},
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Snapshot timer shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_handle_stop() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = ScheduleHandle { shutdown_tx };

        assert!(!*shutdown_rx.borrow());
        drop(handle);
        assert!(*shutdown_rx.borrow());
    }
}
