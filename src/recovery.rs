//! Periodic sweep: mark abandoned running jobs as failed.
//!
//! Compensates for the fact that worker launch is fire-and-forget and
//! terminal events may be lost. Runs on startup and every `interval`
//! thereafter. Deliberately emits no events and no notifier messages for
//! swept jobs — matches the observed behavior this was distilled from.

use std::sync::Arc;
use std::time::Duration;

use crate::store::Store;

pub struct Recovery {
    store: Arc<dyn Store>,
    stale_threshold_minutes: i64,
    interval: Duration,
}

impl Recovery {
    pub fn new(store: Arc<dyn Store>, stale_threshold_minutes: i64, interval: Duration) -> Self {
        Self { store, stale_threshold_minutes, interval }
    }

    /// Spawns the recovery loop as a detached task, running once immediately
    /// and then on the configured interval.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.sweep().await {
                    tracing::error!(error = %e, "recovery sweep failed");
                }
                tokio::time::sleep(self.interval).await;
            }
        })
    }

    pub async fn sweep(&self) -> anyhow::Result<()> {
        let count = self.store.sweep_stale(self.stale_threshold_minutes).await?;
        if count > 0 {
            tracing::warn!(count, threshold_minutes = self.stale_threshold_minutes, "swept stale running jobs");
        }
        Ok(())
    }
}
