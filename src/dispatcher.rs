//! Periodic loop: concurrency gate -> claim -> launch -> record.
//!
//! Ticks never run concurrently within a single replica; concurrent replicas
//! are safe by virtue of the atomic claim in the store. Back-pressure comes
//! from loop cadence, not batch size — only one job is processed per tick.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::launcher::Launcher;
use crate::store::{JobStatus, Store};

pub struct Dispatcher {
    store: Arc<dyn Store>,
    launcher: Arc<dyn Launcher>,
    max_concurrent_jobs: i64,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        launcher: Arc<dyn Launcher>,
        max_concurrent_jobs: i64,
        poll_interval: Duration,
    ) -> Self {
        Self { store, launcher, max_concurrent_jobs, poll_interval }
    }

    /// Spawns the dispatcher loop as a detached task. Each tick runs in its own
    /// spawned task so a panic inside one tick is reported as a `JoinError`
    /// rather than unwinding the loop itself; both a returned error and a
    /// panic are caught and logged, so a transient store outage (or a bug in
    /// one tick) never silently stops future dispatch.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            loop {
                interval.tick().await;
                let this = self.clone();
                match tokio::spawn(async move { this.tick().await }).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "dispatcher tick failed"),
                    Err(join_err) => {
                        tracing::error!(error = %join_err, "dispatcher tick panicked")
                    }
                }
            }
        })
    }

    /// Runs a single dispatch attempt: check the concurrency cap, claim one
    /// pending job if capacity allows, and launch it.
    pub async fn tick(&self) -> anyhow::Result<()> {
        let running = self.store.count_running().await?;
        if running >= self.max_concurrent_jobs {
            return Ok(());
        }

        let Some(job) = self.store.claim_next_pending().await? else {
            return Ok(());
        };

        match self.launcher.launch(&job).await {
            Ok(execution_id) => {
                self.store.set_execution_id(job.id, &execution_id).await?;
                self.store
                    .append_event(
                        job.id,
                        "worker_launched",
                        Some(json!({ "execution_id": execution_id })),
                    )
                    .await?;
                tracing::info!(job_id = %job.id, execution_id = %execution_id, "launched worker");
            }
            Err(e) => {
                self.store.set_status(job.id, JobStatus::Failed).await?;
                self.store
                    .append_event(job.id, "launch_failed", Some(json!({ "error": e.to_string() })))
                    .await?;
                tracing::error!(job_id = %job.id, error = %e, "failed to launch worker");
            }
        }

        Ok(())
    }
}
