//! Durable persistence: jobs, events, atomic claim, stale sweep.

pub mod models;
pub mod postgres;

pub use models::{BuildStatus, Fact, Job, JobEvent, JobMode, JobStatus, NewJob};
pub use postgres::PostgresStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Storage contract for the job queue. A single Postgres-backed implementation
/// (`PostgresStore`) is shipped; the trait exists so the dispatcher, recovery
/// loop, and ingress handlers can be exercised against a fake in tests.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_job(&self, params: NewJob) -> Result<Job>;
    async fn find_active_job(&self, repo_url: &str, branch: &str) -> Result<Option<Job>>;
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    /// Atomically claims the oldest pending job, transitioning it to `running`.
    async fn claim_next_pending(&self) -> Result<Option<Job>>;
    async fn count_running(&self) -> Result<i64>;

    async fn set_execution_id(&self, id: Uuid, execution_id: &str) -> Result<()>;
    /// No-ops if the job is already in a terminal state.
    async fn set_status(&self, id: Uuid, status: JobStatus) -> Result<()>;
    async fn bump_updated_at(&self, id: Uuid) -> Result<()>;

    async fn append_event(
        &self,
        job_id: Uuid,
        event: &str,
        detail: Option<serde_json::Value>,
    ) -> Result<JobEvent>;
    async fn list_events(&self, job_id: Uuid) -> Result<Vec<JobEvent>>;

    async fn extract_fact(&self, id: Uuid, fact: Fact, value: &str) -> Result<()>;
    async fn set_build_status(&self, id: Uuid, status: BuildStatus, message: &str) -> Result<()>;

    /// Transitions every stale `running` job to `failed`; returns the count transitioned.
    async fn sweep_stale(&self, threshold_minutes: i64) -> Result<u64>;

    /// Cheap liveness probe backing `GET /health`.
    async fn ping(&self) -> Result<()>;
}
