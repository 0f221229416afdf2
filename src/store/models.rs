//! Job and JobEvent models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "build_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    Queued,
    Cloning,
    Installing,
    Building,
    Testing,
    Deploying,
    Deployed,
    Completed,
    Error,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_mode", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum JobMode {
    #[default]
    FullBuild,
    DeployOnly,
    Auto,
}

/// One end-to-end build request tracked by the orchestrator.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub repo_url: String,
    pub branch: String,
    pub prd_path: String,
    pub mode: JobMode,

    pub status: JobStatus,
    pub build_status: BuildStatus,
    pub build_message: String,

    pub metadata: Option<serde_json::Value>,
    pub callback_url: Option<String>,

    pub worker_execution_id: Option<String>,

    pub pr_url: Option<String>,
    pub live_url: Option<String>,
    pub deploy_site_id: Option<String>,
    pub db_project_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters accepted by `Store::create_job`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub repo_url: String,
    pub branch: String,
    pub prd_path: String,
    pub mode: JobMode,
    pub metadata: Option<serde_json::Value>,
    pub callback_url: Option<String>,
}

/// An append-only log record reported by the worker (or synthesized by the orchestrator).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobEvent {
    pub id: Uuid,
    pub job_id: Uuid,
    pub event: String,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Typed setter target for `Store::extract_fact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fact {
    PrUrl,
    LiveUrl,
    DeploySiteId,
    DbProjectId,
}

impl Fact {
    pub fn column(&self) -> &'static str {
        match self {
            Fact::PrUrl => "pr_url",
            Fact::LiveUrl => "live_url",
            Fact::DeploySiteId => "deploy_site_id",
            Fact::DbProjectId => "db_project_id",
        }
    }
}
