//! Fire-and-forget handoff to the worker runtime; dry-run shim.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Config;
use crate::error::{OrchestratorError, Result};
use crate::store::Job;

/// Hands a job descriptor to the external worker runtime and returns an opaque
/// execution id without waiting for the worker to finish.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, job: &Job) -> Result<String>;
}

/// Launches jobs as executions of a Cloud Run job. Never awaits completion: the
/// `:run` call only has to wait for the runtime to *accept* the execution.
pub struct CloudRunLauncher {
    client: reqwest::Client,
    project_id: String,
    region: String,
    job_name: String,
    orchestrator_url: String,
    webhook_secret: String,
    runtime_token: String,
}

/// Returns synthetic execution ids without contacting any runtime.
pub struct DryRunLauncher;

impl CloudRunLauncher {
    pub fn new(config: &Config) -> Result<Self> {
        let project_id = config
            .worker_project_id
            .clone()
            .ok_or_else(|| OrchestratorError::Launch("WORKER_PROJECT_ID not configured".into()))?;
        let region = config
            .worker_region
            .clone()
            .ok_or_else(|| OrchestratorError::Launch("WORKER_REGION not configured".into()))?;
        let runtime_token = config
            .worker_runtime_token
            .clone()
            .ok_or_else(|| OrchestratorError::Launch("WORKER_RUNTIME_TOKEN not configured".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OrchestratorError::Launch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            project_id,
            region,
            job_name: config.worker_job_name.clone(),
            orchestrator_url: config.orchestrator_url.clone(),
            webhook_secret: config.webhook_secret.clone(),
            runtime_token,
        })
    }

    fn execution_url(&self) -> String {
        format!(
            "https://run.googleapis.com/v2/projects/{}/locations/{}/jobs/{}:run",
            self.project_id, self.region, self.job_name
        )
    }

    fn worker_env(&self, job: &Job) -> HashMap<&'static str, String> {
        let mut env = HashMap::new();
        env.insert("JOB_ID", job.id.to_string());
        env.insert("REPO_URL", job.repo_url.clone());
        env.insert("BRANCH", job.branch.clone());
        env.insert("PRD_PATH", job.prd_path.clone());
        env.insert("ORCHESTRATOR_URL", self.orchestrator_url.clone());
        env.insert("WEBHOOK_SECRET", self.webhook_secret.clone());
        env
    }
}

#[async_trait]
impl Launcher for CloudRunLauncher {
    async fn launch(&self, job: &Job) -> Result<String> {
        let env = self.worker_env(job);
        let container_overrides = json!({
            "overrides": {
                "containerOverrides": [{
                    "env": env.iter().map(|(name, value)| json!({"name": name, "value": value})).collect::<Vec<_>>()
                }]
            }
        });

        let response = self
            .client
            .post(self.execution_url())
            .bearer_auth(&self.runtime_token)
            .json(&container_overrides)
            .send()
            .await
            .map_err(|e| OrchestratorError::Launch(format!("failed to reach worker runtime: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::Launch(format!(
                "worker runtime rejected launch ({status}): {body}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Launch(format!("invalid runtime response: {e}")))?;

        let execution_id = body
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| OrchestratorError::Launch("runtime response missing execution name".into()))?;

        Ok(execution_id)
    }
}

#[async_trait]
impl Launcher for DryRunLauncher {
    async fn launch(&self, job: &Job) -> Result<String> {
        let execution_id = format!("dry-run-{}", short_id(job.id));
        tracing::info!(
            job_id = %job.id,
            execution_id = %execution_id,
            "dry-run: would launch worker"
        );
        Ok(execution_id)
    }
}

fn short_id(id: uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
