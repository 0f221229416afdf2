//! `POST /webhook` — submit a build request.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::server::app::AppState;
use crate::store::{BuildStatus, JobMode, NewJob};

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_prd_path")]
    pub prd_path: String,
    #[serde(default)]
    pub mode: JobMode,
    pub metadata: Option<serde_json::Value>,
    pub callback_url: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_prd_path() -> String {
    "docs/PRD.md".to_string()
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub job_id: uuid::Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deduplicated: bool,
}

pub async fn webhook_handler(
    State(state): State<AppState>,
    Json(body): Json<WebhookRequest>,
) -> Result<(axum::http::StatusCode, Json<WebhookResponse>)> {
    validate(&body)?;

    if let Some(existing) = state.store.find_active_job(&body.repo_url, &body.branch).await? {
        return Ok((
            axum::http::StatusCode::OK,
            Json(WebhookResponse {
                job_id: existing.id,
                status: status_str(existing.status).to_string(),
                deduplicated: true,
            }),
        ));
    }

    let job = state
        .store
        .create_job(NewJob {
            repo_url: body.repo_url,
            branch: body.branch,
            prd_path: body.prd_path,
            mode: body.mode,
            metadata: body.metadata,
            callback_url: body.callback_url,
        })
        .await?;

    let notifier = state.notifier.clone();
    let job_id = job.id;
    tokio::spawn(async move {
        notifier.send_build_event(job_id, BuildStatus::Queued, "Build queued").await;
    });

    Ok((
        axum::http::StatusCode::CREATED,
        Json(WebhookResponse { job_id: job.id, status: "pending".to_string(), deduplicated: false }),
    ))
}

fn status_str(status: crate::store::JobStatus) -> &'static str {
    use crate::store::JobStatus::*;
    match status {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

fn validate(body: &WebhookRequest) -> Result<()> {
    if body.repo_url.trim().is_empty() {
        return Err(OrchestratorError::Validation("repo_url must not be empty".into()));
    }
    if !is_github_url(&body.repo_url) {
        return Err(OrchestratorError::Validation("repo_url must be a GitHub URL".into()));
    }
    if body.branch.trim().is_empty() {
        return Err(OrchestratorError::Validation("branch must not be empty".into()));
    }
    if body.prd_path.trim().is_empty() {
        return Err(OrchestratorError::Validation("prd_path must not be empty".into()));
    }
    Ok(())
}

fn is_github_url(repo_url: &str) -> bool {
    repo_url.starts_with("https://github.com/") || repo_url.starts_with("git@github.com:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> WebhookRequest {
        WebhookRequest {
            repo_url: "https://github.com/x/y".into(),
            branch: default_branch(),
            prd_path: default_prd_path(),
            mode: JobMode::FullBuild,
            metadata: None,
            callback_url: None,
        }
    }

    #[test]
    fn accepts_valid_github_url() {
        assert!(validate(&sample_request()).is_ok());
    }

    #[test]
    fn rejects_empty_repo_url() {
        let mut req = sample_request();
        req.repo_url = "".into();
        assert!(validate(&req).is_err());
    }

    #[test]
    fn rejects_non_github_url() {
        let mut req = sample_request();
        req.repo_url = "https://gitlab.com/x/y".into();
        assert!(validate(&req).is_err());
    }

    #[test]
    fn rejects_empty_branch() {
        let mut req = sample_request();
        req.branch = "".into();
        assert!(validate(&req).is_err());
    }

    #[test]
    fn defaults_are_main_and_docs_prd() {
        assert_eq!(default_branch(), "main");
        assert_eq!(default_prd_path(), "docs/PRD.md");
    }

    #[test]
    fn ssh_style_github_url_is_accepted() {
        assert!(is_github_url("git@github.com:x/y.git"));
    }
}
