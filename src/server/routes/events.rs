//! `POST /jobs/:id/events` — worker callback that advances job state.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::server::app::AppState;
use crate::store::{Fact, JobStatus};

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub event: String,
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub ok: bool,
}

pub async fn events_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<EventRequest>,
) -> Result<(axum::http::StatusCode, Json<EventResponse>)> {
    if body.event.trim().is_empty() {
        return Err(OrchestratorError::Validation("event must not be empty".into()));
    }

    let job = state
        .store
        .get_job(job_id)
        .await?
        .ok_or_else(|| OrchestratorError::NotFound(format!("job {job_id} not found")))?;

    state.store.append_event(job_id, &body.event, body.detail.clone()).await?;
    state.store.bump_updated_at(job_id).await?;

    apply_event_effects(&state, job_id, &body.event, body.detail.as_ref()).await?;

    let notifier = state.notifier.clone();
    let event = body.event.clone();
    let detail = body.detail.clone();
    let metadata = job.metadata.clone();
    tokio::spawn(async move {
        notifier.forward(job_id, &event, detail.as_ref(), metadata).await;
    });

    if let Some(callback_url) = job.callback_url.clone() {
        let client = state.http_client.clone();
        let event = body.event.clone();
        let detail = body.detail.clone();
        tokio::spawn(async move {
            let payload = serde_json::json!({ "job_id": job_id, "event": event, "detail": detail });
            if let Err(e) = client.post(&callback_url).json(&payload).send().await {
                tracing::warn!(job_id = %job_id, error = %e, "failed to deliver per-job callback");
            }
        });
    }

    Ok((axum::http::StatusCode::CREATED, Json(EventResponse { ok: true })))
}

/// Per-event side effects on the job row: fact extraction and terminal status.
async fn apply_event_effects(
    state: &AppState,
    job_id: Uuid,
    event: &str,
    detail: Option<&serde_json::Value>,
) -> Result<()> {
    match event {
        "pr_created" => {
            if let Some(pr_url) = detail.and_then(|d| d.get("pr_url")).and_then(|v| v.as_str()) {
                state.store.extract_fact(job_id, Fact::PrUrl, pr_url).await?;
            }
        }
        "deployed" => {
            if let Some(live_url) = detail.and_then(|d| d.get("live_url")).and_then(|v| v.as_str()) {
                state.store.extract_fact(job_id, Fact::LiveUrl, live_url).await?;
            }
            if let Some(site_id) =
                detail.and_then(|d| d.get("netlify_site_id")).and_then(|v| v.as_str())
            {
                state.store.extract_fact(job_id, Fact::DeploySiteId, site_id).await?;
            }
            if let Some(project_id) =
                detail.and_then(|d| d.get("neon_project_id")).and_then(|v| v.as_str())
            {
                state.store.extract_fact(job_id, Fact::DbProjectId, project_id).await?;
            }
        }
        "failed" | "build_failed" => {
            state.store.set_status(job_id, JobStatus::Failed).await?;
        }
        "completed" | "build_complete" => {
            state.store.set_status(job_id, JobStatus::Completed).await?;
        }
        _ => {}
    }

    Ok(())
}
