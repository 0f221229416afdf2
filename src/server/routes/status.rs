//! `GET /jobs/:id/status` — unauthenticated status read for external pollers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::server::app::AppState;
use crate::store::{Job, JobEvent};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub job: Job,
    pub events: Vec<JobEvent>,
}

pub async fn status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<StatusResponse>> {
    let job = state
        .store
        .get_job(job_id)
        .await?
        .ok_or_else(|| OrchestratorError::NotFound(format!("job {job_id} not found")))?;

    let events = state.store.list_events(job_id).await?;

    Ok(Json(StatusResponse { job, events }))
}
