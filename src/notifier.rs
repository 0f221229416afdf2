//! Maps internal events to normalized build-status payloads and fans them out
//! to the downstream notifier endpoint.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::store::{BuildStatus, Store};

/// `(build_status, default_message)` for a canonical worker event. Events not in
/// this table are silently ignored by the notifier — they are still appended to
/// the job's event log by the ingress handler regardless.
fn mapping(event: &str) -> Option<(BuildStatus, &'static str)> {
    use BuildStatus::*;
    Some(match event {
        "worker_launched" => (Queued, "Worker launched"),
        "worker_started" => (Queued, "Build starting..."),
        "repo_cloned" => (Cloning, "Repository cloned"),
        "prd_parsed" => (Building, "PRD parsed, planning build..."),
        "orchestrator_started" => (Building, "Building application..."),
        "orchestrator_complete" => (Building, "Build complete, preparing for deployment..."),
        "deploy_started" => (Deploying, "Starting deployment..."),
        "readiness_check" => (Deploying, "Checking deployment readiness..."),
        "readiness_passed" => (Deploying, "Deployment readiness check passed"),
        "readiness_fixing" => (Deploying, "Fixing build issues before deployment..."),
        "readiness_failed" => (Error, "Deployment readiness check failed"),
        "deploy_verifying" => (Deploying, "Verifying deployment..."),
        "deployed" => (Deployed, "Deployed successfully"),
        "completed" => (Deployed, "Build completed successfully"),
        "build_complete" => (Deployed, "Build completed successfully"),
        "pr_created" => (Building, "Pull request created"),
        "build_failed" => (Failed, "Build failed"),
        "failed" => (Failed, "Build failed"),
        "launch_failed" => (Error, "Failed to launch build worker"),
        _ => return None,
    })
}

#[derive(Debug, Serialize)]
struct BuildEventPayload {
    job_id: Uuid,
    status: BuildStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

pub struct Notifier {
    client: reqwest::Client,
    store: Arc<dyn Store>,
    notifier_url: Option<String>,
    notifier_bearer: Option<String>,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn Store>,
        notifier_url: Option<String>,
        notifier_bearer: Option<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client is built from static configuration and cannot fail");

        Self { client, store, notifier_url, notifier_bearer }
    }

    /// Looks up the event mapping; if present, records the derived build status
    /// on the job and posts a normalized payload downstream. Silently returns
    /// for events outside the canonical table. The downstream post is
    /// fire-and-forget: transport errors and non-2xx responses are logged, never
    /// surfaced to the caller.
    pub async fn forward(
        &self,
        job_id: Uuid,
        event: &str,
        detail: Option<&serde_json::Value>,
        metadata: Option<serde_json::Value>,
    ) {
        let Some((build_status, default_message)) = mapping(event) else {
            return;
        };

        let message = detail
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| default_message.to_string());

        if let Err(e) = self
            .store
            .set_build_status(job_id, build_status, &message)
            .await
        {
            tracing::error!(job_id = %job_id, error = %e, "failed to record build status");
        }

        self.post(BuildEventPayload { job_id, status: build_status, message, metadata })
            .await;
    }

    /// Direct fanout used right after job creation, bypassing the event-mapping
    /// lookup since there is no `JobEvent` yet.
    pub async fn send_build_event(&self, job_id: Uuid, status: BuildStatus, message: &str) {
        self.post(BuildEventPayload {
            job_id,
            status,
            message: message.to_string(),
            metadata: None,
        })
        .await;
    }

    async fn post(&self, payload: BuildEventPayload) {
        let Some(url) = &self.notifier_url else {
            return;
        };
        let endpoint = format!("{}/api/webhook/build-event", url.trim_end_matches('/'));

        let mut request = self.client.post(&endpoint).json(&payload);
        if let Some(bearer) = &self.notifier_bearer {
            request = request.bearer_auth(bearer);
        }

        match request.send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    job_id = %payload.job_id,
                    status = %response.status(),
                    "notifier endpoint returned a non-success status"
                );
            }
            Err(e) => {
                tracing::warn!(job_id = %payload.job_id, error = %e, "failed to reach notifier endpoint");
            }
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_covers_every_canonical_event() {
        let events = [
            "worker_launched",
            "worker_started",
            "repo_cloned",
            "prd_parsed",
            "orchestrator_started",
            "orchestrator_complete",
            "deploy_started",
            "readiness_check",
            "readiness_passed",
            "readiness_fixing",
            "readiness_failed",
            "deploy_verifying",
            "deployed",
            "completed",
            "build_complete",
            "pr_created",
            "build_failed",
            "failed",
            "launch_failed",
        ];
        for event in events {
            assert!(mapping(event).is_some(), "missing mapping for {event}");
        }
    }

    #[test]
    fn unknown_event_has_no_mapping() {
        assert!(mapping("some_unrecognized_event").is_none());
    }

    #[test]
    fn deployed_and_completed_both_map_to_deployed_status() {
        assert_eq!(mapping("deployed").unwrap().0, BuildStatus::Deployed);
        assert_eq!(mapping("completed").unwrap().0, BuildStatus::Deployed);
        assert_eq!(mapping("build_complete").unwrap().0, BuildStatus::Deployed);
    }

    #[test]
    fn failure_events_map_to_failed_or_error() {
        assert_eq!(mapping("failed").unwrap().0, BuildStatus::Failed);
        assert_eq!(mapping("build_failed").unwrap().0, BuildStatus::Failed);
        assert_eq!(mapping("launch_failed").unwrap().0, BuildStatus::Error);
        assert_eq!(mapping("readiness_failed").unwrap().0, BuildStatus::Error);
    }
}
