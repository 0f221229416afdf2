//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub webhook_secret: String,
    pub orchestrator_url: String,

    pub worker_project_id: Option<String>,
    pub worker_region: Option<String>,
    pub worker_job_name: String,
    pub worker_runtime_token: Option<String>,

    pub poll_interval_ms: u64,
    pub max_concurrent_jobs: i64,
    pub stale_threshold_minutes: i64,
    pub recovery_interval_secs: u64,

    pub notifier_url: Option<String>,
    pub notifier_bearer: Option<String>,

    pub dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables, failing fast on anything required.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let dry_run = env_flag("DRY_RUN");

        let worker_project_id = env::var("WORKER_PROJECT_ID").ok();
        let worker_region = env::var("WORKER_REGION").ok();
        let worker_runtime_token = env::var("WORKER_RUNTIME_TOKEN").ok();

        if !dry_run
            && (worker_project_id.is_none()
                || worker_region.is_none()
                || worker_runtime_token.is_none())
        {
            anyhow::bail!(
                "WORKER_PROJECT_ID, WORKER_REGION, and WORKER_RUNTIME_TOKEN must be set unless DRY_RUN=true"
            );
        }

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            webhook_secret: env::var("WEBHOOK_SECRET").context("WEBHOOK_SECRET must be set")?,
            orchestrator_url: env::var("ORCHESTRATOR_URL")
                .context("ORCHESTRATOR_URL must be set")?,

            worker_project_id,
            worker_region,
            worker_job_name: env::var("WORKER_JOB_NAME")
                .unwrap_or_else(|_| "prd-worker".to_string()),
            worker_runtime_token,

            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("POLL_INTERVAL_MS must be a valid number")?,
            max_concurrent_jobs: env::var("MAX_CONCURRENT_JOBS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("MAX_CONCURRENT_JOBS must be a valid number")?,
            stale_threshold_minutes: env::var("STALE_THRESHOLD_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("STALE_THRESHOLD_MINUTES must be a valid number")?,
            recovery_interval_secs: env::var("RECOVERY_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("RECOVERY_INTERVAL_SECS must be a valid number")?,

            notifier_url: env::var("NOTIFIER_URL").ok(),
            notifier_bearer: env::var("NOTIFIER_BEARER").ok(),

            dry_run,
        })
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}
