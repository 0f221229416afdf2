//! PostgreSQL-backed implementation of `Store`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{BuildStatus, Fact, Job, JobEvent, JobStatus, NewJob};
use super::Store;
use crate::error::{OrchestratorError, Result};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const JOB_COLUMNS: &str = r#"
    id, repo_url, branch, prd_path, mode,
    status, build_status, build_message,
    metadata, callback_url, worker_execution_id,
    pr_url, live_url, deploy_site_id, db_project_id,
    created_at, updated_at
"#;

#[async_trait]
impl Store for PostgresStore {
    async fn create_job(&self, params: NewJob) -> Result<Job> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            INSERT INTO jobs (
                id, repo_url, branch, prd_path, mode,
                status, build_status, build_message,
                metadata, callback_url
            )
            VALUES (
                $1, $2, $3, $4, $5,
                'pending', 'queued', 'Build queued',
                $6, $7
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.repo_url)
        .bind(params.branch)
        .bind(params.prd_path)
        .bind(params.mode)
        .bind(params.metadata)
        .bind(params.callback_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    async fn find_active_job(&self, repo_url: &str, branch: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE repo_url = $1 AND branch = $2
              AND status IN ('pending', 'running')
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(repo_url)
        .bind(branch)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    /// `SELECT ... FOR UPDATE SKIP LOCKED` feeding an `UPDATE ... RETURNING` in a single
    /// round trip, so two dispatcher replicas racing on the same tick can never both
    /// claim the same pending job.
    async fn claim_next_pending(&self) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            WITH next_job AS (
                SELECT id
                FROM jobs
                WHERE status = 'pending'
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET status = 'running', updated_at = NOW()
            WHERE id IN (SELECT id FROM next_job)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn count_running(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = 'running'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn set_execution_id(&self, id: Uuid, execution_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET worker_execution_id = $1, updated_at = NOW()
            WHERE id = $2 AND worker_execution_id IS NULL
            "#,
        )
        .bind(execution_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: JobStatus) -> Result<()> {
        // The invariant in the data model forbids leaving a terminal state, so the
        // WHERE clause guards it here rather than trusting callers.
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn bump_updated_at(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE jobs SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn append_event(
        &self,
        job_id: Uuid,
        event: &str,
        detail: Option<serde_json::Value>,
    ) -> Result<JobEvent> {
        let event = sqlx::query_as::<_, JobEvent>(
            r#"
            INSERT INTO job_events (id, job_id, event, detail)
            VALUES ($1, $2, $3, $4)
            RETURNING id, job_id, event, detail, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(event)
        .bind(detail)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                OrchestratorError::NotFound(format!("job {job_id} not found"))
            }
            other => OrchestratorError::Storage(other),
        })?;

        Ok(event)
    }

    async fn list_events(&self, job_id: Uuid) -> Result<Vec<JobEvent>> {
        let events = sqlx::query_as::<_, JobEvent>(
            r#"
            SELECT id, job_id, event, detail, created_at
            FROM job_events
            WHERE job_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn extract_fact(&self, id: Uuid, fact: Fact, value: &str) -> Result<()> {
        let query = format!(
            "UPDATE jobs SET {} = $1, updated_at = NOW() WHERE id = $2",
            fact.column()
        );
        sqlx::query(&query).bind(value).bind(id).execute(&self.pool).await?;

        Ok(())
    }

    async fn set_build_status(&self, id: Uuid, status: BuildStatus, message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET build_status = $1, build_message = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status)
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn sweep_stale(&self, threshold_minutes: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', updated_at = NOW()
            WHERE status = 'running'
              AND updated_at < NOW() - ($1 || ' minutes')::INTERVAL
            "#,
        )
        .bind(threshold_minutes.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_columns_list_matches_model_field_count() {
        // 17 columns on Job; keep this in sync if the model grows a field.
        let count = JOB_COLUMNS
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .count();
        assert_eq!(count, 17);
    }
}
