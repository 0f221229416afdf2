//! Integration tests against a real Postgres, spun up via `testcontainers-modules`.
//! Mirrors the teacher's own preference for exercising SQL-backed stores against
//! a real database instead of mocking it.

use orchestrator_core::store::{Fact, JobMode, JobStatus, NewJob, PostgresStore, Store};
use sqlx::postgres::PgPoolOptions;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn test_store() -> (PostgresStore, ContainerAsync<Postgres>) {
    let container = Postgres::default().start().await.expect("start postgres container");
    let host = container.get_host().await.expect("container host");
    let port = container.get_host_port_ipv4(5432).await.expect("mapped port");
    let url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database");

    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");

    (PostgresStore::new(pool), container)
}

fn sample_new_job() -> NewJob {
    NewJob {
        repo_url: "https://github.com/acme/widgets".into(),
        branch: "main".into(),
        prd_path: "docs/PRD.md".into(),
        mode: JobMode::FullBuild,
        metadata: None,
        callback_url: None,
    }
}

#[tokio::test]
async fn create_and_fetch_round_trips() {
    let (store, _container) = test_store().await;

    let job = store.create_job(sample_new_job()).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.build_status, orchestrator_core::store::BuildStatus::Queued);

    let fetched = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, job.id);
    assert_eq!(fetched.repo_url, "https://github.com/acme/widgets");
}

/// Invariant 1: a second submission for the same (repo_url, branch) while a job
/// is still active finds the existing job rather than creating a new one.
#[tokio::test]
async fn dedup_finds_active_job_for_same_repo_and_branch() {
    let (store, _container) = test_store().await;

    let first = store.create_job(sample_new_job()).await.unwrap();
    let found = store
        .find_active_job("https://github.com/acme/widgets", "main")
        .await
        .unwrap()
        .expect("active job should be found");
    assert_eq!(found.id, first.id);

    store.set_status(first.id, JobStatus::Running).await.unwrap();
    store.set_status(first.id, JobStatus::Completed).await.unwrap();

    let after_completion = store
        .find_active_job("https://github.com/acme/widgets", "main")
        .await
        .unwrap();
    assert!(after_completion.is_none(), "completed jobs fall outside the dedup window");
}

/// Invariant 2 / S4: under concurrent claim attempts, each pending job is
/// claimed by exactly one caller — no job is ever returned twice.
#[tokio::test]
async fn claim_next_pending_is_race_free_under_concurrency() {
    let (store, _container) = test_store().await;
    let store = std::sync::Arc::new(store);

    for _ in 0..10 {
        store.create_job(sample_new_job()).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.claim_next_pending().await.unwrap() }));
    }

    let mut claimed_ids = std::collections::HashSet::new();
    let mut claimed_count = 0;
    for handle in handles {
        if let Some(job) = handle.await.unwrap() {
            assert!(claimed_ids.insert(job.id), "job {} claimed more than once", job.id);
            assert_eq!(job.status, JobStatus::Running);
            claimed_count += 1;
        }
    }

    assert_eq!(claimed_count, 10, "exactly the 10 pending jobs should be claimed, no more");
    assert_eq!(store.count_running().await.unwrap(), 10);
}

/// Invariant 3: status never leaves a terminal state once reached.
#[tokio::test]
async fn set_status_is_a_no_op_once_terminal() {
    let (store, _container) = test_store().await;

    let job = store.create_job(sample_new_job()).await.unwrap();
    store.set_status(job.id, JobStatus::Completed).await.unwrap();
    store.set_status(job.id, JobStatus::Failed).await.unwrap();

    let fetched = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, JobStatus::Completed, "terminal state must not be overwritten");
}

/// Invariant 4: events for a job come back in non-decreasing created_at order.
#[tokio::test]
async fn list_events_returns_insertion_order() {
    let (store, _container) = test_store().await;

    let job = store.create_job(sample_new_job()).await.unwrap();
    store.append_event(job.id, "worker_launched", None).await.unwrap();
    store.append_event(job.id, "repo_cloned", None).await.unwrap();
    store.append_event(job.id, "prd_parsed", None).await.unwrap();

    let events = store.list_events(job.id).await.unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(names, vec!["worker_launched", "repo_cloned", "prd_parsed"]);
}

/// appendEvent fails with NotFoundError rather than a bare storage error when
/// the job_id does not exist, since the foreign key rejects the insert.
#[tokio::test]
async fn append_event_for_missing_job_is_not_found() {
    let (store, _container) = test_store().await;

    let result = store.append_event(uuid::Uuid::new_v4(), "worker_launched", None).await;
    assert!(matches!(result, Err(orchestrator_core::error::OrchestratorError::NotFound(_))));
}

/// Invariant 5: updated_at advances on every event ingest, independent of status change.
#[tokio::test]
async fn bump_updated_at_advances_timestamp() {
    let (store, _container) = test_store().await;

    let job = store.create_job(sample_new_job()).await.unwrap();
    let before = job.updated_at;

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    store.bump_updated_at(job.id).await.unwrap();

    let after = store.get_job(job.id).await.unwrap().unwrap();
    assert!(after.updated_at > before);
}

/// S6: extracting facts from a `deployed` event detail populates the right columns.
#[tokio::test]
async fn extract_fact_sets_the_targeted_column() {
    let (store, _container) = test_store().await;

    let job = store.create_job(sample_new_job()).await.unwrap();
    store.extract_fact(job.id, Fact::LiveUrl, "https://preview.example").await.unwrap();
    store.extract_fact(job.id, Fact::DeploySiteId, "site-123").await.unwrap();
    store.extract_fact(job.id, Fact::DbProjectId, "proj-456").await.unwrap();

    let fetched = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.live_url.as_deref(), Some("https://preview.example"));
    assert_eq!(fetched.deploy_site_id.as_deref(), Some("site-123"));
    assert_eq!(fetched.db_project_id.as_deref(), Some("proj-456"));
}

/// Invariant 7: build_status/build_message are set by setBuildStatus directly,
/// independent of the orchestration status.
#[tokio::test]
async fn set_build_status_updates_status_and_message() {
    let (store, _container) = test_store().await;

    let job = store.create_job(sample_new_job()).await.unwrap();
    store
        .set_build_status(job.id, orchestrator_core::store::BuildStatus::Deployed, "Deployed successfully")
        .await
        .unwrap();

    let fetched = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.build_status, orchestrator_core::store::BuildStatus::Deployed);
    assert_eq!(fetched.build_message, "Deployed successfully");
}

/// Invariant 6 / S5: sweep_stale transitions only running jobs past the threshold.
#[tokio::test]
async fn sweep_stale_fails_jobs_past_threshold() {
    let (store, _container) = test_store().await;

    let stale = store.create_job(sample_new_job()).await.unwrap();
    store.claim_next_pending().await.unwrap();

    let mut fresh_new_job = sample_new_job();
    fresh_new_job.branch = "feature/other".into();
    let fresh = store.create_job(fresh_new_job).await.unwrap();
    store.claim_next_pending().await.unwrap();

    sqlx::query("UPDATE jobs SET updated_at = NOW() - INTERVAL '31 minutes' WHERE id = $1")
        .bind(stale.id)
        .execute(store.pool())
        .await
        .unwrap();

    let swept = store.sweep_stale(30).await.unwrap();
    assert_eq!(swept, 1);

    let stale_after = store.get_job(stale.id).await.unwrap().unwrap();
    assert_eq!(stale_after.status, JobStatus::Failed);

    let fresh_after = store.get_job(fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh_after.status, JobStatus::Running, "recent running job must survive the sweep");
}

#[tokio::test]
async fn ping_succeeds_against_a_healthy_database() {
    let (store, _container) = test_store().await;
    store.ping().await.unwrap();
}
