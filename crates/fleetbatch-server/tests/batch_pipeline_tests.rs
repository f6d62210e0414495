//! End-to-end batch pipeline tests against a live PostgreSQL instance.
//!
//! Run with `cargo test -- --ignored` and a `DATABASE_URL` pointing at a
//! database the test user may create schemas in.

#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use fleetbatch_server::cache::ArtifactCache;
use fleetbatch_server::db::vehicles::{self, NewVehicle};
use fleetbatch_server::jobs::{
    Backoff, ExportPayload, ImportPayload, JobKind, JobQueue, JobStatus, RetryPolicy,
};
use fleetbatch_server::notify::{NotificationHub, Outcome};
use fleetbatch_server::worker::{self, export, import::parse_batch};

fn sample_vehicle(vin: &str, email: &str, age: i32) -> NewVehicle {
    NewVehicle {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        car_make: "Toyota".to_string(),
        car_model: "Corolla".to_string(),
        vin: vin.to_string(),
        manufactured_date: NaiveDate::from_ymd_opt(2015, 3, 10).unwrap(),
        age_of_vehicle: age,
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn import_batch_is_persisted_exactly_once(pool: PgPool) {
    let csv = "first_name,last_name,email,car_make,car_model,vin,manufactured_date\n\
               Ada,Lovelace,ada@example.com,Toyota,Corolla,VIN001,2015-03-10\n\
               Alan,Turing,alan@example.com,Honda,Civic,VIN002,2020-08-01\n";
    let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

    let batch = parse_batch(csv, today).unwrap();
    let written = vehicles::upsert_batch(&pool, &batch.records).await.unwrap();

    assert_eq!(written, 2);
    assert_eq!(vehicles::count(&pool).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn reimport_updates_in_place(pool: PgPool) {
    let original = sample_vehicle("VIN001", "ada@example.com", 10);
    vehicles::upsert_batch(&pool, &[original]).await.unwrap();

    let mut updated = sample_vehicle("VIN001", "ada@example.com", 10);
    updated.car_model = "Camry".to_string();
    vehicles::upsert_batch(&pool, &[updated]).await.unwrap();

    assert_eq!(vehicles::count(&pool).await.unwrap(), 1);
    let stored = vehicles::find_by_vin(&pool, "VIN001").await.unwrap().unwrap();
    assert_eq!(stored.car_model, "Camry");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn export_filter_is_strictly_greater(pool: PgPool) {
    let records = vec![
        sample_vehicle("VIN001", "a@example.com", 9),
        sample_vehicle("VIN002", "b@example.com", 10),
        sample_vehicle("VIN003", "c@example.com", 11),
        sample_vehicle("VIN004", "d@example.com", 25),
    ];
    vehicles::upsert_batch(&pool, &records).await.unwrap();

    let matches = vehicles::older_than(&pool, 10).await.unwrap();
    let vins: Vec<&str> = matches.iter().map(|v| v.vin.as_str()).collect();

    // age == 10 is excluded; only strictly older vehicles match.
    assert_eq!(vins, ["VIN003", "VIN004"]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn claimed_job_moves_to_active_with_one_attempt(pool: PgPool) {
    let queue = JobQueue::new(pool);
    let id = queue
        .enqueue(
            JobKind::Export,
            &ExportPayload { min_age: 10 },
            RetryPolicy::single_attempt(),
        )
        .await
        .unwrap();

    let job = queue.claim_next().await.unwrap().unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.kind, JobKind::Export);
    assert_eq!(job.attempts, 1);

    // Nothing else is runnable while the job is active.
    assert!(queue.claim_next().await.unwrap().is_none());

    queue.complete(id).await.unwrap();
    let record = queue.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, "succeeded");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn failed_attempts_requeue_until_exhausted(pool: PgPool) {
    let queue = JobQueue::new(pool);
    // Zero backoff keeps retries immediately claimable.
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff: Backoff::None,
    };
    let id = queue
        .enqueue(JobKind::Export, &ExportPayload { min_age: 5 }, policy)
        .await
        .unwrap();

    let job = queue.claim_next().await.unwrap().unwrap();
    let status = queue.fail(&job, "first failure").await.unwrap();
    assert_eq!(status, JobStatus::Queued);

    let job = queue.claim_next().await.unwrap().unwrap();
    assert_eq!(job.attempts, 2);
    let status = queue.fail(&job, "second failure").await.unwrap();
    assert_eq!(status, JobStatus::Failed);

    let record = queue.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, "failed");
    assert_eq!(record.last_error.as_deref(), Some("second failure"));
    assert!(queue.claim_next().await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn backoff_delays_the_retry(pool: PgPool) {
    let queue = JobQueue::new(pool);
    let policy = RetryPolicy::exponential(3, 3600);
    let id = queue
        .enqueue(JobKind::Export, &ExportPayload { min_age: 5 }, policy)
        .await
        .unwrap();

    let job = queue.claim_next().await.unwrap().unwrap();
    queue.fail(&job, "transient").await.unwrap();

    // Requeued an hour into the future, so not claimable now.
    assert!(queue.claim_next().await.unwrap().is_none());
    let record = queue.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, "queued");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn stale_active_jobs_are_reaped(pool: PgPool) {
    let queue = JobQueue::new(pool.clone());
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff: Backoff::None,
    };
    let id = queue
        .enqueue(JobKind::Export, &ExportPayload { min_age: 5 }, policy)
        .await
        .unwrap();

    let job = queue.claim_next().await.unwrap().unwrap();
    assert_eq!(job.id, id);

    // Simulate a worker that died an hour ago.
    sqlx::query("UPDATE jobs SET updated_at = NOW() - interval '1 hour' WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let outcome = queue.reap_stale(Duration::from_secs(600)).await.unwrap();
    assert_eq!(outcome.requeued, 1);
    assert!(outcome.failed.is_empty());

    let redelivered = queue.claim_next().await.unwrap().unwrap();
    assert_eq!(redelivered.id, id);
    assert_eq!(redelivered.attempts, 2);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn reaped_job_with_no_attempts_left_notifies_failure(pool: PgPool) {
    let queue = JobQueue::new(pool.clone());
    let hub = NotificationHub::new(8);
    let mut rx = hub.subscribe();

    let payload = ImportPayload {
        csv_data: "first_name,last_name,email,car_make,car_model,vin,manufactured_date\n"
            .to_string(),
        submitted_at: Utc::now(),
    };
    let id = queue
        .enqueue(JobKind::Import, &payload, RetryPolicy::single_attempt())
        .await
        .unwrap();

    // Last allowed attempt is in flight when the worker dies.
    let job = queue.claim_next().await.unwrap().unwrap();
    assert_eq!(job.attempts, 1);
    sqlx::query("UPDATE jobs SET updated_at = NOW() - interval '1 hour' WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let outcome = worker::reap_and_notify(&queue, &hub, Duration::from_secs(600))
        .await
        .unwrap();
    assert_eq!(outcome.requeued, 0);
    assert_eq!(outcome.failed, vec![(id, JobKind::Import)]);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.job_id, id);
    assert_eq!(event.outcome, Outcome::Failed);
    assert!(event.message.contains("worker timed out"));

    let record = queue.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, "failed");
    assert_eq!(record.last_error.as_deref(), Some("worker timed out"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn zero_match_export_succeeds_without_artifact(pool: PgPool) {
    let cache = ArtifactCache::new();
    let hub = NotificationHub::new(8);
    let mut rx = hub.subscribe();
    let job_id = Uuid::new_v4();

    let payload = serde_json::json!({ "min_age": 10 });
    export::run(&pool, &cache, &hub, job_id, &payload, Duration::from_secs(60))
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.outcome, Outcome::Success);
    assert_eq!(event.count, 0);
    assert!(event.download_url.is_none());
    assert_eq!(event.message, "No vehicles found older than 10 years.");

    // Nothing retrievable was produced.
    assert!(cache.get(job_id).await.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn matched_export_caches_artifact_and_links_download(pool: PgPool) {
    let records = vec![
        sample_vehicle("VIN001", "a@example.com", 9),
        sample_vehicle("VIN002", "b@example.com", 11),
        sample_vehicle("VIN003", "c@example.com", 25),
    ];
    vehicles::upsert_batch(&pool, &records).await.unwrap();

    let cache = ArtifactCache::new();
    let hub = NotificationHub::new(8);
    let mut rx = hub.subscribe();
    let job_id = Uuid::new_v4();

    let payload = serde_json::json!({ "min_age": 10 });
    export::run(&pool, &cache, &hub, job_id, &payload, Duration::from_secs(60))
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.outcome, Outcome::Success);
    assert_eq!(event.count, 2);
    assert_eq!(event.message, "Successfully exported 2 vehicle records.");
    assert_eq!(
        event.download_url.as_deref(),
        Some(format!("/batch/download/{}", job_id).as_str())
    );

    let artifact = cache.get(job_id).await.unwrap();
    let mut lines = artifact.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,first_name,last_name,email,car_make,car_model,vin,manufactured_date,age_of_vehicle"
    );
    assert_eq!(lines.count(), 2);
}
