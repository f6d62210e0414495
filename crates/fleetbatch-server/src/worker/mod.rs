//! Batch worker pool
//!
//! A fixed number of tasks poll the job queue, run the matching processor and
//! record the outcome. An extra reaper task requeues jobs abandoned by a
//! crashed worker.

use sqlx::PgPool;
use std::time::Duration;

use crate::cache::ArtifactCache;
use crate::config::BatchConfig;
use crate::jobs::{ClaimedJob, JobKind, JobQueue, ReapOutcome};
use crate::notify::{JobNotification, NotificationHub};

pub mod export;
pub mod import;

/// Everything a worker needs to process jobs
#[derive(Clone)]
pub struct WorkerContext {
    pub db: PgPool,
    pub queue: JobQueue,
    pub cache: ArtifactCache,
    pub hub: NotificationHub,
    pub batch: BatchConfig,
}

/// Spawn the worker pool plus the stale-job reaper.
///
/// Returns the task handles; the tasks run until the process exits.
pub fn spawn_workers(ctx: WorkerContext) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::with_capacity(ctx.batch.worker_count + 1);

    for worker_id in 0..ctx.batch.worker_count {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            worker_loop(worker_id, ctx).await;
        }));
    }

    let reaper_ctx = ctx.clone();
    handles.push(tokio::spawn(async move {
        reaper_loop(reaper_ctx).await;
    }));

    tracing::info!(workers = ctx.batch.worker_count, "batch worker pool started");
    handles
}

async fn worker_loop(worker_id: usize, ctx: WorkerContext) {
    let poll_interval = Duration::from_secs(ctx.batch.poll_interval_secs.max(1));

    loop {
        match ctx.queue.claim_next().await {
            Ok(Some(job)) => {
                tracing::debug!(
                    worker_id,
                    job_id = %job.id,
                    kind = %job.kind,
                    attempt = job.attempts,
                    "claimed job"
                );
                run_job(&ctx, &job).await;
            }
            Ok(None) => {
                tokio::time::sleep(poll_interval).await;
            }
            Err(e) => {
                tracing::error!(worker_id, error = %e, "failed to poll job queue");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

/// Run one attempt and record the outcome on the queue.
async fn run_job(ctx: &WorkerContext, job: &ClaimedJob) {
    let outcome = match job.kind {
        JobKind::Import => import::run(&ctx.db, &ctx.hub, job.id, &job.payload).await,
        JobKind::Export => {
            export::run(
                &ctx.db,
                &ctx.cache,
                &ctx.hub,
                job.id,
                &job.payload,
                Duration::from_secs(ctx.batch.export_artifact_ttl_secs),
            )
            .await
        }
    };

    let bookkeeping = match outcome {
        Ok(()) => ctx.queue.complete(job.id).await,
        Err(e) => ctx.queue.fail(job, &e.to_string()).await.map(|_| ()),
    };

    if let Err(e) = bookkeeping {
        tracing::error!(job_id = %job.id, error = %e, "failed to record job outcome");
    }
}

/// Reap stale jobs and publish a failure for each one that had no attempts
/// left. Requeued jobs stay silent; they will report when they finish.
pub async fn reap_and_notify(
    queue: &JobQueue,
    hub: &NotificationHub,
    timeout: Duration,
) -> Result<ReapOutcome, sqlx::Error> {
    let outcome = queue.reap_stale(timeout).await?;

    for (job_id, kind) in &outcome.failed {
        let message = match kind {
            JobKind::Import => "Import failed: worker timed out. Data rolled back.".to_string(),
            JobKind::Export => "Export failed: worker timed out".to_string(),
        };
        hub.publish(JobNotification::failure(*kind, *job_id, message));
    }

    Ok(outcome)
}

async fn reaper_loop(ctx: WorkerContext) {
    let timeout = Duration::from_secs(ctx.batch.stale_job_timeout_secs.max(1));
    // Sweep at a fraction of the timeout so stale jobs do not wait a whole
    // extra period.
    let mut ticker = tokio::time::interval(timeout / 2);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = reap_and_notify(&ctx.queue, &ctx.hub, timeout).await {
            tracing::error!(error = %e, "failed to reap stale jobs");
        }
    }
}
