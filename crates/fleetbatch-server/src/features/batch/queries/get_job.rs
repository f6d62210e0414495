//! Job status lookup

use uuid::Uuid;

use crate::jobs::{JobQueue, JobRecord};

pub async fn handle(queue: &JobQueue, job_id: Uuid) -> Result<Option<JobRecord>, sqlx::Error> {
    queue.get(job_id).await
}
