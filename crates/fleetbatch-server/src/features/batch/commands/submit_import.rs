//! Submit import command
//!
//! Accepts an uploaded CSV file and queues an import job. Validation rejects
//! empty uploads before anything touches the queue.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BatchConfig;
use crate::jobs::{ImportPayload, JobKind, JobQueue, RetryPolicy};

/// Command to queue a CSV import
#[derive(Debug, Clone)]
pub struct SubmitImportCommand {
    /// Raw CSV text as uploaded
    pub csv_data: String,
}

/// Response returned once the job is queued
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitImportResponse {
    pub job_id: Uuid,
    pub message: String,
}

/// Errors that can occur when submitting an import
#[derive(Debug, thiserror::Error)]
pub enum SubmitImportError {
    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SubmitImportCommand {
    /// Validates the command parameters
    pub fn validate(&self) -> Result<(), SubmitImportError> {
        if self.csv_data.trim().is_empty() {
            return Err(SubmitImportError::EmptyFile);
        }
        Ok(())
    }
}

/// Handle the submit import command
pub async fn handle(
    queue: &JobQueue,
    batch: &BatchConfig,
    command: SubmitImportCommand,
) -> Result<SubmitImportResponse, SubmitImportError> {
    command.validate()?;

    let payload = ImportPayload {
        csv_data: command.csv_data,
        submitted_at: Utc::now(),
    };
    let policy = RetryPolicy::exponential(batch.import_max_attempts, batch.import_backoff_base_secs);

    let job_id = queue.enqueue(JobKind::Import, &payload, policy).await?;

    Ok(SubmitImportResponse {
        job_id,
        message: "File received and import job successfully queued.".to_string(),
    })
}
