//! Submit export command
//!
//! Queues an export job for vehicles strictly older than the requested age.
//! Negative filters are rejected before the job is queued; exports run with a
//! single attempt and no backoff.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::{ExportPayload, JobKind, JobQueue, RetryPolicy};

/// Command to queue a vehicle export
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubmitExportCommand {
    /// Minimum vehicle age in whole years; matches are strictly older
    pub min_age: i32,
}

/// Response returned once the job is queued
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitExportResponse {
    pub job_id: Uuid,
    pub message: String,
}

/// Errors that can occur when submitting an export
#[derive(Debug, thiserror::Error)]
pub enum SubmitExportError {
    #[error("Minimum age must not be negative, got {0}")]
    NegativeAge(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SubmitExportCommand {
    /// Validates the command parameters
    pub fn validate(&self) -> Result<(), SubmitExportError> {
        if self.min_age < 0 {
            return Err(SubmitExportError::NegativeAge(self.min_age));
        }
        Ok(())
    }
}

/// Handle the submit export command
pub async fn handle(
    queue: &JobQueue,
    command: SubmitExportCommand,
) -> Result<SubmitExportResponse, SubmitExportError> {
    command.validate()?;

    let payload = ExportPayload {
        min_age: command.min_age,
    };
    let job_id = queue
        .enqueue(JobKind::Export, &payload, RetryPolicy::single_attempt())
        .await?;

    Ok(SubmitExportResponse {
        job_id,
        message: format!(
            "Export job queued for vehicles older than {} years.",
            command.min_age
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_age_rejected() {
        let command = SubmitExportCommand { min_age: -1 };
        assert!(matches!(
            command.validate(),
            Err(SubmitExportError::NegativeAge(-1))
        ));
    }

    #[test]
    fn test_zero_age_accepted() {
        let command = SubmitExportCommand { min_age: 0 };
        assert!(command.validate().is_ok());
    }

    #[test]
    fn test_positive_age_accepted() {
        let command = SubmitExportCommand { min_age: 10 };
        assert!(command.validate().is_ok());
    }
}
