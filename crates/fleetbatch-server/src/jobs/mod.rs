//! Job definitions for the batch pipeline
//!
//! A job is a one-shot unit of asynchronous work (import or export) with its
//! own identity, payload and retry state. The retry policy is an explicit
//! value object captured at enqueue time and stored on the job row, so it can
//! be inspected after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub mod queue;

pub use queue::{JobQueue, ReapOutcome};

/// The two kinds of batch work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Import,
    Export,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Import => "import",
            JobKind::Export => "export",
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(JobKind::Import),
            "export" => Ok(JobKind::Export),
            other => Err(format!("unknown job kind: {}", other)),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Active => "active",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

/// Delay schedule between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "secs")]
pub enum Backoff {
    None,
    Fixed(u64),
    Exponential(u64),
}

impl Backoff {
    /// Delay before redelivery after `failed_attempt` failed (1-based).
    pub fn delay_after(&self, failed_attempt: i32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(secs) => Duration::from_secs(secs),
            Backoff::Exponential(base_secs) => {
                let exponent = failed_attempt.saturating_sub(1).min(16) as u32;
                Duration::from_secs(base_secs.saturating_mul(1u64 << exponent))
            },
        }
    }

    /// Column representation: discriminant plus base seconds.
    pub fn to_columns(self) -> (&'static str, i64) {
        match self {
            Backoff::None => ("none", 0),
            Backoff::Fixed(secs) => ("fixed", secs as i64),
            Backoff::Exponential(secs) => ("exponential", secs as i64),
        }
    }

    /// Rebuild from the column representation; unknown discriminants fall
    /// back to no backoff.
    pub fn from_columns(kind: &str, base_secs: i64) -> Self {
        let secs = base_secs.max(0) as u64;
        match kind {
            "fixed" => Backoff::Fixed(secs),
            "exponential" => Backoff::Exponential(secs),
            _ => Backoff::None,
        }
    }
}

/// Retry policy attached to a job at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A single attempt, no redelivery.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }

    /// Multiple attempts with exponential backoff.
    pub fn exponential(max_attempts: i32, base_secs: u64) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential(base_secs),
        }
    }
}

/// Payload of an import job: the raw CSV text as uploaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPayload {
    pub csv_data: String,
    pub submitted_at: DateTime<Utc>,
}

/// Payload of an export job: the minimum-age filter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExportPayload {
    pub min_age: i32,
}

/// A job delivered to a worker for one attempt
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff: Backoff,
}

impl ClaimedJob {
    /// Whether the attempt that just failed was the last one allowed.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Job row as reported by the status endpoint
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
