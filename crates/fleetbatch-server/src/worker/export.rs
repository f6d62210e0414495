//! Export job processing
//!
//! Selects vehicles strictly older than the requested age, serializes them to
//! CSV and parks the artifact in the cache under the job id. The download
//! route serves it from there until the TTL runs out.

use csv::WriterBuilder;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::ArtifactCache;
use crate::db::vehicles::{self, Vehicle};
use crate::jobs::{ExportPayload, JobKind};
use crate::notify::{JobNotification, NotificationHub};

/// Maximum length of the error detail quoted in a failure notification.
const FAILURE_DETAIL_MAX_CHARS: usize = 100;

const EXPORT_HEADER: [&str; 9] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "car_make",
    "car_model",
    "vin",
    "manufactured_date",
    "age_of_vehicle",
];

/// Serialize matched vehicles to CSV text, dates as `YYYY-MM-DD`.
pub fn write_csv(matches: &[Vehicle]) -> Result<String, anyhow::Error> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for vehicle in matches {
        writer.write_record([
            vehicle.id.to_string(),
            vehicle.first_name.clone(),
            vehicle.last_name.clone(),
            vehicle.email.clone(),
            vehicle.car_make.clone(),
            vehicle.car_model.clone(),
            vehicle.vin.clone(),
            vehicle.manufactured_date.format("%Y-%m-%d").to_string(),
            vehicle.age_of_vehicle.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush export writer: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Run one export attempt.
///
/// Publishes a success or failure notification; the policy gives exports a
/// single attempt, so a returned error is terminal.
pub async fn run(
    pool: &PgPool,
    cache: &ArtifactCache,
    hub: &NotificationHub,
    job_id: Uuid,
    payload: &serde_json::Value,
    artifact_ttl: Duration,
) -> anyhow::Result<()> {
    let payload: ExportPayload = serde_json::from_value(payload.clone())?;
    tracing::info!(job_id = %job_id, min_age = payload.min_age, "starting export");

    match process(pool, cache, job_id, payload.min_age, artifact_ttl).await {
        Ok(0) => {
            let message = format!("No vehicles found older than {} years.", payload.min_age);
            tracing::info!(job_id = %job_id, "export matched no vehicles");
            hub.publish(JobNotification::success(JobKind::Export, job_id, 0, message));
            Ok(())
        }
        Ok(count) => {
            let message = format!("Successfully exported {} vehicle records.", count);
            tracing::info!(job_id = %job_id, count, "export finished");
            hub.publish(
                JobNotification::success(JobKind::Export, job_id, count, message)
                    .with_download_url(format!("/batch/download/{}", job_id)),
            );
            Ok(())
        }
        Err(e) => {
            let message = format!(
                "Export failed: {}",
                truncate_chars(&e.to_string(), FAILURE_DETAIL_MAX_CHARS)
            );
            tracing::error!(job_id = %job_id, error = %e, "export failed");
            hub.publish(JobNotification::failure(JobKind::Export, job_id, message));
            Err(e)
        }
    }
}

/// Query, serialize and cache. Returns the matched count; zero leaves the
/// cache untouched.
async fn process(
    pool: &PgPool,
    cache: &ArtifactCache,
    job_id: Uuid,
    min_age: i32,
    artifact_ttl: Duration,
) -> anyhow::Result<u64> {
    let matches = vehicles::older_than(pool, min_age).await?;
    if matches.is_empty() {
        return Ok(0);
    }

    let csv = write_csv(&matches)?;
    cache.put(job_id, csv, artifact_ttl).await;
    Ok(matches.len() as u64)
}
