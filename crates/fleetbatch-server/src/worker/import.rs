//! Import job processing
//!
//! Parses the uploaded CSV payload row by row, skips rows that cannot be
//! repaired (missing VIN, missing or unparseable manufacture date, duplicate
//! VIN within the file), derives the vehicle age and persists the surviving
//! rows as one transactional batch.

use chrono::{NaiveDate, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::vehicles::{self, NewVehicle};
use crate::jobs::{ImportPayload, JobKind};
use crate::notify::{JobNotification, NotificationHub};

/// Maximum length of the error detail quoted in a failure notification.
const FAILURE_DETAIL_MAX_CHARS: usize = 50;

/// One CSV row as uploaded. Every field defaults to empty so short rows
/// surface as skips instead of parse failures.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ImportRow {
    first_name: String,
    last_name: String,
    email: String,
    car_make: String,
    car_model: String,
    vin: String,
    manufactured_date: String,
}

impl Default for ImportRow {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            car_make: String::new(),
            car_model: String::new(),
            vin: String::new(),
            manufactured_date: String::new(),
        }
    }
}

/// Why a row was left out of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingVin,
    MissingDate,
    BadDate,
    DuplicateVin,
}

/// Outcome of the parse pass over one uploaded file
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub records: Vec<NewVehicle>,
    pub duplicates: u64,
    pub missing_vin: u64,
    pub missing_date: u64,
    pub bad_date: u64,
}

impl ParsedBatch {
    fn tally(&mut self, line: u64, reason: SkipReason) {
        tracing::debug!(line, reason = ?reason, "skipping import row");
        match reason {
            SkipReason::MissingVin => self.missing_vin += 1,
            SkipReason::MissingDate => self.missing_date += 1,
            SkipReason::BadDate => self.bad_date += 1,
            SkipReason::DuplicateVin => self.duplicates += 1,
        }
    }

    pub fn skipped(&self) -> u64 {
        self.duplicates + self.missing_vin + self.missing_date + self.bad_date
    }
}

/// The original upload format used both ISO and US-style dates.
fn parse_manufactured_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

/// Parse and validate the whole file into one batch.
///
/// Row-level problems are tallied and skipped; only a malformed stream (a
/// reader error) is fatal.
pub fn parse_batch(csv_data: &str, today: NaiveDate) -> Result<ParsedBatch, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let mut batch = ParsedBatch::default();
    let mut seen_vins: HashSet<String> = HashSet::new();

    for (index, row) in reader.deserialize::<ImportRow>().enumerate() {
        let line = index as u64 + 2; // 1-based, after the header line
        let row = row?;

        if row.vin.is_empty() {
            batch.tally(line, SkipReason::MissingVin);
            continue;
        }
        // Dedup before date validation, so a repeated VIN counts as a
        // duplicate whatever else is wrong with the row.
        if seen_vins.contains(&row.vin) {
            batch.tally(line, SkipReason::DuplicateVin);
            continue;
        }
        if row.manufactured_date.is_empty() {
            batch.tally(line, SkipReason::MissingDate);
            continue;
        }
        let manufactured_date = match parse_manufactured_date(&row.manufactured_date) {
            Some(date) => date,
            None => {
                batch.tally(line, SkipReason::BadDate);
                continue;
            }
        };
        // The VIN is claimed only once the row fully validates; a skipped
        // row does not block a later valid one with the same VIN.
        seen_vins.insert(row.vin.clone());

        batch.records.push(NewVehicle {
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            car_make: row.car_make,
            car_model: row.car_model,
            vin: row.vin,
            manufactured_date,
            age_of_vehicle: vehicles::age_in_years(manufactured_date, today),
        });
    }

    Ok(batch)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Run one import attempt.
///
/// Publishes a success or failure notification either way; the returned error
/// is what drives queue-level retry.
pub async fn run(
    pool: &PgPool,
    hub: &NotificationHub,
    job_id: Uuid,
    payload: &serde_json::Value,
) -> anyhow::Result<()> {
    let payload: ImportPayload = serde_json::from_value(payload.clone())?;
    tracing::info!(
        job_id = %job_id,
        bytes = payload.csv_data.len(),
        submitted_at = %payload.submitted_at,
        "starting import"
    );

    let today = Utc::now().date_naive();
    let outcome = process(pool, &payload.csv_data, today).await;

    match outcome {
        Ok(batch) => {
            let message = format!(
                "Successfully imported {} vehicle records ({} duplicates skipped).",
                batch.records.len(),
                batch.duplicates
            );
            tracing::info!(
                job_id = %job_id,
                imported = batch.records.len(),
                skipped = batch.skipped(),
                "import finished"
            );
            hub.publish(
                JobNotification::success(JobKind::Import, job_id, batch.records.len() as u64, message),
            );
            Ok(())
        }
        Err(e) => {
            let message = format!(
                "Import failed: {}. Data rolled back.",
                truncate_chars(&e.to_string(), FAILURE_DETAIL_MAX_CHARS)
            );
            tracing::error!(job_id = %job_id, error = %e, "import failed");
            hub.publish(JobNotification::failure(JobKind::Import, job_id, message));
            Err(e)
        }
    }
}

async fn process(pool: &PgPool, csv_data: &str, today: NaiveDate) -> anyhow::Result<ParsedBatch> {
    let batch = parse_batch(csv_data, today)?;
    if !batch.records.is_empty() {
        vehicles::upsert_batch(pool, &batch.records).await?;
    }
    Ok(batch)
}
