//! Vehicle store
//!
//! Conflict-aware persistence keyed on the VIN natural key, plus the derived
//! age range query used by export jobs.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// A persisted vehicle record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub car_make: String,
    pub car_model: String,
    pub vin: String,
    pub manufactured_date: NaiveDate,
    pub age_of_vehicle: i32,
}

/// A validated record ready for persistence, with the age already derived.
///
/// Worker-local; only whole batches of these reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub car_make: String,
    pub car_model: String,
    pub vin: String,
    pub manufactured_date: NaiveDate,
    pub age_of_vehicle: i32,
}

/// Age in fully-elapsed years between the manufacture date and `today`.
///
/// The year difference is reduced by one when today's month/day still
/// precedes the manufacture month/day.
pub fn age_in_years(manufactured: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - manufactured.year();
    if (today.month(), today.day()) < (manufactured.month(), manufactured.day()) {
        age -= 1;
    }
    age
}

/// Persist a whole batch in one transaction, upserting on VIN.
///
/// Existing VINs are updated in place; any error rolls the entire batch back.
/// Returns the number of rows written.
pub async fn upsert_batch(pool: &PgPool, records: &[NewVehicle]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO vehicles
                (first_name, last_name, email, car_make, car_model, vin,
                 manufactured_date, age_of_vehicle)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (vin)
            DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                car_make = EXCLUDED.car_make,
                car_model = EXCLUDED.car_model,
                manufactured_date = EXCLUDED.manufactured_date,
                age_of_vehicle = EXCLUDED.age_of_vehicle,
                updated_at = NOW()
            "#,
        )
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.email)
        .bind(&record.car_make)
        .bind(&record.car_model)
        .bind(&record.vin)
        .bind(record.manufactured_date)
        .bind(record.age_of_vehicle)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(records.len() as u64)
}

/// All vehicles whose derived age exceeds the filter, ordered by id.
pub async fn older_than(pool: &PgPool, min_age: i32) -> Result<Vec<Vehicle>, sqlx::Error> {
    sqlx::query_as::<_, Vehicle>(
        r#"
        SELECT id, first_name, last_name, email, car_make, car_model, vin,
               manufactured_date, age_of_vehicle
        FROM vehicles
        WHERE age_of_vehicle > $1
        ORDER BY id
        "#,
    )
    .bind(min_age)
    .fetch_all(pool)
    .await
}

/// Total number of persisted vehicles.
pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM vehicles")
        .fetch_one(pool)
        .await
}

/// Look up a single vehicle by VIN.
pub async fn find_by_vin(pool: &PgPool, vin: &str) -> Result<Option<Vehicle>, sqlx::Error> {
    sqlx::query_as::<_, Vehicle>(
        r#"
        SELECT id, first_name, last_name, email, car_make, car_model, vin,
               manufactured_date, age_of_vehicle
        FROM vehicles
        WHERE vin = $1
        "#,
    )
    .bind(vin)
    .fetch_optional(pool)
    .await
}
