use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::db::{booked_start_times, get_instructor};
use crate::error::AppError;

const FIRST_SLOT_HOUR: u32 = 9;
const LAST_SLOT_HOUR: u32 = 16;

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
    })
}

/// Hourly slot starts for the day that no live lesson already occupies.
pub fn available_slots(date: NaiveDate, booked: &[NaiveDateTime]) -> Vec<NaiveDateTime> {
    (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .map(|time| date.and_time(time))
        .filter(|slot| !booked.contains(slot))
        .collect()
}

#[instrument(skip(pool))]
pub async fn instructor_available_slots(
    pool: &Pool<Sqlite>,
    instructor_id: i64,
    date: NaiveDate,
) -> Result<Vec<NaiveDateTime>, AppError> {
    get_instructor(pool, instructor_id).await?;
    let booked = booked_start_times(pool, instructor_id, date).await?;

    Ok(available_slots(date, &booked))
}
