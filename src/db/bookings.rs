use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{info, instrument};

use crate::auth::{Role, User};
use crate::error::AppError;
use crate::models::{Booking, BookingStatus, BookingType};

const BOOKING_COLUMNS: &str = "id, booking_type, student_id, instructor_id, school_id, lesson_id, \
     preferred_date, status, student_message, instructor_response, school_response, \
     rejection_reason, requested_at, instructor_response_at, school_response_at, confirmed_at, \
     created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_type: BookingType,
    pub student_id: i64,
    pub instructor_id: Option<i64>,
    pub school_id: Option<i64>,
    pub lesson_id: Option<i64>,
    pub preferred_date: Option<NaiveDateTime>,
    pub status: BookingStatus,
    pub student_message: String,
}

#[instrument(skip(executor))]
pub async fn get_booking(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    id: i64,
) -> Result<Booking, AppError> {
    info!("Fetching booking by ID");
    let query = format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS);

    sqlx::query_as::<_, Booking>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking with id {} not found", id)))
}

#[instrument(skip(executor))]
pub async fn find_booking_for_lesson(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    lesson_id: i64,
) -> Result<Booking, AppError> {
    let query = format!(
        "SELECT {} FROM bookings WHERE lesson_id = ? AND booking_type = 'lesson'",
        BOOKING_COLUMNS
    );

    sqlx::query_as::<_, Booking>(&query)
        .bind(lesson_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No booking found for lesson {}", lesson_id)))
}

#[instrument(skip(executor))]
pub async fn has_pending_join_request(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    student_id: i64,
    school_id: i64,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings
         WHERE student_id = ? AND school_id = ? AND booking_type = 'school_join' AND status = 'requested'",
    )
    .bind(student_id)
    .bind(school_id)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// Bookings where the caller is the student, or the instructor for instructors.
/// Admins see every booking.
#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn list_bookings_for_user(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<Vec<Booking>, AppError> {
    info!("Listing bookings for user");

    let filter = match user.role {
        Role::Student => "WHERE student_id = ?",
        Role::Instructor => "WHERE instructor_id = ?",
        Role::Admin => "",
    };
    let query = format!(
        "SELECT {} FROM bookings {} ORDER BY created_at DESC, id DESC",
        BOOKING_COLUMNS, filter
    );

    let mut statement = sqlx::query_as::<_, Booking>(&query);
    if user.role != Role::Admin {
        statement = statement.bind(user.id);
    }
    let bookings = statement.fetch_all(pool).await?;

    Ok(bookings)
}

pub(crate) async fn insert_booking(
    tx: &mut Transaction<'_, Sqlite>,
    booking: &NewBooking,
) -> Result<i64, AppError> {
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "INSERT INTO bookings
         (booking_type, student_id, instructor_id, school_id, lesson_id, preferred_date, status,
          student_message, requested_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(booking.booking_type)
    .bind(booking.student_id)
    .bind(booking.instructor_id)
    .bind(booking.school_id)
    .bind(booking.lesson_id)
    .bind(booking.preferred_date)
    .bind(booking.status)
    .bind(&booking.student_message)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(res.last_insert_rowid())
}

pub(crate) async fn record_school_response(
    tx: &mut Transaction<'_, Sqlite>,
    booking_id: i64,
    status: BookingStatus,
    response: &str,
    rejection_reason: Option<&str>,
) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();
    let confirmed_at = (status == BookingStatus::Confirmed).then_some(now);

    sqlx::query(
        "UPDATE bookings
         SET status = ?, school_response = ?, school_response_at = ?, rejection_reason = ?,
             confirmed_at = COALESCE(?, confirmed_at), updated_at = ?
         WHERE id = ?",
    )
    .bind(status)
    .bind(response)
    .bind(now)
    .bind(rejection_reason)
    .bind(confirmed_at)
    .bind(now)
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn record_instructor_response(
    tx: &mut Transaction<'_, Sqlite>,
    booking_id: i64,
    status: BookingStatus,
    response: &str,
    rejection_reason: Option<&str>,
) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();
    let confirmed_at = (status == BookingStatus::Confirmed).then_some(now);

    sqlx::query(
        "UPDATE bookings
         SET status = ?, instructor_response = ?, instructor_response_at = ?, rejection_reason = ?,
             confirmed_at = COALESCE(?, confirmed_at), updated_at = ?
         WHERE id = ?",
    )
    .bind(status)
    .bind(response)
    .bind(now)
    .bind(rejection_reason)
    .bind(confirmed_at)
    .bind(now)
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn set_booking_status(
    tx: &mut Transaction<'_, Sqlite>,
    booking_id: i64,
    status: BookingStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now().naive_utc())
        .bind(booking_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
