use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{info, instrument};

use crate::auth::{Role, User};
use crate::error::AppError;
use crate::models::{CancelledBy, Lesson, LessonStatus, LessonType, VehicleType};

const LESSON_COLUMNS: &str = "l.id, l.student_id, l.instructor_id, l.school_id, l.lesson_type, \
     l.vehicle_type, l.scheduled_date, l.duration_minutes, l.status, l.instructor_accepted, \
     l.price, l.notes, l.cancellation_reason, l.cancelled_by, l.cancelled_at, l.created_at, \
     l.updated_at";

const UPCOMING_LIMIT: i64 = 5;

#[derive(Debug, Clone)]
pub struct NewLesson {
    pub student_id: i64,
    pub instructor_id: i64,
    pub school_id: Option<i64>,
    pub lesson_type: LessonType,
    pub vehicle_type: Option<VehicleType>,
    pub scheduled_date: NaiveDateTime,
    pub duration_minutes: i64,
    pub price: Option<f64>,
}

/// A lesson joined with the name and email of the other party.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LessonView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub lesson: Lesson,
    pub counterpart_name: String,
    pub counterpart_email: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PendingLesson {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub lesson: Lesson,
    pub booking_id: Option<i64>,
    pub student_name: String,
    pub student_email: String,
    pub student_phone: String,
}

#[instrument(skip(executor))]
pub async fn get_lesson(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    id: i64,
) -> Result<Lesson, AppError> {
    info!("Fetching lesson by ID");
    let query = format!("SELECT {} FROM lessons l WHERE l.id = ?", LESSON_COLUMNS);

    sqlx::query_as::<_, Lesson>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson with id {} not found", id)))
}

/// Whether the instructor already holds a live lesson starting at exactly this time.
#[instrument(skip(executor))]
pub async fn instructor_has_lesson_at(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    instructor_id: i64,
    scheduled_date: NaiveDateTime,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lessons
         WHERE instructor_id = ? AND scheduled_date = ? AND status NOT IN ('cancelled', 'rejected')",
    )
    .bind(instructor_id)
    .bind(scheduled_date)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

#[instrument(skip(pool))]
pub async fn booked_start_times(
    pool: &Pool<Sqlite>,
    instructor_id: i64,
    date: NaiveDate,
) -> Result<Vec<NaiveDateTime>, AppError> {
    info!("Fetching booked start times");
    let day_start = date.and_time(chrono::NaiveTime::MIN);
    let day_end = day_start + Duration::days(1);

    let times: Vec<NaiveDateTime> = sqlx::query_scalar(
        "SELECT scheduled_date FROM lessons
         WHERE instructor_id = ? AND scheduled_date >= ? AND scheduled_date < ?
           AND status NOT IN ('cancelled', 'rejected')
         ORDER BY scheduled_date",
    )
    .bind(instructor_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_all(pool)
    .await?;

    Ok(times)
}

/// Join and owner filter for a participant's lessons. Admins take part in none;
/// their ids come from a separate sequence and must never be read as a student's.
fn counterpart_join(role: Role) -> Option<(&'static str, &'static str)> {
    match role {
        Role::Instructor => Some((
            "JOIN students c ON c.id = l.student_id",
            "l.instructor_id = ?",
        )),
        Role::Student => Some((
            "JOIN instructors c ON c.id = l.instructor_id",
            "l.student_id = ?",
        )),
        Role::Admin => None,
    }
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn upcoming_lessons(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<Vec<LessonView>, AppError> {
    info!("Fetching upcoming lessons");
    let Some((join, owner)) = counterpart_join(user.role) else {
        return Ok(Vec::new());
    };
    let query = format!(
        "SELECT {}, c.first_name || ' ' || c.last_name AS counterpart_name, c.email AS counterpart_email
         FROM lessons l {}
         WHERE {} AND l.scheduled_date >= ? AND l.status IN ('pending', 'scheduled', 'confirmed')
         ORDER BY l.scheduled_date ASC
         LIMIT ?",
        LESSON_COLUMNS, join, owner
    );

    let lessons = sqlx::query_as::<_, LessonView>(&query)
        .bind(user.id)
        .bind(Utc::now().naive_utc())
        .bind(UPCOMING_LIMIT)
        .fetch_all(pool)
        .await?;

    Ok(lessons)
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn lessons_for_user(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<Vec<LessonView>, AppError> {
    info!("Fetching all lessons for user");
    let Some((join, owner)) = counterpart_join(user.role) else {
        return Ok(Vec::new());
    };
    let query = format!(
        "SELECT {}, c.first_name || ' ' || c.last_name AS counterpart_name, c.email AS counterpart_email
         FROM lessons l {}
         WHERE {}
         ORDER BY l.scheduled_date DESC",
        LESSON_COLUMNS, join, owner
    );

    let lessons = sqlx::query_as::<_, LessonView>(&query)
        .bind(user.id)
        .fetch_all(pool)
        .await?;

    Ok(lessons)
}

#[instrument(skip(pool))]
pub async fn pending_lessons_for_instructor(
    pool: &Pool<Sqlite>,
    instructor_id: i64,
) -> Result<Vec<PendingLesson>, AppError> {
    info!("Fetching pending lessons for instructor");
    let query = format!(
        "SELECT {}, b.id AS booking_id,
                s.first_name || ' ' || s.last_name AS student_name,
                s.email AS student_email, s.phone AS student_phone
         FROM lessons l
         JOIN students s ON s.id = l.student_id
         LEFT JOIN bookings b ON b.lesson_id = l.id
         WHERE l.instructor_id = ? AND l.status IN ('pending', 'scheduled')
         ORDER BY l.scheduled_date ASC",
        LESSON_COLUMNS
    );

    let lessons = sqlx::query_as::<_, PendingLesson>(&query)
        .bind(instructor_id)
        .fetch_all(pool)
        .await?;

    Ok(lessons)
}

pub(crate) async fn insert_lesson(
    tx: &mut Transaction<'_, Sqlite>,
    lesson: &NewLesson,
) -> Result<i64, AppError> {
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "INSERT INTO lessons
         (student_id, instructor_id, school_id, lesson_type, vehicle_type, scheduled_date,
          duration_minutes, status, instructor_accepted, price, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?, ?)",
    )
    .bind(lesson.student_id)
    .bind(lesson.instructor_id)
    .bind(lesson.school_id)
    .bind(lesson.lesson_type)
    .bind(lesson.vehicle_type)
    .bind(lesson.scheduled_date)
    .bind(lesson.duration_minutes)
    .bind(LessonStatus::Pending)
    .bind(lesson.price)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(res.last_insert_rowid())
}

pub(crate) async fn confirm_lesson(
    tx: &mut Transaction<'_, Sqlite>,
    lesson_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE lessons SET status = ?, instructor_accepted = TRUE, updated_at = ? WHERE id = ?",
    )
    .bind(LessonStatus::Confirmed)
    .bind(Utc::now().naive_utc())
    .bind(lesson_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn cancel_lesson_row(
    tx: &mut Transaction<'_, Sqlite>,
    lesson_id: i64,
    cancelled_by: CancelledBy,
    reason: &str,
    notes: Option<&str>,
) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();

    sqlx::query(
        "UPDATE lessons
         SET status = ?, cancellation_reason = ?, cancelled_by = ?, cancelled_at = ?,
             notes = COALESCE(?, notes), updated_at = ?
         WHERE id = ?",
    )
    .bind(LessonStatus::Cancelled)
    .bind(reason)
    .bind(cancelled_by)
    .bind(now)
    .bind(notes)
    .bind(now)
    .bind(lesson_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn complete_lesson_row(
    tx: &mut Transaction<'_, Sqlite>,
    lesson_id: i64,
) -> Result<(), AppError> {
    sqlx::query("UPDATE lessons SET status = ?, updated_at = ? WHERE id = ?")
        .bind(LessonStatus::Completed)
        .bind(Utc::now().naive_utc())
        .bind(lesson_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub(crate) async fn set_lesson_notes(
    tx: &mut Transaction<'_, Sqlite>,
    lesson_id: i64,
    notes: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE lessons SET notes = ?, updated_at = ? WHERE id = ?")
        .bind(notes)
        .bind(Utc::now().naive_utc())
        .bind(lesson_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
