use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbSchool, NewSchool, School, SchoolStatus};

const SCHOOL_COLUMNS: &str = "id, name, address, phone, email, description, license_number, \
     services, lesson_types, pricing, operating_hours, status, total_students, \
     total_instructors, average_rating, created_at, updated_at";

/// A school together with its membership sets.
#[derive(Debug, Clone, Serialize)]
pub struct SchoolDetail {
    #[serde(flatten)]
    pub school: School,
    pub students: Vec<i64>,
    pub instructors: Vec<i64>,
    pub pending_requests: Vec<i64>,
}

/// A school join request as shown to whoever reviews it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PendingJoinRequest {
    pub booking_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub student_email: String,
    pub student_phone: String,
    pub student_message: String,
    pub requested_at: NaiveDateTime,
}

#[instrument(skip_all, fields(name = %school.name))]
pub async fn create_school(pool: &Pool<Sqlite>, school: &NewSchool) -> Result<School, AppError> {
    info!("Creating school");
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "INSERT INTO schools
         (name, address, phone, email, description, license_number, services, lesson_types,
          pricing, operating_hours, status, average_rating, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&school.name)
    .bind(&school.address)
    .bind(&school.phone)
    .bind(school.email.trim().to_lowercase())
    .bind(&school.description)
    .bind(&school.license_number)
    .bind(Json(&school.services))
    .bind(Json(&school.lesson_types))
    .bind(Json(&school.pricing))
    .bind(Json(&school.operating_hours))
    .bind(SchoolStatus::Active)
    .bind(school.average_rating.unwrap_or(0.0))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_school(pool, res.last_insert_rowid()).await
}

#[instrument(skip(executor))]
pub async fn get_school(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    id: i64,
) -> Result<School, AppError> {
    info!("Fetching school by ID");
    let query = format!("SELECT {} FROM schools WHERE id = ?", SCHOOL_COLUMNS);

    sqlx::query_as::<_, DbSchool>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(School::from)
        .ok_or_else(|| AppError::NotFound(format!("School with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn get_school_detail(pool: &Pool<Sqlite>, id: i64) -> Result<SchoolDetail, AppError> {
    let school = get_school(pool, id).await?;

    let students: Vec<i64> = sqlx::query_scalar(
        "SELECT student_id FROM school_students WHERE school_id = ? ORDER BY student_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let instructors: Vec<i64> = sqlx::query_scalar(
        "SELECT instructor_id FROM school_instructors WHERE school_id = ? ORDER BY instructor_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let pending_requests: Vec<i64> = sqlx::query_scalar(
        "SELECT student_id FROM school_pending_requests WHERE school_id = ? ORDER BY student_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(SchoolDetail {
        school,
        students,
        instructors,
        pending_requests,
    })
}

#[instrument(skip(pool))]
pub async fn list_active_schools(pool: &Pool<Sqlite>) -> Result<Vec<School>, AppError> {
    info!("Listing active schools");
    let query = format!(
        "SELECT {} FROM schools WHERE status = ? ORDER BY name",
        SCHOOL_COLUMNS
    );

    let rows = sqlx::query_as::<_, DbSchool>(&query)
        .bind(SchoolStatus::Active)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(School::from).collect())
}

#[instrument(skip(pool))]
pub async fn school_count(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schools")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[instrument(skip(pool))]
pub async fn list_pending_requests(
    pool: &Pool<Sqlite>,
    school_id: i64,
) -> Result<Vec<PendingJoinRequest>, AppError> {
    info!("Listing pending join requests");

    let requests = sqlx::query_as::<_, PendingJoinRequest>(
        "SELECT b.id AS booking_id, s.id AS student_id,
                s.first_name || ' ' || s.last_name AS student_name,
                s.email AS student_email, s.phone AS student_phone,
                b.student_message, b.requested_at
         FROM bookings b
         JOIN students s ON s.id = b.student_id
         WHERE b.school_id = ? AND b.booking_type = 'school_join' AND b.status = 'requested'
         ORDER BY b.requested_at, b.id",
    )
    .bind(school_id)
    .fetch_all(pool)
    .await?;

    Ok(requests)
}

#[instrument(skip(executor))]
pub async fn is_member(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    school_id: i64,
    student_id: i64,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM school_students WHERE school_id = ? AND student_id = ?",
    )
    .bind(school_id)
    .bind(student_id)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

#[instrument(skip(executor))]
pub async fn instructor_belongs_to_school(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    school_id: i64,
    instructor_id: i64,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM school_instructors WHERE school_id = ? AND instructor_id = ?",
    )
    .bind(school_id)
    .bind(instructor_id)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// Adds the instructor to the school's staff. Re-assigning is a no-op for the counter.
#[instrument(skip(pool))]
pub async fn assign_instructor_to_school(
    pool: &Pool<Sqlite>,
    school_id: i64,
    instructor_id: i64,
) -> Result<School, AppError> {
    info!("Assigning instructor to school");
    let mut tx = super::begin_write(pool).await?;

    get_school(&mut *tx, school_id).await?;

    let instructor_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM instructors WHERE id = ?")
        .bind(instructor_id)
        .fetch_one(&mut *tx)
        .await?;
    if instructor_exists == 0 {
        return Err(AppError::NotFound(format!(
            "Instructor with id {} not found",
            instructor_id
        )));
    }

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO school_instructors (school_id, instructor_id) VALUES (?, ?)",
    )
    .bind(school_id)
    .bind(instructor_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let now = Utc::now().naive_utc();
    if inserted > 0 {
        sqlx::query(
            "UPDATE schools SET total_instructors = total_instructors + 1, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(school_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE instructors SET school_id = ?, updated_at = ? WHERE id = ?")
        .bind(school_id)
        .bind(now)
        .bind(instructor_id)
        .execute(&mut *tx)
        .await?;

    let school = get_school(&mut *tx, school_id).await?;
    tx.commit().await?;

    Ok(school)
}

pub(crate) async fn add_pending_request(
    tx: &mut Transaction<'_, Sqlite>,
    school_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT OR IGNORE INTO school_pending_requests (school_id, student_id) VALUES (?, ?)",
    )
    .bind(school_id)
    .bind(student_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn remove_pending_request(
    tx: &mut Transaction<'_, Sqlite>,
    school_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM school_pending_requests WHERE school_id = ? AND student_id = ?")
        .bind(school_id)
        .bind(student_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Returns whether the student was newly added; the school's counter moves only then.
pub(crate) async fn add_member(
    tx: &mut Transaction<'_, Sqlite>,
    school_id: i64,
    student_id: i64,
) -> Result<bool, AppError> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO school_students (school_id, student_id) VALUES (?, ?)",
    )
    .bind(school_id)
    .bind(student_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if inserted > 0 {
        sqlx::query(
            "UPDATE schools SET total_students = total_students + 1, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().naive_utc())
        .bind(school_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(inserted > 0)
}
