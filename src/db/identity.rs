use chrono::Utc;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{Role, User};
use crate::error::AppError;
use crate::models::{DbInstructor, Instructor, Student, StudentSchoolStatus};

const STUDENT_COLUMNS: &str = "id, email, first_name, last_name, phone, emergency_contact, \
     license_number, school_id, school_status, total_lessons, completed_lessons, created_at, updated_at";

const INSTRUCTOR_COLUMNS: &str = "id, email, first_name, last_name, phone, license_number, \
     hourly_rate, specializations, bio, school_id, status, average_rating, total_ratings, \
     created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub emergency_contact: String,
}

#[derive(Debug, Clone)]
pub struct NewInstructor {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub license_number: String,
    pub hourly_rate: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StudentUpdate {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(custom(function = "crate::validation::validate_phone"))]
    pub phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InstructorUpdate {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(custom(function = "crate::validation::validate_phone"))]
    pub phone: Option<String>,
    #[validate(range(min = 0.0))]
    pub hourly_rate: Option<f64>,
    pub specializations: Option<Vec<String>>,
    pub bio: Option<String>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    email: String,
    password_hash: String,
    display_name: String,
}

fn credential_query(role: Role) -> &'static str {
    match role {
        Role::Student => {
            "SELECT id, email, password_hash, first_name || ' ' || last_name AS display_name
             FROM students WHERE email = ?"
        }
        Role::Instructor => {
            "SELECT id, email, password_hash, first_name || ' ' || last_name AS display_name
             FROM instructors WHERE email = ?"
        }
        Role::Admin => "SELECT id, email, password_hash, display_name FROM admins WHERE email = ?",
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(pool))]
pub async fn email_registered(pool: &Pool<Sqlite>, email: &str) -> Result<bool, AppError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM students WHERE email = ?1)
              + (SELECT COUNT(*) FROM instructors WHERE email = ?1)
              + (SELECT COUNT(*) FROM admins WHERE email = ?1)",
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

#[instrument(skip_all, fields(email = %student.email))]
pub async fn create_student(pool: &Pool<Sqlite>, student: &NewStudent) -> Result<i64, AppError> {
    info!("Creating new student");
    let email = normalize_email(&student.email);

    if email_registered(pool, &email).await? {
        return Err(AppError::Conflict(format!(
            "Email '{}' already registered",
            email
        )));
    }

    let hashed_password = bcrypt::hash(&student.password, bcrypt::DEFAULT_COST)?;
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "INSERT INTO students
         (email, password_hash, first_name, last_name, phone, emergency_contact, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&email)
    .bind(hashed_password)
    .bind(&student.first_name)
    .bind(&student.last_name)
    .bind(&student.phone)
    .bind(&student.emergency_contact)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip_all, fields(email = %instructor.email))]
pub async fn create_instructor(
    pool: &Pool<Sqlite>,
    instructor: &NewInstructor,
) -> Result<i64, AppError> {
    info!("Creating new instructor");
    let email = normalize_email(&instructor.email);

    if email_registered(pool, &email).await? {
        return Err(AppError::Conflict(format!(
            "Email '{}' already registered",
            email
        )));
    }

    let hashed_password = bcrypt::hash(&instructor.password, bcrypt::DEFAULT_COST)?;
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "INSERT INTO instructors
         (email, password_hash, first_name, last_name, phone, license_number, hourly_rate, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&email)
    .bind(hashed_password)
    .bind(&instructor.first_name)
    .bind(&instructor.last_name)
    .bind(&instructor.phone)
    .bind(&instructor.license_number)
    .bind(instructor.hourly_rate)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, password))]
pub async fn create_admin(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<i64, AppError> {
    info!("Creating new admin");
    let email = normalize_email(email);

    if email_registered(pool, &email).await? {
        return Err(AppError::Conflict(format!(
            "Email '{}' already registered",
            email
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res =
        sqlx::query("INSERT INTO admins (email, password_hash, display_name) VALUES (?, ?, ?)")
            .bind(&email)
            .bind(hashed_password)
            .bind(display_name)
            .execute(pool)
            .await?;

    Ok(res.last_insert_rowid())
}

/// Checks the password against every identity table in turn. `None` means unknown
/// email or wrong password; the caller cannot tell which.
#[instrument(skip_all, fields(email = %email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let email = normalize_email(email);

    for role in [Role::Student, Role::Instructor, Role::Admin] {
        let row = sqlx::query_as::<_, CredentialRow>(credential_query(role))
            .bind(&email)
            .fetch_optional(pool)
            .await?;

        if let Some(row) = row {
            let valid = bcrypt::verify(password, &row.password_hash).unwrap_or(false);
            if !valid {
                return Ok(None);
            }

            return Ok(Some(User {
                id: row.id,
                email: row.email,
                role,
                display_name: row.display_name,
            }));
        }
    }

    Ok(None)
}

#[instrument(skip(pool))]
pub async fn find_identity(
    pool: &Pool<Sqlite>,
    role: Role,
    email: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, CredentialRow>(credential_query(role))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        id: row.id,
        email: row.email,
        role,
        display_name: row.display_name,
    }))
}

#[instrument(skip(executor))]
pub async fn get_student(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    id: i64,
) -> Result<Student, AppError> {
    info!("Fetching student by ID");
    let query = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);

    sqlx::query_as::<_, Student>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn get_student_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Student, AppError> {
    info!("Fetching student by email");
    let query = format!("SELECT {} FROM students WHERE email = ?", STUDENT_COLUMNS);

    sqlx::query_as::<_, Student>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student with email {} not found", email)))
}

#[instrument(skip(pool))]
pub async fn list_students(pool: &Pool<Sqlite>) -> Result<Vec<Student>, AppError> {
    info!("Listing students");
    let query = format!(
        "SELECT {} FROM students ORDER BY last_name, first_name",
        STUDENT_COLUMNS
    );

    Ok(sqlx::query_as::<_, Student>(&query).fetch_all(pool).await?)
}

#[instrument(skip(pool))]
pub async fn update_student_profile(
    pool: &Pool<Sqlite>,
    email: &str,
    update: &StudentUpdate,
) -> Result<Student, AppError> {
    info!("Updating student profile");
    sqlx::query(
        "UPDATE students
         SET first_name = COALESCE(?, first_name),
             last_name = COALESCE(?, last_name),
             phone = COALESCE(?, phone),
             emergency_contact = COALESCE(?, emergency_contact),
             license_number = COALESCE(?, license_number),
             updated_at = ?
         WHERE email = ?",
    )
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(&update.phone)
    .bind(&update.emergency_contact)
    .bind(&update.license_number)
    .bind(Utc::now().naive_utc())
    .bind(email)
    .execute(pool)
    .await?;

    get_student_by_email(pool, email).await
}

#[instrument(skip(executor))]
pub async fn get_instructor(
    executor: impl sqlx::Executor<'_, Database = Sqlite>,
    id: i64,
) -> Result<Instructor, AppError> {
    info!("Fetching instructor by ID");
    let query = format!("SELECT {} FROM instructors WHERE id = ?", INSTRUCTOR_COLUMNS);

    sqlx::query_as::<_, DbInstructor>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Instructor::from)
        .ok_or_else(|| AppError::NotFound(format!("Instructor with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn get_instructor_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Instructor, AppError> {
    info!("Fetching instructor by email");
    let query = format!(
        "SELECT {} FROM instructors WHERE email = ?",
        INSTRUCTOR_COLUMNS
    );

    sqlx::query_as::<_, DbInstructor>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await?
        .map(Instructor::from)
        .ok_or_else(|| AppError::NotFound(format!("Instructor with email {} not found", email)))
}

#[instrument(skip(pool))]
pub async fn list_instructors(pool: &Pool<Sqlite>) -> Result<Vec<Instructor>, AppError> {
    info!("Listing instructors");
    let query = format!(
        "SELECT {} FROM instructors ORDER BY last_name, first_name",
        INSTRUCTOR_COLUMNS
    );

    let rows = sqlx::query_as::<_, DbInstructor>(&query)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Instructor::from).collect())
}

#[instrument(skip(pool))]
pub async fn update_instructor_profile(
    pool: &Pool<Sqlite>,
    email: &str,
    update: &InstructorUpdate,
) -> Result<Instructor, AppError> {
    info!("Updating instructor profile");
    sqlx::query(
        "UPDATE instructors
         SET first_name = COALESCE(?, first_name),
             last_name = COALESCE(?, last_name),
             phone = COALESCE(?, phone),
             hourly_rate = COALESCE(?, hourly_rate),
             specializations = COALESCE(?, specializations),
             bio = COALESCE(?, bio),
             updated_at = ?
         WHERE email = ?",
    )
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(&update.phone)
    .bind(update.hourly_rate)
    .bind(update.specializations.clone().map(Json))
    .bind(&update.bio)
    .bind(Utc::now().naive_utc())
    .bind(email)
    .execute(pool)
    .await?;

    get_instructor_by_email(pool, email).await
}

pub(crate) async fn approve_student_membership(
    tx: &mut Transaction<'_, Sqlite>,
    student_id: i64,
    school_id: i64,
) -> Result<(), AppError> {
    sqlx::query("UPDATE students SET school_id = ?, school_status = ?, updated_at = ? WHERE id = ?")
        .bind(school_id)
        .bind(StudentSchoolStatus::Approved)
        .bind(Utc::now().naive_utc())
        .bind(student_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub(crate) async fn increment_student_lessons(
    tx: &mut Transaction<'_, Sqlite>,
    student_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE students SET total_lessons = total_lessons + 1, updated_at = ? WHERE id = ?",
    )
    .bind(Utc::now().naive_utc())
    .bind(student_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn increment_completed_lessons(
    tx: &mut Transaction<'_, Sqlite>,
    student_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE students SET completed_lessons = completed_lessons + 1, updated_at = ? WHERE id = ?",
    )
    .bind(Utc::now().naive_utc())
    .bind(student_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
