use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::lessons::{get_lesson, set_lesson_notes};
use crate::error::AppError;
use crate::models::{DbProgressEntry, ProgressEntry, ProgressSummary};

#[derive(Debug, Clone, Default)]
pub struct NewProgressNotes {
    pub notes: String,
    pub performance_rating: i64,
    pub skills_practiced: Vec<String>,
    pub areas_to_improve: Vec<String>,
}

/// Records a progress entry for one of the instructor's own lessons and copies the
/// notes onto the lesson.
#[instrument(skip(pool, notes))]
pub async fn add_lesson_notes(
    pool: &Pool<Sqlite>,
    instructor_id: i64,
    instructor_email: &str,
    lesson_id: i64,
    notes: &NewProgressNotes,
) -> Result<ProgressEntry, AppError> {
    info!("Adding lesson progress notes");

    if !(0..=5).contains(&notes.performance_rating) {
        return Err(AppError::Validation(
            "Performance rating must be between 0 and 5".to_string(),
        ));
    }

    let mut tx = super::begin_write(pool).await?;

    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    if lesson.instructor_id != instructor_id {
        return Err(AppError::Authorization(
            "Only the lesson's instructor can add notes".to_string(),
        ));
    }

    let entry = sqlx::query_as::<_, DbProgressEntry>(
        "INSERT INTO progress_entries
         (lesson_id, instructor_email, notes, performance_rating, skills_practiced, areas_to_improve, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id, lesson_id, instructor_email, notes, performance_rating, skills_practiced,
                   areas_to_improve, created_at",
    )
    .bind(lesson_id)
    .bind(instructor_email)
    .bind(&notes.notes)
    .bind(notes.performance_rating)
    .bind(Json(&notes.skills_practiced))
    .bind(Json(&notes.areas_to_improve))
    .bind(Utc::now().naive_utc())
    .fetch_one(&mut *tx)
    .await?;

    set_lesson_notes(&mut tx, lesson_id, &notes.notes).await?;

    tx.commit().await?;

    Ok(entry.into())
}

#[instrument(skip(pool))]
pub async fn progress_summary(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<ProgressSummary, AppError> {
    info!("Building student progress summary");

    let (total_lessons, completed_lessons): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
         FROM lessons WHERE student_id = ?",
    )
    .bind(student_id)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, DbProgressEntry>(
        "SELECT p.id, p.lesson_id, p.instructor_email, p.notes, p.performance_rating,
                p.skills_practiced, p.areas_to_improve, p.created_at
         FROM progress_entries p
         JOIN lessons l ON l.id = p.lesson_id
         WHERE l.student_id = ?
         ORDER BY p.created_at DESC, p.id DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    let progress_entries: Vec<ProgressEntry> = rows.into_iter().map(ProgressEntry::from).collect();

    let average_rating = if progress_entries.is_empty() {
        0.0
    } else {
        let sum: i64 = progress_entries.iter().map(|e| e.performance_rating).sum();
        sum as f64 / progress_entries.len() as f64
    };

    Ok(ProgressSummary {
        total_lessons,
        completed_lessons,
        average_rating,
        progress_entries,
    })
}
