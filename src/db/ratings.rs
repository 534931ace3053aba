use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Rating, RatingSummary};

pub const DEFAULT_RATING: i64 = 5;

#[derive(Debug, Clone)]
pub struct NewRating {
    pub student_id: i64,
    pub instructor_id: i64,
    pub lesson_id: Option<i64>,
    pub rating: i64,
    pub comment: String,
}

/// Stores the rating and recomputes the instructor's aggregate from every rating
/// they have received, all in one transaction.
#[instrument(skip(pool, rating), fields(instructor_id = rating.instructor_id, student_id = rating.student_id))]
pub async fn rate_instructor(
    pool: &Pool<Sqlite>,
    rating: &NewRating,
) -> Result<RatingSummary, AppError> {
    info!("Rating instructor");

    if !(1..=5).contains(&rating.rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let mut tx = super::begin_write(pool).await?;

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM instructors WHERE id = ?")
        .bind(rating.instructor_id)
        .fetch_one(&mut *tx)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound(format!(
            "Instructor with id {} not found",
            rating.instructor_id
        )));
    }

    sqlx::query(
        "INSERT INTO ratings (student_id, instructor_id, lesson_id, rating, comment, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(rating.student_id)
    .bind(rating.instructor_id)
    .bind(rating.lesson_id)
    .bind(rating.rating)
    .bind(&rating.comment)
    .bind(Utc::now().naive_utc())
    .execute(&mut *tx)
    .await?;

    let (average_rating, total_ratings): (f64, i64) = sqlx::query_as(
        "SELECT ROUND(AVG(rating), 2), COUNT(*) FROM ratings WHERE instructor_id = ?",
    )
    .bind(rating.instructor_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE instructors SET average_rating = ?, total_ratings = ?, updated_at = ? WHERE id = ?",
    )
    .bind(average_rating)
    .bind(total_ratings)
    .bind(Utc::now().naive_utc())
    .bind(rating.instructor_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(RatingSummary {
        average_rating,
        total_ratings,
    })
}

#[instrument(skip(pool))]
pub async fn list_ratings(
    pool: &Pool<Sqlite>,
    instructor_id: i64,
) -> Result<Vec<Rating>, AppError> {
    info!("Listing instructor ratings");

    let ratings = sqlx::query_as::<_, Rating>(
        "SELECT r.id, r.student_id, r.instructor_id, r.lesson_id, r.rating, r.comment,
                s.first_name || ' ' || s.last_name AS student_name, r.created_at
         FROM ratings r
         JOIN students s ON s.id = r.student_id
         WHERE r.instructor_id = ?
         ORDER BY r.created_at DESC, r.id DESC",
    )
    .bind(instructor_id)
    .fetch_all(pool)
    .await?;

    Ok(ratings)
}
