use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::db::{DEFAULT_RATING, NewRating, list_ratings, rate_instructor};
use crate::models::{Rating, RatingSummary};
use crate::validation::{ApiResult, AppErrorExt, PermissionCheckExt};

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: String,
    pub lesson_id: Option<i64>,
}

#[post("/ratings/instructor/<id>", data = "<request>")]
pub async fn api_rate_instructor(
    id: i64,
    request: Json<RateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<RatingSummary>> {
    user.require_permission(Permission::RateInstructors)
        .validate_custom()?;

    let request = request.into_inner();
    let rating = NewRating {
        student_id: user.id,
        instructor_id: id,
        lesson_id: request.lesson_id,
        rating: request.rating.unwrap_or(DEFAULT_RATING),
        comment: request.comment,
    };

    let summary = rate_instructor(db, &rating).await.validate_custom()?;

    Ok(Json(summary))
}

#[get("/ratings/instructor/<id>")]
pub async fn api_list_ratings(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Rating>>, Status> {
    Ok(Json(list_ratings(db, id).await?))
}
