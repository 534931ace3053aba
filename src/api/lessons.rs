use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::api::booking::rejection_reason;
use crate::auth::User;
use crate::db::{LessonView, lessons_for_user, upcoming_lessons};
use crate::models::Lesson;
use crate::validation::{ApiResult, AppErrorExt};
use crate::workflow;

#[get("/lessons/upcoming")]
pub async fn api_upcoming_lessons(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<LessonView>>, Status> {
    Ok(Json(upcoming_lessons(db, &user).await?))
}

#[get("/lessons/my-lessons")]
pub async fn api_my_lessons(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<LessonView>>, Status> {
    Ok(Json(lessons_for_user(db, &user).await?))
}

#[put("/lessons/<id>/complete")]
pub async fn api_complete_lesson(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Lesson>> {
    let lesson = workflow::complete_lesson(db, &user, id)
        .await
        .validate_custom()?;

    Ok(Json(lesson))
}

#[put("/lessons/<id>/cancel?<reason>")]
pub async fn api_cancel_lesson(
    id: i64,
    reason: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Lesson>> {
    let reason = rejection_reason(reason);
    let lesson = workflow::cancel_lesson(db, &user, id, &reason)
        .await
        .validate_custom()?;

    Ok(Json(lesson))
}
