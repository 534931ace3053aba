use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::api::booking::rejection_reason;
use crate::auth::{Permission, User};
use crate::db::{PendingLesson, pending_lessons_for_instructor};
use crate::models::Booking;
use crate::validation::{ApiResult, AppErrorExt, PermissionCheckExt};
use crate::workflow;

#[get("/instructor/pending-lessons")]
pub async fn api_pending_lessons(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<PendingLesson>>, Status> {
    user.require_permission(Permission::RespondToLessons)?;

    Ok(Json(pending_lessons_for_instructor(db, user.id).await?))
}

#[put("/instructor/lessons/<id>/accept")]
pub async fn api_accept_lesson(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Booking>> {
    user.require_permission(Permission::RespondToLessons)
        .validate_custom()?;

    let booking_id = workflow::booking_id_for_lesson(db, id)
        .await
        .validate_custom()?;
    let booking = workflow::accept_lesson(db, &user, booking_id)
        .await
        .validate_custom()?;

    Ok(Json(booking))
}

#[put("/instructor/lessons/<id>/reject?<reason>")]
pub async fn api_reject_lesson(
    id: i64,
    reason: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Booking>> {
    user.require_permission(Permission::RespondToLessons)
        .validate_custom()?;

    let reason = rejection_reason(reason);
    let booking_id = workflow::booking_id_for_lesson(db, id)
        .await
        .validate_custom()?;
    let booking = workflow::reject_lesson(db, &user, booking_id, &reason)
        .await
        .validate_custom()?;

    Ok(Json(booking))
}
