use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::api::MessageResponse;
use crate::auth::{Permission, Role, User};
use crate::db::{
    get_lesson, list_notifications, list_undelivered, mark_notification_read, unread_count,
};
use crate::error::AppError;
use crate::mailer::SharedMailer;
use crate::models::{Notification, OutboxEntry};
use crate::validation::{ApiResult, AppErrorExt, PermissionCheckExt, ToValidationResponse};
use crate::workflow;

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[get("/notifications")]
pub async fn api_list_notifications(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Notification>>, Status> {
    Ok(Json(list_notifications(db, &user.email).await?))
}

#[get("/notifications/unread-count")]
pub async fn api_unread_count(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UnreadCountResponse>, Status> {
    let unread_count = unread_count(db, &user.email).await?;

    Ok(Json(UnreadCountResponse { unread_count }))
}

#[put("/notifications/<id>/read")]
pub async fn api_mark_read(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<MessageResponse>> {
    let updated = mark_notification_read(db, id, &user.email)
        .await
        .validate_custom()?;

    if !updated {
        return Err(AppError::NotFound(format!("Notification with id {} not found", id))
            .to_validation_response());
    }

    Ok(Json(MessageResponse::new("Notification marked as read")))
}

#[post("/notifications/send-lesson-notification?<lesson_id>")]
pub async fn api_send_lesson_notification(
    lesson_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    mailer: &State<SharedMailer>,
) -> ApiResult<Json<MessageResponse>> {
    let lesson = get_lesson(db.inner(), lesson_id).await.validate_custom()?;

    let participant = match user.role {
        Role::Student => lesson.student_id == user.id,
        Role::Instructor => lesson.instructor_id == user.id,
        Role::Admin => true,
    };
    if !participant {
        return Err(Status::Forbidden.to_validation_response());
    }

    workflow::send_lesson_notification(db, mailer.inner().as_ref(), lesson_id)
        .await
        .validate_custom()?;

    Ok(Json(MessageResponse::new("Lesson notifications sent")))
}

#[get("/notifications/outbox")]
pub async fn api_outbox(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<OutboxEntry>>> {
    user.require_permission(Permission::ViewNotificationOutbox)
        .validate_custom()?;

    let entries = list_undelivered(db).await.validate_custom()?;

    Ok(Json(entries))
}
