use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{get_conversation, list_conversations, normalize_email, send_message};
use crate::models::{Conversation, Message};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt};

fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(email(message = "Invalid receiver email"))]
    pub receiver_email: String,
    #[validate(length(min = 1, max = 2000, message = "Message cannot be empty"))]
    pub message: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
}

#[post("/chat/send", data = "<request>")]
pub async fn api_send_message(
    request: Json<SendMessageRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Message>> {
    user.require_permission(Permission::SendMessages)
        .validate_custom()?;
    let request = request.validate_custom()?;

    let message = send_message(
        db,
        &user.email,
        &normalize_email(&request.receiver_email),
        &request.message,
        &request.message_type,
    )
    .await
    .validate_custom()?;

    Ok(Json(message))
}

#[get("/chat/conversations")]
pub async fn api_conversations(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Conversation>>, Status> {
    Ok(Json(list_conversations(db, &user.email).await?))
}

#[get("/chat/messages/<email>")]
pub async fn api_messages(
    email: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Message>>, Status> {
    let partner = normalize_email(email);

    Ok(Json(get_conversation(db, &user.email, &partner).await?))
}
