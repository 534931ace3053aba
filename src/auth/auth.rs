use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::db::{find_identity, get_session_by_token};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let token = request
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let session = match get_session_by_token(db, &token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid session token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        if !session.is_valid() {
            tracing::warn!(email = %session.email, "Session token expired");
            return Outcome::Error((Status::Unauthorized, ()));
        }

        match find_identity(db, session.role, &session.email).await {
            Ok(Some(user)) => {
                tracing::info!(email = %user.email, role = %user.role.as_str(), "User authenticated via session token");
                Outcome::Success(user)
            }
            Ok(None) => {
                tracing::warn!(email = %session.email, "Session refers to a missing account");
                Outcome::Error((Status::Unauthorized, ()))
            }
            Err(err) => {
                tracing::error!(email = %session.email, error = ?err, "Failed to fetch user for valid session");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    tracing::warn!("Unauthorized access attempt");
    Custom(
        Status::Unauthorized,
        Json(json!({
            "error": "Unauthorized",
            "message": "Authentication required"
        })),
    )
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::Forbidden,
        Json(json!({
            "error": "Forbidden",
            "message": "You don't have permission to perform this action"
        })),
    )
}
