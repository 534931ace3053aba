use chrono::{NaiveDateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use rocket::http::Status;
use serde::Serialize;
use uuid::Uuid;

use super::{Permission, Role};
use crate::error::AppError;

/// The authenticated principal behind a request.
///
/// Students, instructors, and admins live in separate tables; `id` is the row id
/// in the table that matches `role`.
#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub display_name: String,
}

impl User {
    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub token: String,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: NaiveDateTime,
}

impl TryFrom<DbUserSession> for UserSession {
    type Error = AppError;

    fn try_from(session: DbUserSession) -> Result<Self, Self::Error> {
        let role = Role::parse(&session.role)
            .map_err(|e| AppError::Internal(format!("Corrupt session role: {}", e)))?;

        Ok(Self {
            id: session.id,
            email: session.email,
            role,
            token: session.token,
            created_at: session.created_at,
            expires_at: session.expires_at,
        })
    }
}

impl UserSession {
    pub fn generate_token() -> String {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        format!("{}{}", Uuid::new_v4().simple(), suffix)
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}
