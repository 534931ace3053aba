use chrono::Utc;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::api::MessageResponse;
use crate::auth::{Role, SESSION_COOKIE, User, UserSession};
use crate::db::{
    NewInstructor, NewStudent, authenticate_user, create_instructor, create_student,
    create_user_session, find_identity, invalidate_session, normalize_email,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::validation::{
    AppErrorExt, JsonValidateExt, ValidationResponse, validate_password, validate_phone,
};

const DEFAULT_HOURLY_RATE: f64 = 50.0;

fn default_user_type() -> String {
    "student".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[serde(default = "default_user_type")]
    pub user_type: String,
    pub emergency_contact: Option<String>,
    pub license_number: Option<String>,
    #[validate(range(min = 0.0, message = "Hourly rate cannot be negative"))]
    pub hourly_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub expires_at: String,
}

async fn start_session(
    db: &Pool<Sqlite>,
    cookies: &CookieJar<'_>,
    config: &AppConfig,
    user: &User,
) -> Result<String, AppError> {
    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(config.session_ttl_hours);

    create_user_session(db, &user.email, user.role, &token, expires_at.naive_utc()).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::hours(config.session_ttl_hours));
    cookies.add_private(cookie);

    Ok(expires_at.to_rfc3339())
}

#[post("/auth/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegisterRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Custom<Json<AuthResponse>>, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    let role = match validated.user_type.as_str() {
        "student" => Role::Student,
        "instructor" => Role::Instructor,
        _ => {
            return Err(Custom(
                Status::UnprocessableEntity,
                Json(ValidationResponse::with_error(
                    "user_type",
                    "User type must be student or instructor",
                )),
            ));
        }
    };

    match role {
        Role::Instructor => {
            create_instructor(
                db,
                &NewInstructor {
                    email: validated.email.clone(),
                    password: validated.password.clone(),
                    first_name: validated.first_name.clone(),
                    last_name: validated.last_name.clone(),
                    phone: validated.phone.clone(),
                    license_number: validated.license_number.clone().unwrap_or_default(),
                    hourly_rate: validated.hourly_rate.unwrap_or(DEFAULT_HOURLY_RATE),
                },
            )
            .await
            .validate_custom()?;
        }
        _ => {
            create_student(
                db,
                &NewStudent {
                    email: validated.email.clone(),
                    password: validated.password.clone(),
                    first_name: validated.first_name.clone(),
                    last_name: validated.last_name.clone(),
                    phone: validated.phone.clone(),
                    emergency_contact: validated
                        .emergency_contact
                        .clone()
                        .unwrap_or_else(|| validated.phone.clone()),
                },
            )
            .await
            .validate_custom()?;
        }
    }

    let user = find_identity(db, role, &normalize_email(&validated.email))
        .await
        .validate_custom()?
        .ok_or_else(|| AppError::Internal("Registered account not found".to_string()))
        .validate_custom()?;

    let expires_at = start_session(db, cookies, config, &user)
        .await
        .validate_custom()?;

    info!(email = %user.email, role = %user.role, "Registered new account");
    Ok(Custom(
        Status::Created,
        Json(AuthResponse { user, expires_at }),
    ))
}

#[post("/auth/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<AuthResponse>, Custom<Json<ValidationResponse>>> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let expires_at = start_session(db, cookies, config, &user)
                .await
                .validate_custom()?;

            Ok(Json(AuthResponse { user, expires_at }))
        }
        None => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "credentials",
                "Invalid email or password",
            )),
        )),
    }
}

#[post("/auth/logout")]
pub async fn api_logout(
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Json<MessageResponse> {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Logout session invalidation");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Json(MessageResponse::new("Logged out"))
}

#[get("/auth/me")]
pub async fn api_me(user: User) -> Json<User> {
    Json(user)
}
