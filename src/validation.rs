use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::{Validate, ValidationError};

use crate::error::AppError;

static PASSWORD_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").expect("valid regex"));
static PASSWORD_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").expect("valid regex"));
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9\s\-().]{6,19}$").expect("valid regex"));

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub type ApiResult<T> = Result<T, Custom<Json<ValidationResponse>>>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH
        || !PASSWORD_LETTER.is_match(password)
        || !PASSWORD_DIGIT.is_match(password)
    {
        let mut error = ValidationError::new("password_strength");
        error.message = Some(Cow::Borrowed(
            "Password must be at least 8 characters and contain a letter and a digit",
        ));
        return Err(error);
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() || PHONE.is_match(phone) {
        return Ok(());
    }

    let mut error = ValidationError::new("phone_format");
    error.message = Some(Cow::Borrowed("Invalid phone number"));
    Err(error)
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(_) => ("database", "Database error".to_string()),
            AppError::Authentication(msg) => ("authentication", msg.clone()),
            AppError::Authorization(msg) => ("authorization", msg.clone()),
            AppError::NotFound(msg) => ("resource", msg.clone()),
            AppError::Conflict(msg) => ("conflict", msg.clone()),
            AppError::Validation(msg) => ("request", msg.clone()),
            AppError::ExternalService(msg) => ("service", format!("Service error: {}", msg)),
            AppError::Internal(_) => ("server", "Internal server error".to_string()),
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self.code {
            403 => (
                "permission",
                "You don't have permission to perform this action",
            ),
            401 => ("authentication", "Authentication required"),
            404 => ("resource", "Resource not found"),
            409 => ("resource", "Resource already exists"),
            400 => ("request", "Bad request"),
            422 => ("validation", "Validation failed"),
            500 => ("server", "Internal server error"),
            503 => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

impl ToValidationResponse for validator::ValidationErrors {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let mut error_map = HashMap::new();

        for (field, field_errors) in self.field_errors() {
            let error_messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            error_map.insert(field.to_string(), error_messages);
        }

        Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::new(error_map)),
        )
    }
}

/// Runs the `validator` rules of a JSON body and unwraps it.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> ApiResult<T> {
        let inner = self.into_inner();
        inner
            .validate()
            .map_err(ToValidationResponse::to_validation_response)?;
        Ok(inner)
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> ApiResult<T> {
        self.map_err(ToValidationResponse::to_validation_response)
    }
}

pub trait PermissionCheckExt {
    fn validate_custom(self) -> ApiResult<()>;
}

impl PermissionCheckExt for Result<(), Status> {
    fn validate_custom(self) -> ApiResult<()> {
        self.map_err(ToValidationResponse::to_validation_response)
    }
}
