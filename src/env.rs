use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::AppError;

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Runtime settings that are not part of Rocket's own figment config.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub outbox_poll_secs: u64,
    pub outbox_batch_size: i64,
    pub seed_schools: bool,
    pub mail_from: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://driving_school.db?mode=rwc".to_string(),
            session_ttl_hours: 1,
            outbox_poll_secs: 30,
            outbox_batch_size: 50,
            seed_schools: false,
            mail_from: "noreply@drivingschool.com".to_string(),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let config = Self {
            database_url: dotenvy::var("DATABASE_URL").unwrap_or(defaults.database_url),
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            outbox_poll_secs: parse_var("OUTBOX_POLL_SECS", defaults.outbox_poll_secs)?,
            outbox_batch_size: parse_var("OUTBOX_BATCH_SIZE", defaults.outbox_batch_size)?,
            seed_schools: parse_var("SEED_SCHOOLS", defaults.seed_schools)?,
            mail_from: dotenvy::var("MAIL_FROM").unwrap_or(defaults.mail_from),
            admin_email: optional_var("ADMIN_EMAIL"),
            admin_password: optional_var("ADMIN_PASSWORD"),
        };

        if config.session_ttl_hours <= 0 {
            return Err(AppError::Validation(
                "SESSION_TTL_HOURS must be positive".to_string(),
            ));
        }

        if config.outbox_poll_secs == 0 || config.outbox_batch_size <= 0 {
            return Err(AppError::Validation(
                "Outbox polling interval and batch size must be positive".to_string(),
            ));
        }

        if config.admin_email.is_some() && config.admin_password.is_none() {
            return Err(AppError::Validation(
                "ADMIN_PASSWORD is required when ADMIN_EMAIL is set".to_string(),
            ));
        }

        Ok(config)
    }
}

fn optional_var(name: &str) -> Option<String> {
    dotenvy::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match dotenvy::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Validation(format!("Invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
