#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod mailer;
mod models;
mod scheduling;
mod seed;
mod telemetry;
mod validation;
mod workflow;
#[cfg(test)]
mod test;

use std::sync::Arc;
use std::time::Duration;

use auth::{forbidden_api, unauthorized_api};
use db::{clean_expired_sessions, create_admin, dispatch_pending};
use env::{AppConfig, load_environment};
use error::AppError;
use mailer::{LogMailer, SharedMailer};
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::info;

const DB_MAX_CONNECTIONS: u32 = 8;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

#[launch]
async fn rocket() -> _ {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    let telemetry_guard = init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match prepare_database(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database startup failed: {}", e);
            std::process::exit(1);
        }
    };

    spawn_session_cleanup(pool.clone());
    spawn_outbox_dispatcher(pool.clone(), &config);

    let mailer: SharedMailer = Arc::new(LogMailer::new(config.mail_from.clone()));
    let rocket = init_rocket(pool, config, mailer).await;

    // Managed so the exporter is flushed when Rocket shuts down.
    match telemetry_guard {
        Some(guard) => rocket.manage(guard),
        None => rocket,
    }
}

async fn prepare_database(config: &AppConfig) -> Result<SqlitePool, Error> {
    let pool = db::connect(&config.database_url, DB_MAX_CONNECTIONS).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        match create_admin(&pool, email, password, "Administrator").await {
            Ok(id) => info!(admin_id = id, "Bootstrapped admin account"),
            Err(AppError::Conflict(_)) => info!("Admin account already present"),
            Err(e) => return Err(e.into()),
        }
    }

    if config.seed_schools {
        let outcome = seed::seed_schools(&pool).await?;
        info!(created = outcome.created, "School seeding finished");
    }

    Ok(pool)
}

fn spawn_session_cleanup(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    });
}

fn spawn_outbox_dispatcher(pool: SqlitePool, config: &AppConfig) {
    let interval = Duration::from_secs(config.outbox_poll_secs);
    let batch = config.outbox_batch_size;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match dispatch_pending(&pool, batch).await {
                Ok(report) => {
                    if report.delivered > 0 || report.failed > 0 {
                        info!(
                            delivered = report.delivered,
                            failed = report.failed,
                            "Outbox dispatch pass finished"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!("Outbox dispatch failed: {}", e);
                }
            }
        }
    });
}

pub async fn init_rocket(
    pool: SqlitePool,
    config: AppConfig,
    mailer: SharedMailer,
) -> Rocket<Build> {
    info!("Starting driving school platform");

    rocket::build()
        .manage(pool)
        .manage(config)
        .manage(mailer)
        .mount("/api", api::routes())
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .attach(TelemetryFairing)
}
