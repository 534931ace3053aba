use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::error;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[get("/health")]
pub async fn health(db: &State<Pool<Sqlite>>) -> Custom<Json<HealthResponse>> {
    match sqlx::query("SELECT 1").execute(db.inner()).await {
        Ok(_) => Custom(
            Status::Ok,
            Json(HealthResponse {
                status: "healthy",
                database: "connected",
            }),
        ),
        Err(err) => {
            error!(error = %err, "Database health check failed");
            Custom(
                Status::ServiceUnavailable,
                Json(HealthResponse {
                    status: "unhealthy",
                    database: "disconnected",
                }),
            )
        }
    }
}
