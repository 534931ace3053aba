use chrono::NaiveDateTime;
use rocket::State;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::scheduling::{instructor_available_slots, parse_date};
use crate::validation::{ApiResult, AppErrorExt};

#[derive(Debug, Serialize)]
pub struct AvailableSlotsResponse {
    pub available_slots: Vec<NaiveDateTime>,
}

#[get("/scheduling/available-slots?<instructor_id>&<date>")]
pub async fn api_available_slots(
    instructor_id: i64,
    date: &str,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<AvailableSlotsResponse>> {
    let date = parse_date(date).validate_custom()?;

    let available_slots = instructor_available_slots(db, instructor_id, date)
        .await
        .validate_custom()?;

    Ok(Json(AvailableSlotsResponse { available_slots }))
}
