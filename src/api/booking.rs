use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::list_bookings_for_user;
use crate::models::Booking;
use crate::validation::{ApiResult, AppErrorExt};
use crate::workflow::{
    self, DEFAULT_REJECTION_REASON, LessonBooking, LessonRequest, SchoolJoinRequest,
};

pub(crate) fn rejection_reason(reason: Option<String>) -> String {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string())
}

#[post("/booking/school/join", data = "<request>")]
pub async fn api_request_school_join(
    request: Json<SchoolJoinRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Booking>> {
    let booking = workflow::request_school_join(db, &user, &request)
        .await
        .validate_custom()?;

    Ok(Json(booking))
}

#[put("/booking/school/<id>/approve")]
pub async fn api_approve_school_join(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Booking>> {
    let booking = workflow::approve_school_join(db, &user, id)
        .await
        .validate_custom()?;

    Ok(Json(booking))
}

#[put("/booking/school/<id>/reject?<reason>")]
pub async fn api_reject_school_join(
    id: i64,
    reason: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Booking>> {
    let reason = rejection_reason(reason);
    let booking = workflow::reject_school_join(db, &user, id, &reason)
        .await
        .validate_custom()?;

    Ok(Json(booking))
}

#[post("/booking/lesson", data = "<request>")]
pub async fn api_request_lesson(
    request: Json<LessonRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<LessonBooking>> {
    let booked = workflow::request_lesson(db, &user, &request)
        .await
        .validate_custom()?;

    Ok(Json(booked))
}

#[put("/booking/lesson/<id>/accept")]
pub async fn api_accept_lesson(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Booking>> {
    let booking = workflow::accept_lesson(db, &user, id)
        .await
        .validate_custom()?;

    Ok(Json(booking))
}

#[put("/booking/lesson/<id>/reject?<reason>")]
pub async fn api_reject_lesson(
    id: i64,
    reason: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Booking>> {
    let reason = rejection_reason(reason);
    let booking = workflow::reject_lesson(db, &user, id, &reason)
        .await
        .validate_custom()?;

    Ok(Json(booking))
}

#[get("/booking/my-requests")]
pub async fn api_my_requests(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Booking>>, Status> {
    Ok(Json(list_bookings_for_user(db, &user).await?))
}
