use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Role, User};
use crate::db::{
    PendingJoinRequest, SchoolDetail, assign_instructor_to_school, create_school,
    get_school, get_school_detail, get_student, instructor_belongs_to_school, list_active_schools,
    list_pending_requests,
};
use crate::error::AppError;
use crate::models::{NewSchool, School, StudentSchoolStatus};
use crate::seed::{SeedOutcome, seed_schools};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt};

#[derive(Debug, Serialize)]
pub struct MySchoolResponse {
    pub school: Option<School>,
    pub status: String,
}

fn school_status_label(status: Option<StudentSchoolStatus>) -> String {
    match status {
        Some(StudentSchoolStatus::Approved) => "approved",
        Some(StudentSchoolStatus::Suspended) => "suspended",
        Some(StudentSchoolStatus::Pending) | None => "pending",
    }
    .to_string()
}

#[get("/schools")]
pub async fn api_list_schools(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<School>>, Status> {
    Ok(Json(list_active_schools(db).await?))
}

#[post("/schools", data = "<school>")]
pub async fn api_create_school(
    school: Json<NewSchool>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<School>> {
    user.require_permission(Permission::ManageSchools)
        .validate_custom()?;
    let validated = school.validate_custom()?;

    let created = create_school(db, &validated).await.validate_custom()?;

    Ok(Json(created))
}

#[post("/schools/seed")]
pub async fn api_seed_schools(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SeedOutcome>, Status> {
    user.require_permission(Permission::ManageSchools)?;

    Ok(Json(seed_schools(db).await?))
}

#[get("/schools/my-school")]
pub async fn api_my_school(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MySchoolResponse>, Status> {
    if user.role != Role::Student {
        return Err(Status::Forbidden);
    }

    let student = get_student(db.inner(), user.id).await?;

    let Some(school_id) = student.school_id else {
        return Ok(Json(MySchoolResponse {
            school: None,
            status: "no_school".to_string(),
        }));
    };

    match get_school(db.inner(), school_id).await {
        Ok(school) => Ok(Json(MySchoolResponse {
            school: Some(school),
            status: school_status_label(student.school_status),
        })),
        Err(AppError::NotFound(_)) => Ok(Json(MySchoolResponse {
            school: None,
            status: "school_not_found".to_string(),
        })),
        Err(err) => Err(err.into()),
    }
}

#[get("/schools/<id>")]
pub async fn api_get_school(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SchoolDetail>, Status> {
    Ok(Json(get_school_detail(db, id).await?))
}

#[get("/schools/<id>/requests")]
pub async fn api_school_requests(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<PendingJoinRequest>>, Status> {
    user.require_permission(Permission::ReviewSchoolRequests)?;

    if user.role == Role::Instructor
        && !instructor_belongs_to_school(db.inner(), id, user.id).await?
    {
        return Err(Status::Forbidden);
    }

    Ok(Json(list_pending_requests(db, id).await?))
}

#[post("/schools/<id>/instructors/<instructor_id>")]
pub async fn api_assign_instructor(
    id: i64,
    instructor_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<School>, Status> {
    user.require_permission(Permission::ManageSchools)?;

    Ok(Json(assign_instructor_to_school(db, id, instructor_id).await?))
}
