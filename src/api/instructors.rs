use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Role, User};
use crate::db::{InstructorUpdate, get_instructor, list_instructors, update_instructor_profile};
use crate::models::Instructor;
use crate::validation::{
    ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt, ToValidationResponse,
};

// Public directory; `Instructor` carries no credential fields.
#[get("/instructors")]
pub async fn api_list_instructors(
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Instructor>>, Status> {
    Ok(Json(list_instructors(db).await?))
}

#[get("/instructors/me")]
pub async fn api_get_my_profile(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Instructor>, Status> {
    if user.role != Role::Instructor {
        return Err(Status::Forbidden);
    }

    Ok(Json(get_instructor(db.inner(), user.id).await?))
}

#[put("/instructors/me", data = "<update>")]
pub async fn api_update_my_profile(
    update: Json<InstructorUpdate>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Instructor>> {
    if user.role != Role::Instructor {
        return Err(Status::Forbidden.to_validation_response());
    }
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;
    let validated = update.validate_custom()?;

    let instructor = update_instructor_profile(db, &user.email, &validated)
        .await
        .validate_custom()?;

    Ok(Json(instructor))
}
