use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Role, User};
use crate::db::{StudentUpdate, get_student, list_students, update_student_profile};
use crate::models::Student;
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt};

fn require_student(user: &User) -> Result<(), Status> {
    if user.role == Role::Student {
        Ok(())
    } else {
        Err(Status::Forbidden)
    }
}

#[get("/students/me")]
pub async fn api_get_my_profile(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Student>, Status> {
    require_student(&user)?;

    Ok(Json(get_student(db.inner(), user.id).await?))
}

#[put("/students/me", data = "<update>")]
pub async fn api_update_my_profile(
    update: Json<StudentUpdate>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Student>> {
    require_student(&user).validate_custom()?;
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;
    let validated = update.validate_custom()?;

    let student = update_student_profile(db, &user.email, &validated)
        .await
        .validate_custom()?;

    Ok(Json(student))
}

#[get("/students")]
pub async fn api_list_students(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Student>>, Status> {
    user.require_permission(Permission::ViewAllStudents)?;

    Ok(Json(list_students(db).await?))
}
