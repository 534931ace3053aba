use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Role, User};
use crate::db::{NewProgressNotes, add_lesson_notes, progress_summary};
use crate::models::{ProgressEntry, ProgressSummary};
use crate::validation::{ApiResult, AppErrorExt, PermissionCheckExt};

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl From<NotesRequest> for NewProgressNotes {
    fn from(request: NotesRequest) -> Self {
        Self {
            notes: request.notes,
            performance_rating: request.rating,
            skills_practiced: request.skills,
            areas_to_improve: request.improvements,
        }
    }
}

#[post("/progress/lessons/<id>/notes", data = "<request>")]
pub async fn api_add_lesson_notes(
    id: i64,
    request: Json<NotesRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<ProgressEntry>> {
    user.require_permission(Permission::AddLessonNotes)
        .validate_custom()?;

    let notes = NewProgressNotes::from(request.into_inner());
    let entry = add_lesson_notes(db, user.id, &user.email, id, &notes)
        .await
        .validate_custom()?;

    Ok(Json(entry))
}

#[get("/progress/me")]
pub async fn api_my_progress(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressSummary>, Status> {
    user.require_permission(Permission::ViewOwnProgress)?;

    Ok(Json(progress_summary(db, user.id).await?))
}

#[get("/progress/student/<id>")]
pub async fn api_student_progress(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressSummary>, Status> {
    let own = user.role == Role::Student && user.id == id;
    if !own {
        user.require_permission(Permission::ViewStudentProgress)?;
    }

    Ok(Json(progress_summary(db, id).await?))
}
