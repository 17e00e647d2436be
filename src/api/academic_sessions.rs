use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    activate_academic_session, create_academic_session, delete_academic_session,
    get_academic_session, get_active_session, list_academic_sessions,
};
use crate::models::AcademicSession;
use crate::validation::{ApiResult, JsonValidateExt};

#[get("/sessions")]
pub async fn api_list_sessions(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<AcademicSession>>> {
    Ok(Json(list_academic_sessions(db).await?))
}

/// `null` when no session is active.
#[get("/sessions/active")]
pub async fn api_active_session(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Option<AcademicSession>>> {
    Ok(Json(get_active_session(db).await?))
}

#[derive(Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[post("/sessions", data = "<request>")]
pub async fn api_create_session(
    request: Json<CreateSessionRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<AcademicSession>>> {
    user.require_permission(db, Permission::ManageSessions).await?;
    let validated = request.validate_custom()?;

    let id = create_academic_session(
        db,
        validated.name.trim(),
        validated.start_date,
        validated.end_date,
    )
    .await?;

    Ok(Custom(
        Status::Created,
        Json(get_academic_session(db, id).await?),
    ))
}

#[post("/sessions/<id>/activate")]
pub async fn api_activate_session(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<AcademicSession>> {
    user.require_permission(db, Permission::ManageSessions).await?;

    Ok(Json(activate_academic_session(db, id).await?))
}

#[delete("/sessions/<id>")]
pub async fn api_delete_session(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(db, Permission::ManageSessions).await?;

    delete_academic_session(db, id).await?;

    Ok(Status::NoContent)
}
