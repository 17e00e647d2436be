use rocket::State;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    PromotionReport, get_student, list_promotions_for_student, promote_class, promote_students,
};
use crate::models::Promotion;
use crate::validation::{ApiResult, JsonValidateExt};

use super::ensure_student_visible;

#[derive(Deserialize, Validate)]
pub struct PromoteStudentsRequest {
    #[validate(length(min = 1, max = 500, message = "Between 1 and 500 students per request"))]
    student_ids: Vec<i64>,
    to_session_id: i64,
}

/// Per-student failures come back in `errors`; the request itself still
/// succeeds for everyone else.
#[post("/promotions", data = "<request>")]
pub async fn api_promote_students(
    request: Json<PromoteStudentsRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<PromotionReport>> {
    user.require_permission(db, Permission::PromoteStudents).await?;
    let validated = request.validate_custom()?;

    let report = promote_students(db, &validated.student_ids, validated.to_session_id, user.id)
        .await?;

    Ok(Json(report))
}

#[derive(Deserialize)]
pub struct PromoteClassRequest {
    to_session_id: i64,
}

#[post("/classes/<class_id>/promote", data = "<request>")]
pub async fn api_promote_class(
    class_id: i64,
    request: Json<PromoteClassRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<PromotionReport>> {
    user.require_permission(db, Permission::PromoteStudents).await?;

    Ok(Json(
        promote_class(db, class_id, request.to_session_id, user.id).await?,
    ))
}

#[get("/students/<id>/promotions")]
pub async fn api_student_promotions(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Promotion>>> {
    let student = get_student(db, id).await?;
    ensure_student_visible(db, &user, &student).await?;

    Ok(Json(list_promotions_for_student(db, id).await?))
}
