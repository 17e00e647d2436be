use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    DeadlineFields, create_result_deadline, delete_result_deadline, list_result_deadlines,
    update_result_deadline,
};
use crate::models::ResultDeadline;
use crate::validation::{ApiResult, JsonValidateExt};

#[get("/result-deadlines?<session_id>&<class_id>")]
pub async fn api_list_deadlines(
    session_id: Option<i64>,
    class_id: Option<i64>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<ResultDeadline>>> {
    Ok(Json(list_result_deadlines(db, session_id, class_id).await?))
}

#[derive(Deserialize, Validate)]
pub struct DeadlineRequest {
    session_id: i64,
    class_id: Option<i64>,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    title: String,
    deadline: NaiveDate,
}

impl From<DeadlineRequest> for DeadlineFields {
    fn from(req: DeadlineRequest) -> Self {
        Self {
            session_id: req.session_id,
            class_id: req.class_id,
            title: req.title.trim().to_string(),
            deadline: req.deadline,
        }
    }
}

#[post("/result-deadlines", data = "<request>")]
pub async fn api_create_deadline(
    request: Json<DeadlineRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<ResultDeadline>>> {
    user.require_permission(db, Permission::ManageResultDeadlines)
        .await?;
    let fields = DeadlineFields::from(request.validate_custom()?);

    Ok(Custom(
        Status::Created,
        Json(create_result_deadline(db, &fields, user.id).await?),
    ))
}

#[put("/result-deadlines/<id>", data = "<request>")]
pub async fn api_update_deadline(
    id: i64,
    request: Json<DeadlineRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<ResultDeadline>> {
    user.require_permission(db, Permission::ManageResultDeadlines)
        .await?;
    let fields = DeadlineFields::from(request.validate_custom()?);

    Ok(Json(update_result_deadline(db, id, &fields).await?))
}

#[delete("/result-deadlines/<id>")]
pub async fn api_delete_deadline(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(db, Permission::ManageResultDeadlines)
        .await?;

    delete_result_deadline(db, id).await?;

    Ok(Status::NoContent)
}
