use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{get_feedback, list_feedback, respond_to_feedback, submit_feedback};
use crate::error::AppError;
use crate::models::{Feedback, FeedbackStatus};
use crate::validation::{ApiResult, JsonValidateExt};

#[derive(Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    subject: String,
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    message: String,
}

#[post("/feedback", data = "<request>")]
pub async fn api_submit_feedback(
    request: Json<FeedbackRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Feedback>>> {
    let validated = request.validate_custom()?;

    let id = submit_feedback(db, user.id, validated.subject.trim(), &validated.message).await?;

    Ok(Custom(Status::Created, Json(get_feedback(db, id).await?)))
}

/// Responders see everything; everyone else sees their own submissions.
#[get("/feedback?<status>")]
pub async fn api_list_feedback(
    status: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Feedback>>> {
    let status = match status {
        Some("open") => Some(FeedbackStatus::Open),
        Some("responded") => Some(FeedbackStatus::Responded),
        Some(other) => {
            return Err(AppError::Validation(format!(
                "status: unknown feedback status '{}'",
                other
            ))
            .into());
        }
        None => None,
    };

    let submitted_by = if user.has_permission(db, Permission::RespondFeedback).await? {
        None
    } else {
        Some(user.id)
    };

    Ok(Json(list_feedback(db, submitted_by, status).await?))
}

#[derive(Deserialize, Validate)]
pub struct FeedbackResponseRequest {
    #[validate(length(min = 1, max = 5000, message = "Response must be 1-5000 characters"))]
    response: String,
}

#[post("/feedback/<id>/respond", data = "<request>")]
pub async fn api_respond_feedback(
    id: i64,
    request: Json<FeedbackResponseRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Feedback>> {
    user.require_permission(db, Permission::RespondFeedback).await?;
    let validated = request.validate_custom()?;

    Ok(Json(
        respond_to_feedback(db, id, user.id, &validated.response).await?,
    ))
}
