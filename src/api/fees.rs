use chrono::{NaiveDate, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    NewFeeStructure, NewPayment, collection_summary, create_fee_structure, get_active_session,
    get_fee_structure, get_student, list_fee_structures, list_payments_for_student,
    record_payment, student_fee_summary,
};
use crate::error::AppError;
use crate::models::{ClassCollection, FeePayment, FeeStructure, PaymentMethod, StudentFeeSummary};
use crate::validation::{ApiResult, JsonValidateExt};

/// Students and parents may look at their own fees; anyone else needs
/// `view_fees`.
async fn ensure_fees_visible(
    db: &Pool<Sqlite>,
    user: &User,
    student_id: i64,
) -> Result<(), AppError> {
    let student = get_student(db, student_id).await?;
    if student.user_id == Some(user.id) || student.parent_id == Some(user.id) {
        return Ok(());
    }
    user.require_permission(db, Permission::ViewFees).await
}

#[get("/fees/structures?<session_id>&<class_id>")]
pub async fn api_list_fee_structures(
    session_id: Option<i64>,
    class_id: Option<i64>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<FeeStructure>>> {
    Ok(Json(list_fee_structures(db, session_id, class_id).await?))
}

#[derive(Deserialize, Validate)]
pub struct FeeStructureRequest {
    class_id: i64,
    session_id: i64,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: String,
    #[validate(range(min = 1, message = "Amount must be positive"))]
    amount_cents: i64,
    due_date: Option<NaiveDate>,
}

#[post("/fees/structures", data = "<request>")]
pub async fn api_create_fee_structure(
    request: Json<FeeStructureRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<FeeStructure>>> {
    user.require_permission(db, Permission::CollectFees).await?;
    let validated = request.validate_custom()?;

    let id = create_fee_structure(
        db,
        &NewFeeStructure {
            class_id: validated.class_id,
            session_id: validated.session_id,
            name: validated.name.trim().to_string(),
            amount_cents: validated.amount_cents,
            due_date: validated.due_date,
        },
    )
    .await?;

    Ok(Custom(Status::Created, Json(get_fee_structure(db, id).await?)))
}

#[derive(Deserialize, Validate)]
pub struct PaymentRequest {
    student_id: i64,
    fee_structure_id: i64,
    #[validate(range(min = 1, message = "Amount must be positive"))]
    amount_cents: i64,
    method: PaymentMethod,
    paid_on: Option<NaiveDate>,
}

#[post("/fees/payments", data = "<request>")]
pub async fn api_record_payment(
    request: Json<PaymentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<FeePayment>>> {
    user.require_permission(db, Permission::CollectFees).await?;
    let validated = request.validate_custom()?;

    let payment = record_payment(
        db,
        &NewPayment {
            student_id: validated.student_id,
            fee_structure_id: validated.fee_structure_id,
            amount_cents: validated.amount_cents,
            method: validated.method,
            paid_on: validated.paid_on.unwrap_or_else(|| Utc::now().date_naive()),
        },
        user.id,
    )
    .await?;

    Ok(Custom(Status::Created, Json(payment)))
}

#[get("/students/<id>/fees")]
pub async fn api_student_fees(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<StudentFeeSummary>> {
    ensure_fees_visible(db, &user, id).await?;

    Ok(Json(student_fee_summary(db, id).await?))
}

#[get("/students/<id>/payments")]
pub async fn api_student_payments(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<FeePayment>>> {
    ensure_fees_visible(db, &user, id).await?;

    Ok(Json(list_payments_for_student(db, id).await?))
}

/// Defaults to the active session.
#[get("/fees/collection?<session_id>")]
pub async fn api_collection_summary(
    session_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<ClassCollection>>> {
    user.require_permission(db, Permission::ViewFees).await?;

    let session_id = match session_id {
        Some(id) => id,
        None => get_active_session(db)
            .await?
            .map(|s| s.id)
            .ok_or_else(|| AppError::NotFound("No active session".to_string()))?,
    };

    Ok(Json(collection_summary(db, session_id).await?))
}
