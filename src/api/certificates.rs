use chrono::{NaiveDate, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    find_certificate_by_serial, get_student, issue_certificate, list_certificates_for_student,
};
use crate::models::{Certificate, CertificateKind};
use crate::validation::{ApiResult, JsonValidateExt};

use super::ensure_student_visible;

#[derive(Deserialize, Validate)]
pub struct IssueCertificateRequest {
    kind: CertificateKind,
    issued_on: Option<NaiveDate>,
    #[validate(length(max = 1000, message = "Remarks must be at most 1000 characters"))]
    remarks: Option<String>,
}

#[post("/students/<id>/certificates", data = "<request>")]
pub async fn api_issue_certificate(
    id: i64,
    request: Json<IssueCertificateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Certificate>>> {
    user.require_permission(db, Permission::IssueCertificates).await?;
    let validated = request.validate_custom()?;

    let certificate = issue_certificate(
        db,
        id,
        validated.kind,
        validated.issued_on.unwrap_or_else(|| Utc::now().date_naive()),
        validated.remarks.as_deref(),
        user.id,
    )
    .await?;

    Ok(Custom(Status::Created, Json(certificate)))
}

#[get("/students/<id>/certificates")]
pub async fn api_student_certificates(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Certificate>>> {
    let student = get_student(db, id).await?;
    ensure_student_visible(db, &user, &student).await?;

    Ok(Json(list_certificates_for_student(db, id).await?))
}

/// Public view of a certificate: enough to confirm it is genuine.
#[derive(Serialize, Deserialize, Debug)]
pub struct CertificateVerification {
    pub serial_number: String,
    pub kind: CertificateKind,
    pub student_name: String,
    pub issued_on: NaiveDate,
}

#[get("/certificates/verify/<serial>")]
pub async fn api_verify_certificate(
    serial: &str,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<CertificateVerification>> {
    let certificate = find_certificate_by_serial(db, serial).await?;

    Ok(Json(CertificateVerification {
        serial_number: certificate.serial_number,
        kind: certificate.kind,
        student_name: certificate.student_name,
        issued_on: certificate.issued_on,
    }))
}
