use chrono::{NaiveDate, Utc};
use rocket::State;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Role, User};
use crate::db::{
    AttendanceEntry, attendance_summary, get_class, get_student, list_attendance, mark_attendance,
    teacher_can_mark_attendance,
};
use crate::error::AppError;
use crate::models::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
use crate::validation::{ApiResult, JsonValidateExt};

use super::{ensure_student_visible, parse_date};

#[derive(Serialize, Deserialize)]
pub struct AttendanceMark {
    student_id: i64,
    status: AttendanceStatus,
}

#[derive(Deserialize, Validate)]
pub struct MarkAttendanceRequest {
    class_id: i64,
    section_id: Option<i64>,
    date: NaiveDate,
    #[validate(length(min = 1, message = "At least one entry is required"))]
    entries: Vec<AttendanceMark>,
}

#[derive(Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub marked: usize,
}

#[post("/attendance", data = "<request>")]
pub async fn api_mark_attendance(
    request: Json<MarkAttendanceRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<MarkAttendanceResponse>> {
    user.require_permission(db, Permission::MarkAttendance).await?;
    let validated = request.validate_custom()?;

    if validated.date > Utc::now().date_naive() {
        return Err(AppError::Validation(format!(
            "cannot mark attendance for future date {}",
            validated.date
        ))
        .into());
    }

    get_class(db, validated.class_id).await?;

    if !user.is_admin() {
        // Assignments only exist for teachers.
        user.require_any_role(&[Role::Teacher])?;

        if !teacher_can_mark_attendance(db, user.id, validated.class_id, validated.section_id)
            .await?
        {
            return Err(AppError::Authorization(format!(
                "not assigned to mark attendance for class {}",
                validated.class_id
            ))
            .into());
        }
    }

    let entries: Vec<AttendanceEntry> = validated
        .entries
        .iter()
        .map(|e| AttendanceEntry {
            student_id: e.student_id,
            status: e.status,
        })
        .collect();

    let marked = mark_attendance(
        db,
        validated.class_id,
        validated.section_id,
        validated.date,
        &entries,
        user.id,
    )
    .await?;

    Ok(Json(MarkAttendanceResponse { marked }))
}

#[get("/attendance?<class_id>&<section_id>&<date>")]
pub async fn api_list_attendance(
    class_id: i64,
    section_id: Option<i64>,
    date: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<AttendanceRecord>>> {
    user.require_permission(db, Permission::ViewAttendance).await?;
    let date = parse_date("date", date)?;

    Ok(Json(list_attendance(db, class_id, section_id, date).await?))
}

#[get("/students/<id>/attendance?<from>&<to>")]
pub async fn api_attendance_summary(
    id: i64,
    from: Option<&str>,
    to: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<AttendanceSummary>> {
    let student = get_student(db, id).await?;
    ensure_student_visible(db, &user, &student).await?;

    let from = from.map(|d| parse_date("from", d)).transpose()?;
    let to = to.map(|d| parse_date("to", d)).transpose()?;

    Ok(Json(attendance_summary(db, id, from, to).await?))
}
