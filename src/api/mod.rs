use std::str::FromStr;

use chrono::NaiveDate;
use rocket::Route;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::error::AppError;
use crate::models::Student;

pub mod academic_sessions;
pub mod attendance;
pub mod auth;
pub mod certificates;
pub mod classes;
pub mod dashboard;
pub mod feedback;
pub mod fees;
pub mod permissions;
pub mod promotions;
pub mod result_deadlines;
pub mod students;
pub mod teacher_assignments;
pub mod users;

pub fn routes() -> Vec<Route> {
    routes![
        auth::health,
        auth::api_login,
        auth::api_logout,
        auth::api_me,
        auth::api_update_profile,
        auth::api_change_password,
        users::api_list_users,
        users::api_create_user,
        users::api_update_user,
        permissions::api_list_permissions,
        permissions::api_grant_permission,
        permissions::api_revoke_permission,
        permissions::api_check_permission,
        academic_sessions::api_list_sessions,
        academic_sessions::api_active_session,
        academic_sessions::api_create_session,
        academic_sessions::api_activate_session,
        academic_sessions::api_delete_session,
        classes::api_list_classes,
        classes::api_create_class,
        classes::api_update_class,
        classes::api_list_sections,
        classes::api_create_section,
        classes::api_delete_section,
        classes::api_list_subjects,
        classes::api_create_subject,
        students::api_list_students,
        students::api_search_students,
        students::api_my_students,
        students::api_get_student,
        students::api_create_student,
        students::api_update_student,
        promotions::api_promote_students,
        promotions::api_promote_class,
        promotions::api_student_promotions,
        teacher_assignments::api_list_teachers,
        teacher_assignments::api_list_assignments,
        teacher_assignments::api_my_assignments,
        teacher_assignments::api_upsert_assignment,
        teacher_assignments::api_delete_assignment,
        attendance::api_mark_attendance,
        attendance::api_list_attendance,
        attendance::api_attendance_summary,
        fees::api_list_fee_structures,
        fees::api_create_fee_structure,
        fees::api_record_payment,
        fees::api_student_fees,
        fees::api_student_payments,
        fees::api_collection_summary,
        feedback::api_submit_feedback,
        feedback::api_list_feedback,
        feedback::api_respond_feedback,
        result_deadlines::api_list_deadlines,
        result_deadlines::api_create_deadline,
        result_deadlines::api_update_deadline,
        result_deadlines::api_delete_deadline,
        certificates::api_issue_certificate,
        certificates::api_student_certificates,
        certificates::api_verify_certificate,
        dashboard::api_dashboard,
    ]
}

/// Parses a path or query value, reporting failures as a bad request on
/// `field`.
pub(crate) fn parse_param<T>(field: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr<Err = anyhow::Error>,
{
    raw.parse::<T>()
        .map_err(|e| AppError::Validation(format!("{}: {}", field, e)))
}

pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{}: expected YYYY-MM-DD, got '{}'", field, raw)))
}

/// Holders of `view_students` see every record; otherwise a student
/// profile sees its own record and a parent sees their children.
pub(crate) async fn ensure_student_visible(
    db: &Pool<Sqlite>,
    user: &User,
    student: &Student,
) -> Result<(), AppError> {
    if student.user_id == Some(user.id) || student.parent_id == Some(user.id) {
        return Ok(());
    }

    user.require_permission(db, Permission::ViewStudents).await
}
