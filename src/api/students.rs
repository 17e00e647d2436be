use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Deserializer};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    NewStudent, StudentChanges, create_student, get_active_session, get_student, list_students,
    list_students_for_user, search_students, update_student,
};
use crate::error::AppError;
use crate::models::{Student, StudentStatus};
use crate::validation::{ADMISSION_NUMBER_RE, ApiResult, JsonValidateExt};

use super::ensure_student_visible;

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[get("/students?<class_id>&<section_id>&<include_inactive>")]
pub async fn api_list_students(
    class_id: Option<i64>,
    section_id: Option<i64>,
    include_inactive: Option<bool>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Student>>> {
    user.require_permission(db, Permission::ViewStudents).await?;

    let students = list_students(
        db,
        class_id,
        section_id,
        include_inactive.unwrap_or(false),
    )
    .await?;

    Ok(Json(students))
}

#[get("/students/search?<q>&<class_id>")]
pub async fn api_search_students(
    q: &str,
    class_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Student>>> {
    user.require_permission(db, Permission::ViewStudents).await?;

    Ok(Json(search_students(db, q, class_id).await?))
}

/// Records linked to the caller: their own as a student, their
/// children's as a parent.
#[get("/students/mine")]
pub async fn api_my_students(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<Student>>> {
    Ok(Json(list_students_for_user(db, user.id).await?))
}

#[get("/students/<id>", rank = 2)]
pub async fn api_get_student(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Student>> {
    let student = get_student(db, id).await?;
    ensure_student_visible(db, &user, &student).await?;

    Ok(Json(student))
}

#[derive(Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(regex(
        path = *ADMISSION_NUMBER_RE,
        message = "Admission number must be 3-20 uppercase letters, digits or dashes"
    ))]
    admission_number: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: String,
    date_of_birth: Option<NaiveDate>,
    class_id: i64,
    section_id: Option<i64>,
    session_id: Option<i64>,
    user_id: Option<i64>,
    parent_id: Option<i64>,
}

#[post("/students", data = "<request>")]
pub async fn api_create_student(
    request: Json<CreateStudentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Student>>> {
    user.require_permission(db, Permission::ManageStudents).await?;
    let validated = request.validate_custom()?;

    // New admissions default to the active session.
    let session_id = match validated.session_id {
        Some(id) => id,
        None => get_active_session(db)
            .await?
            .map(|s| s.id)
            .ok_or_else(|| {
                AppError::Validation("no active session; pass session_id".to_string())
            })?,
    };

    let id = create_student(
        db,
        &NewStudent {
            admission_number: validated.admission_number,
            name: validated.name.trim().to_string(),
            date_of_birth: validated.date_of_birth,
            class_id: validated.class_id,
            section_id: validated.section_id,
            session_id,
            user_id: validated.user_id,
            parent_id: validated.parent_id,
        },
    )
    .await?;

    Ok(Custom(Status::Created, Json(get_student(db, id).await?)))
}

#[derive(Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: Option<String>,
    date_of_birth: Option<NaiveDate>,
    class_id: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    section_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    user_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    parent_id: Option<Option<i64>>,
    status: Option<StudentStatus>,
}

#[put("/students/<id>", data = "<request>")]
pub async fn api_update_student(
    id: i64,
    request: Json<UpdateStudentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Student>> {
    user.require_permission(db, Permission::ManageStudents).await?;
    let validated = request.validate_custom()?;

    let changes = StudentChanges {
        name: validated.name.map(|n| n.trim().to_string()),
        date_of_birth: validated.date_of_birth,
        class_id: validated.class_id,
        section_id: validated.section_id,
        user_id: validated.user_id,
        parent_id: validated.parent_id,
        status: validated.status,
    };

    Ok(Json(update_student(db, id, &changes).await?))
}
