use rocket::State;
use rocket::http::Status;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Role, User};
use crate::db::{
    AssignmentRequest, delete_teacher_assignment, list_teacher_assignments, list_users,
    upsert_teacher_assignment,
};
use crate::models::TeacherAssignment;
use crate::validation::ApiResult;

use super::auth::UserData;

#[get("/teachers")]
pub async fn api_list_teachers(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<UserData>>> {
    user.require_permission(db, Permission::ManageTeacherAssignments)
        .await?;

    let teachers = list_users(db, Some(Role::Teacher)).await?;
    Ok(Json(
        teachers
            .into_iter()
            .filter(|t| t.is_active)
            .map(UserData::from)
            .collect(),
    ))
}

#[get("/teacher-assignments?<teacher_id>&<class_id>")]
pub async fn api_list_assignments(
    teacher_id: Option<i64>,
    class_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<TeacherAssignment>>> {
    // Teachers can always see their own rows.
    if teacher_id != Some(user.id) {
        user.require_permission(db, Permission::ManageTeacherAssignments)
            .await?;
    }

    Ok(Json(list_teacher_assignments(db, teacher_id, class_id).await?))
}

#[get("/teacher-assignments/mine")]
pub async fn api_my_assignments(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<TeacherAssignment>>> {
    Ok(Json(list_teacher_assignments(db, Some(user.id), None).await?))
}

#[derive(Deserialize)]
pub struct AssignmentBody {
    teacher_id: i64,
    class_id: i64,
    section_id: Option<i64>,
    subject_id: Option<i64>,
    #[serde(default)]
    is_class_teacher: bool,
    #[serde(default)]
    can_mark_attendance: bool,
}

#[put("/teacher-assignments", data = "<body>")]
pub async fn api_upsert_assignment(
    body: Json<AssignmentBody>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<TeacherAssignment>> {
    user.require_permission(db, Permission::ManageTeacherAssignments)
        .await?;

    let request = AssignmentRequest {
        teacher_id: body.teacher_id,
        class_id: body.class_id,
        section_id: body.section_id,
        subject_id: body.subject_id,
        is_class_teacher: body.is_class_teacher,
        can_mark_attendance: body.can_mark_attendance,
    };

    Ok(Json(upsert_teacher_assignment(db, &request).await?))
}

#[delete("/teacher-assignments/<id>")]
pub async fn api_delete_assignment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(db, Permission::ManageTeacherAssignments)
        .await?;

    delete_teacher_assignment(db, id).await?;

    Ok(Status::NoContent)
}
