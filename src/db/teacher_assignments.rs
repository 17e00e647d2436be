use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::Role;
use crate::error::AppError;
use crate::models::TeacherAssignment;

use super::{get_class, get_section, get_subject, get_user};

const ASSIGNMENT_SELECT: &str = "SELECT ta.id, ta.teacher_id, u.name AS teacher_name,
        ta.class_id, c.name AS class_name, ta.section_id, ta.subject_id,
        ta.is_class_teacher, ta.can_mark_attendance
     FROM teacher_assignments ta
     JOIN users u ON u.id = ta.teacher_id
     JOIN classes c ON c.id = ta.class_id";

#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    pub teacher_id: i64,
    pub class_id: i64,
    pub section_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub is_class_teacher: bool,
    pub can_mark_attendance: bool,
}

#[instrument(skip(pool))]
pub async fn list_teacher_assignments(
    pool: &Pool<Sqlite>,
    teacher_id: Option<i64>,
    class_id: Option<i64>,
) -> Result<Vec<TeacherAssignment>, AppError> {
    info!("Listing teacher assignments");
    let rows = sqlx::query_as::<_, TeacherAssignment>(&format!(
        "{} WHERE (?1 IS NULL OR ta.teacher_id = ?1)
           AND (?2 IS NULL OR ta.class_id = ?2)
         ORDER BY c.grade_level, c.name, u.name",
        ASSIGNMENT_SELECT
    ))
    .bind(teacher_id)
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_teacher_assignment(
    pool: &Pool<Sqlite>,
    id: i64,
) -> Result<TeacherAssignment, AppError> {
    let row = sqlx::query_as::<_, TeacherAssignment>(&format!(
        "{} WHERE ta.id = ?",
        ASSIGNMENT_SELECT
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Teacher assignment {} not found", id)))
}

/// Inserts or updates the assignment identified by
/// `(teacher_id, class_id, section_id, subject_id)`, treating absent
/// section or subject as equal to each other.
#[instrument(skip(pool))]
pub async fn upsert_teacher_assignment(
    pool: &Pool<Sqlite>,
    request: &AssignmentRequest,
) -> Result<TeacherAssignment, AppError> {
    let teacher = get_user(pool, request.teacher_id).await?;
    if teacher.role != Role::Teacher {
        return Err(AppError::Validation(format!(
            "profile {} is a {}, not a teacher",
            teacher.id, teacher.role
        )));
    }

    get_class(pool, request.class_id).await?;
    if let Some(section_id) = request.section_id {
        let section = get_section(pool, section_id).await?;
        if section.class_id != request.class_id {
            return Err(AppError::Validation(format!(
                "section {} does not belong to class {}",
                section_id, request.class_id
            )));
        }
    }

    if let Some(subject_id) = request.subject_id {
        get_subject(pool, subject_id).await?;
    }

    let mut tx = pool.begin().await?;

    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM teacher_assignments
         WHERE teacher_id = ? AND class_id = ? AND section_id IS ? AND subject_id IS ?",
    )
    .bind(request.teacher_id)
    .bind(request.class_id)
    .bind(request.section_id)
    .bind(request.subject_id)
    .fetch_optional(&mut *tx)
    .await?;

    let id = match existing {
        Some((id,)) => {
            info!(id, "Updating existing teacher assignment");
            sqlx::query(
                "UPDATE teacher_assignments SET is_class_teacher = ?, can_mark_attendance = ? WHERE id = ?",
            )
            .bind(request.is_class_teacher)
            .bind(request.can_mark_attendance)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            id
        }
        None => {
            info!("Creating teacher assignment");
            sqlx::query(
                "INSERT INTO teacher_assignments
                    (teacher_id, class_id, section_id, subject_id, is_class_teacher, can_mark_attendance)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(request.teacher_id)
            .bind(request.class_id)
            .bind(request.section_id)
            .bind(request.subject_id)
            .bind(request.is_class_teacher)
            .bind(request.can_mark_attendance)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid()
        }
    };

    tx.commit().await?;
    get_teacher_assignment(pool, id).await
}

#[instrument(skip(pool))]
pub async fn delete_teacher_assignment(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting teacher assignment");
    let res = sqlx::query("DELETE FROM teacher_assignments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Teacher assignment {} not found", id)));
    }

    Ok(())
}

/// Whether the teacher may mark attendance for the class (and section,
/// when given). A class-wide assignment covers every section.
#[instrument(skip(pool))]
pub async fn teacher_can_mark_attendance(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    class_id: i64,
    section_id: Option<i64>,
) -> Result<bool, AppError> {
    let (allowed,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM teacher_assignments
            WHERE teacher_id = ? AND class_id = ? AND can_mark_attendance = 1
              AND (section_id IS NULL OR section_id IS ?)
        )",
    )
    .bind(teacher_id)
    .bind(class_id)
    .bind(section_id)
    .fetch_one(pool)
    .await?;

    Ok(allowed)
}
