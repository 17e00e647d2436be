use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::Role;
use crate::error::AppError;
use crate::models::{Student, StudentStatus};

use super::{get_academic_session, get_class, get_section, get_user};

pub(crate) const STUDENT_SELECT: &str = "SELECT s.id, s.admission_number, s.name, s.date_of_birth,
        s.class_id, c.name AS class_name, s.section_id, sec.name AS section_name,
        s.session_id, s.user_id, s.parent_id, s.status
     FROM students s
     JOIN classes c ON c.id = s.class_id
     LEFT JOIN sections sec ON sec.id = s.section_id";

const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub admission_number: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: i64,
    pub section_id: Option<i64>,
    pub session_id: i64,
    pub user_id: Option<i64>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentChanges {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: Option<i64>,
    pub section_id: Option<Option<i64>>,
    pub user_id: Option<Option<i64>>,
    pub parent_id: Option<Option<i64>>,
    pub status: Option<StudentStatus>,
}

async fn check_placement(
    pool: &Pool<Sqlite>,
    class_id: i64,
    section_id: Option<i64>,
) -> Result<(), AppError> {
    get_class(pool, class_id)
        .await
        .map_err(|_| AppError::Validation(format!("class_id {} does not exist", class_id)))?;

    if let Some(section_id) = section_id {
        let section = get_section(pool, section_id).await.map_err(|_| {
            AppError::Validation(format!("section_id {} does not exist", section_id))
        })?;

        if section.class_id != class_id {
            return Err(AppError::Validation(format!(
                "section {} does not belong to class {}",
                section_id, class_id
            )));
        }
    }

    Ok(())
}

/// Linked login profiles must carry the matching role.
async fn check_links(
    pool: &Pool<Sqlite>,
    user_id: Option<i64>,
    parent_id: Option<i64>,
) -> Result<(), AppError> {
    for (linked, expected) in [(user_id, Role::Student), (parent_id, Role::Parent)] {
        let Some(linked) = linked else { continue };

        let user = get_user(pool, linked)
            .await
            .map_err(|_| AppError::Validation(format!("profile {} does not exist", linked)))?;

        if user.role != expected {
            return Err(AppError::Validation(format!(
                "profile {} must have role {}",
                linked, expected
            )));
        }
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_student(pool: &Pool<Sqlite>, id: i64) -> Result<Student, AppError> {
    let row = sqlx::query_as::<_, Student>(&format!("{} WHERE s.id = ?", STUDENT_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Student {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn list_students(
    pool: &Pool<Sqlite>,
    class_id: Option<i64>,
    section_id: Option<i64>,
    include_inactive: bool,
) -> Result<Vec<Student>, AppError> {
    info!("Listing students");
    let rows = sqlx::query_as::<_, Student>(&format!(
        "{} WHERE (?1 IS NULL OR s.class_id = ?1)
           AND (?2 IS NULL OR s.section_id = ?2)
           AND (?3 OR s.status = 'active')
         ORDER BY s.name",
        STUDENT_SELECT
    ))
    .bind(class_id)
    .bind(section_id)
    .bind(include_inactive)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Case-insensitive match on name or admission number.
#[instrument(skip(pool))]
pub async fn search_students(
    pool: &Pool<Sqlite>,
    query: &str,
    class_id: Option<i64>,
) -> Result<Vec<Student>, AppError> {
    let term = query.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }

    info!("Searching students");
    let pattern = format!("%{}%", term.replace('%', "\\%").replace('_', "\\_"));

    let rows = sqlx::query_as::<_, Student>(&format!(
        "{} WHERE (s.name LIKE ?1 ESCAPE '\\' OR s.admission_number LIKE ?1 ESCAPE '\\')
           AND (?2 IS NULL OR s.class_id = ?2)
         ORDER BY s.name
         LIMIT ?3",
        STUDENT_SELECT
    ))
    .bind(pattern)
    .bind(class_id)
    .bind(SEARCH_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn list_students_for_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<Student>, AppError> {
    let rows = sqlx::query_as::<_, Student>(&format!(
        "{} WHERE s.user_id = ?1 OR s.parent_id = ?1 ORDER BY s.name",
        STUDENT_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn create_student(pool: &Pool<Sqlite>, student: &NewStudent) -> Result<i64, AppError> {
    check_placement(pool, student.class_id, student.section_id).await?;
    check_links(pool, student.user_id, student.parent_id).await?;
    get_academic_session(pool, student.session_id).await.map_err(|_| {
        AppError::Validation(format!("session_id {} does not exist", student.session_id))
    })?;

    info!("Creating student");
    let res = sqlx::query(
        "INSERT INTO students
            (admission_number, name, date_of_birth, class_id, section_id, session_id, user_id, parent_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&student.admission_number)
    .bind(&student.name)
    .bind(student.date_of_birth)
    .bind(student.class_id)
    .bind(student.section_id)
    .bind(student.session_id)
    .bind(student.user_id)
    .bind(student.parent_id)
    .execute(pool)
    .await
    .map_err(|e| {
        AppError::unique_violation(
            e,
            format!("Admission number '{}' already exists", student.admission_number),
        )
    })?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_student(
    pool: &Pool<Sqlite>,
    id: i64,
    changes: &StudentChanges,
) -> Result<Student, AppError> {
    let current = get_student(pool, id).await?;

    let class_id = changes.class_id.unwrap_or(current.class_id);
    let section_id = match changes.section_id {
        Some(section_id) => section_id,
        // Moving class drops a section that belonged to the old one.
        None if class_id != current.class_id => None,
        None => current.section_id,
    };

    let user_id = changes.user_id.unwrap_or(current.user_id);
    let parent_id = changes.parent_id.unwrap_or(current.parent_id);

    check_placement(pool, class_id, section_id).await?;
    check_links(pool, user_id, parent_id).await?;

    info!("Updating student");
    sqlx::query(
        "UPDATE students
         SET name = ?, date_of_birth = ?, class_id = ?, section_id = ?,
             user_id = ?, parent_id = ?, status = ?
         WHERE id = ?",
    )
    .bind(changes.name.as_ref().unwrap_or(&current.name))
    .bind(changes.date_of_birth.or(current.date_of_birth))
    .bind(class_id)
    .bind(section_id)
    .bind(user_id)
    .bind(parent_id)
    .bind(changes.status.unwrap_or(current.status))
    .bind(id)
    .execute(pool)
    .await?;

    get_student(pool, id).await
}
