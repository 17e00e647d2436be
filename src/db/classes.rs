use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Class, Section, Subject};

const CLASS_COLUMNS: &str = "SELECT id, name, grade_level, next_class_id FROM classes";

#[instrument(skip(pool))]
pub async fn list_classes(pool: &Pool<Sqlite>) -> Result<Vec<Class>, AppError> {
    info!("Listing classes");
    let rows = sqlx::query_as::<_, Class>(&format!("{} ORDER BY grade_level, name", CLASS_COLUMNS))
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_class(pool: &Pool<Sqlite>, id: i64) -> Result<Class, AppError> {
    let row = sqlx::query_as::<_, Class>(&format!("{} WHERE id = ?", CLASS_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Class {} not found", id)))
}

/// The progression chain only moves to higher grades, which rules out
/// cycles without walking the chain.
async fn check_next_class(
    pool: &Pool<Sqlite>,
    class_id: Option<i64>,
    grade_level: i64,
    next_class_id: Option<i64>,
) -> Result<(), AppError> {
    let Some(next_id) = next_class_id else {
        return Ok(());
    };

    if Some(next_id) == class_id {
        return Err(AppError::Validation(
            "A class cannot promote into itself".to_string(),
        ));
    }

    let next = get_class(pool, next_id).await.map_err(|_| {
        AppError::Validation(format!("next_class_id {} does not exist", next_id))
    })?;

    if next.grade_level <= grade_level {
        return Err(AppError::Validation(format!(
            "next class '{}' must have a higher grade level than {}",
            next.name, grade_level
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn create_class(
    pool: &Pool<Sqlite>,
    name: &str,
    grade_level: i64,
    next_class_id: Option<i64>,
) -> Result<i64, AppError> {
    check_next_class(pool, None, grade_level, next_class_id).await?;

    info!("Creating class");
    let res = sqlx::query("INSERT INTO classes (name, grade_level, next_class_id) VALUES (?, ?, ?)")
        .bind(name)
        .bind(grade_level)
        .bind(next_class_id)
        .execute(pool)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("Class '{}' already exists", name)))?;

    Ok(res.last_insert_rowid())
}

/// Updates a class. A grade change must keep both neighbours in the chain
/// ordered, so classes promoting into this one are checked too.
#[instrument(skip(pool))]
pub async fn update_class(
    pool: &Pool<Sqlite>,
    id: i64,
    name: &str,
    grade_level: i64,
    next_class_id: Option<i64>,
) -> Result<(), AppError> {
    get_class(pool, id).await?;
    check_next_class(pool, Some(id), grade_level, next_class_id).await?;

    let (blocking,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM classes WHERE next_class_id = ? AND grade_level >= ?",
    )
    .bind(id)
    .bind(grade_level)
    .fetch_one(pool)
    .await?;

    if blocking > 0 {
        return Err(AppError::Validation(format!(
            "grade level {} would not be above the classes promoting into it",
            grade_level
        )));
    }

    info!("Updating class");
    sqlx::query("UPDATE classes SET name = ?, grade_level = ?, next_class_id = ? WHERE id = ?")
        .bind(name)
        .bind(grade_level)
        .bind(next_class_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("Class '{}' already exists", name)))?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn list_sections(pool: &Pool<Sqlite>, class_id: i64) -> Result<Vec<Section>, AppError> {
    let rows = sqlx::query_as::<_, Section>(
        "SELECT id, class_id, name FROM sections WHERE class_id = ? ORDER BY name",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_section(pool: &Pool<Sqlite>, id: i64) -> Result<Section, AppError> {
    let row = sqlx::query_as::<_, Section>("SELECT id, class_id, name FROM sections WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Section {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn create_section(pool: &Pool<Sqlite>, class_id: i64, name: &str) -> Result<i64, AppError> {
    get_class(pool, class_id).await?;

    info!("Creating section");
    let res = sqlx::query("INSERT INTO sections (class_id, name) VALUES (?, ?)")
        .bind(class_id)
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| {
            AppError::unique_violation(e, format!("Section '{}' already exists in this class", name))
        })?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn delete_section(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    get_section(pool, id).await?;

    let (enrolled,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students WHERE section_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;

    if enrolled > 0 {
        return Err(AppError::Conflict(format!(
            "Section {} still has {} students",
            id, enrolled
        )));
    }

    info!("Deleting section");
    sqlx::query("DELETE FROM sections WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn list_subjects(pool: &Pool<Sqlite>) -> Result<Vec<Subject>, AppError> {
    let rows = sqlx::query_as::<_, Subject>("SELECT id, name, code FROM subjects ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_subject(pool: &Pool<Sqlite>, id: i64) -> Result<Subject, AppError> {
    let row = sqlx::query_as::<_, Subject>("SELECT id, name, code FROM subjects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Subject {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn create_subject(pool: &Pool<Sqlite>, name: &str, code: &str) -> Result<i64, AppError> {
    info!("Creating subject");
    let res = sqlx::query("INSERT INTO subjects (name, code) VALUES (?, ?)")
        .bind(name)
        .bind(code)
        .execute(pool)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("Subject '{}' already exists", name)))?;

    Ok(res.last_insert_rowid())
}
