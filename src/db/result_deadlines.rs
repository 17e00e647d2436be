use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::ResultDeadline;

use super::{get_academic_session, get_class};

#[derive(Debug, Clone)]
pub struct DeadlineFields {
    pub session_id: i64,
    pub class_id: Option<i64>,
    pub title: String,
    pub deadline: NaiveDate,
}

async fn check_references(pool: &Pool<Sqlite>, fields: &DeadlineFields) -> Result<(), AppError> {
    get_academic_session(pool, fields.session_id).await?;
    if let Some(class_id) = fields.class_id {
        get_class(pool, class_id).await?;
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn list_result_deadlines(
    pool: &Pool<Sqlite>,
    session_id: Option<i64>,
    class_id: Option<i64>,
) -> Result<Vec<ResultDeadline>, AppError> {
    // A deadline without a class applies to every class.
    let rows = sqlx::query_as::<_, ResultDeadline>(
        "SELECT id, session_id, class_id, title, deadline, created_by
         FROM result_deadlines
         WHERE (?1 IS NULL OR session_id = ?1)
           AND (?2 IS NULL OR class_id IS NULL OR class_id = ?2)
         ORDER BY deadline, title",
    )
    .bind(session_id)
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_result_deadline(pool: &Pool<Sqlite>, id: i64) -> Result<ResultDeadline, AppError> {
    let row = sqlx::query_as::<_, ResultDeadline>(
        "SELECT id, session_id, class_id, title, deadline, created_by FROM result_deadlines WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Result deadline {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn create_result_deadline(
    pool: &Pool<Sqlite>,
    fields: &DeadlineFields,
    created_by: i64,
) -> Result<ResultDeadline, AppError> {
    check_references(pool, fields).await?;

    info!("Creating result deadline");
    let id = sqlx::query(
        "INSERT INTO result_deadlines (session_id, class_id, title, deadline, created_by)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(fields.session_id)
    .bind(fields.class_id)
    .bind(&fields.title)
    .bind(fields.deadline)
    .bind(created_by)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_result_deadline(pool, id).await
}

#[instrument(skip(pool))]
pub async fn update_result_deadline(
    pool: &Pool<Sqlite>,
    id: i64,
    fields: &DeadlineFields,
) -> Result<ResultDeadline, AppError> {
    get_result_deadline(pool, id).await?;
    check_references(pool, fields).await?;

    info!("Updating result deadline");
    sqlx::query(
        "UPDATE result_deadlines SET session_id = ?, class_id = ?, title = ?, deadline = ? WHERE id = ?",
    )
    .bind(fields.session_id)
    .bind(fields.class_id)
    .bind(&fields.title)
    .bind(fields.deadline)
    .bind(id)
    .execute(pool)
    .await?;

    get_result_deadline(pool, id).await
}

#[instrument(skip(pool))]
pub async fn delete_result_deadline(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting result deadline");
    let res = sqlx::query("DELETE FROM result_deadlines WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Result deadline {} not found", id)));
    }

    Ok(())
}
