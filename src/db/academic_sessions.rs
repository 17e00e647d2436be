use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::AcademicSession;

const SESSION_COLUMNS: &str =
    "SELECT id, name, start_date, end_date, is_active FROM academic_sessions";

#[instrument(skip(pool))]
pub async fn list_academic_sessions(pool: &Pool<Sqlite>) -> Result<Vec<AcademicSession>, AppError> {
    info!("Listing academic sessions");
    let rows = sqlx::query_as::<_, AcademicSession>(&format!(
        "{} ORDER BY start_date DESC",
        SESSION_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_academic_session(pool: &Pool<Sqlite>, id: i64) -> Result<AcademicSession, AppError> {
    let row = sqlx::query_as::<_, AcademicSession>(&format!("{} WHERE id = ?", SESSION_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Academic session {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn get_active_session(pool: &Pool<Sqlite>) -> Result<Option<AcademicSession>, AppError> {
    let row =
        sqlx::query_as::<_, AcademicSession>(&format!("{} WHERE is_active = 1", SESSION_COLUMNS))
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// New sessions always start inactive; see [`activate_academic_session`].
#[instrument(skip(pool))]
pub async fn create_academic_session(
    pool: &Pool<Sqlite>,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<i64, AppError> {
    if end_date <= start_date {
        return Err(AppError::Validation(
            "end_date must be after start_date".to_string(),
        ));
    }

    info!("Creating academic session");
    let res = sqlx::query(
        "INSERT INTO academic_sessions (name, start_date, end_date, is_active) VALUES (?, ?, ?, 0)",
    )
    .bind(name)
    .bind(start_date)
    .bind(end_date)
    .execute(pool)
    .await
    .map_err(|e| AppError::unique_violation(e, format!("Session '{}' already exists", name)))?;

    Ok(res.last_insert_rowid())
}

/// Makes `id` the only active session. Both updates share one transaction,
/// so an unknown id or a failure part way leaves the previous active
/// session untouched.
#[instrument(skip(pool))]
pub async fn activate_academic_session(
    pool: &Pool<Sqlite>,
    id: i64,
) -> Result<AcademicSession, AppError> {
    info!("Activating academic session");
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE academic_sessions SET is_active = 0 WHERE is_active = 1 AND id != ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let res = sqlx::query("UPDATE academic_sessions SET is_active = 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if res.rows_affected() == 0 {
        warn!("Activation target does not exist, rolling back");
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("Academic session {} not found", id)));
    }

    let session =
        sqlx::query_as::<_, AcademicSession>(&format!("{} WHERE id = ?", SESSION_COLUMNS))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;
    Ok(session)
}

#[instrument(skip(pool))]
pub async fn delete_academic_session(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    let session = get_academic_session(pool, id).await?;

    if session.is_active {
        return Err(AppError::Conflict(
            "The active session cannot be deleted".to_string(),
        ));
    }

    let (enrolled,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students WHERE session_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;

    if enrolled > 0 {
        return Err(AppError::Conflict(format!(
            "Session {} still has {} enrolled students",
            id, enrolled
        )));
    }

    info!("Deleting academic session");
    sqlx::query("DELETE FROM academic_sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
