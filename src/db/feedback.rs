use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Feedback, FeedbackStatus};

const FEEDBACK_SELECT: &str = "SELECT f.id, f.submitted_by, u.name AS submitter_name, f.subject,
        f.message, f.status, f.response, f.responded_by, f.created_at, f.responded_at
     FROM feedback f
     JOIN users u ON u.id = f.submitted_by";

#[instrument(skip(pool, message))]
pub async fn submit_feedback(
    pool: &Pool<Sqlite>,
    submitted_by: i64,
    subject: &str,
    message: &str,
) -> Result<i64, AppError> {
    info!("Submitting feedback");
    let res = sqlx::query("INSERT INTO feedback (submitted_by, subject, message) VALUES (?, ?, ?)")
        .bind(submitted_by)
        .bind(subject)
        .bind(message)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_feedback(pool: &Pool<Sqlite>, id: i64) -> Result<Feedback, AppError> {
    let row = sqlx::query_as::<_, Feedback>(&format!("{} WHERE f.id = ?", FEEDBACK_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Feedback {} not found", id)))
}

/// All feedback when `submitted_by` is `None`, otherwise one user's.
#[instrument(skip(pool))]
pub async fn list_feedback(
    pool: &Pool<Sqlite>,
    submitted_by: Option<i64>,
    status: Option<FeedbackStatus>,
) -> Result<Vec<Feedback>, AppError> {
    let rows = sqlx::query_as::<_, Feedback>(&format!(
        "{} WHERE (?1 IS NULL OR f.submitted_by = ?1) AND (?2 IS NULL OR f.status = ?2)
         ORDER BY f.created_at DESC, f.id DESC",
        FEEDBACK_SELECT
    ))
    .bind(submitted_by)
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool, response))]
pub async fn respond_to_feedback(
    pool: &Pool<Sqlite>,
    id: i64,
    responded_by: i64,
    response: &str,
) -> Result<Feedback, AppError> {
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE feedback
         SET response = ?, responded_by = ?, responded_at = ?, status = 'responded'
         WHERE id = ? AND status = 'open'",
    )
    .bind(response)
    .bind(responded_by)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        // Distinguish a missing row from one already answered.
        get_feedback(pool, id).await?;
        return Err(AppError::Conflict(format!(
            "Feedback {} has already been responded to",
            id
        )));
    }

    info!("Feedback responded");
    get_feedback(pool, id).await
}

#[instrument(skip(pool))]
pub async fn count_open_feedback(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feedback WHERE status = 'open'")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
