use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::error::AppError;
use crate::models::AcademicSession;

use super::{count_marked, count_open_feedback, get_active_session};

#[derive(Debug, Clone, Serialize)]
pub struct SchoolOverview {
    pub active_session: Option<AcademicSession>,
    pub active_students: i64,
    pub teachers: i64,
    pub classes: i64,
    pub open_feedback: i64,
    pub fees_collected_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FeeTotals {
    pub due_cents: i64,
    pub collected_cents: i64,
    pub outstanding_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassMarkedToday {
    pub class_id: i64,
    pub class_name: String,
    pub marked: i64,
}

async fn count(pool: &Pool<Sqlite>, sql: &str) -> Result<i64, AppError> {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await?;
    Ok(n)
}

#[instrument(skip(pool))]
pub async fn school_overview(pool: &Pool<Sqlite>) -> Result<SchoolOverview, AppError> {
    let active_session = get_active_session(pool).await?;

    let fees_collected_cents = match &active_session {
        Some(session) => session_fee_totals(pool, session.id).await?.collected_cents,
        None => 0,
    };

    Ok(SchoolOverview {
        active_students: count(pool, "SELECT COUNT(*) FROM students WHERE status = 'active'").await?,
        teachers: count(
            pool,
            "SELECT COUNT(*) FROM users WHERE role = 'teacher' AND is_active = 1",
        )
        .await?,
        classes: count(pool, "SELECT COUNT(*) FROM classes").await?,
        open_feedback: count_open_feedback(pool).await?,
        fees_collected_cents,
        active_session,
    })
}

/// What active students of a session owe across all fee structures, and
/// what has been collected against them.
#[instrument(skip(pool))]
pub async fn session_fee_totals(
    pool: &Pool<Sqlite>,
    session_id: i64,
) -> Result<FeeTotals, AppError> {
    let totals = sqlx::query_as::<_, FeeTotals>(
        "WITH due AS (
            SELECT COALESCE(SUM(f.amount_cents), 0) AS cents
            FROM fee_structures f
            JOIN students s ON s.class_id = f.class_id AND s.session_id = f.session_id
            WHERE f.session_id = ?1 AND s.status = 'active'
         ), collected AS (
            SELECT COALESCE(SUM(p.amount_cents), 0) AS cents
            FROM fee_payments p
            JOIN fee_structures f ON f.id = p.fee_structure_id
            WHERE f.session_id = ?1
         )
         SELECT due.cents AS due_cents,
                collected.cents AS collected_cents,
                MAX(due.cents - collected.cents, 0) AS outstanding_cents
         FROM due, collected",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(totals)
}

/// Attendance rows written on `date` for each class the teacher is
/// assigned to.
#[instrument(skip(pool))]
pub async fn teacher_marked_on(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    date: NaiveDate,
) -> Result<Vec<ClassMarkedToday>, AppError> {
    let classes: Vec<(i64, String)> = sqlx::query_as(
        "SELECT c.id, c.name FROM classes c
         WHERE c.id IN (SELECT class_id FROM teacher_assignments WHERE teacher_id = ?)
         ORDER BY c.grade_level, c.name",
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    let mut rows = Vec::with_capacity(classes.len());
    for (class_id, class_name) in classes {
        rows.push(ClassMarkedToday {
            class_id,
            class_name,
            marked: count_marked(pool, class_id, date).await?,
        });
    }

    Ok(rows)
}
