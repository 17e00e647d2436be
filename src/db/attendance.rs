use std::collections::HashSet;

use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{AttendanceRecord, AttendanceStatus, AttendanceSummary};

#[derive(Debug, Clone, Copy)]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub status: AttendanceStatus,
}

/// Records a whole register for one class and date. Every student must be
/// an active member of the class (and section, when given) or nothing is
/// written. Re-marking a day overwrites the earlier status.
#[instrument(skip(pool, entries), fields(count = entries.len()))]
pub async fn mark_attendance(
    pool: &Pool<Sqlite>,
    class_id: i64,
    section_id: Option<i64>,
    date: NaiveDate,
    entries: &[AttendanceEntry],
    marked_by: i64,
) -> Result<usize, AppError> {
    if entries.is_empty() {
        return Err(AppError::Validation("no attendance entries given".to_string()));
    }

    let mut seen = HashSet::with_capacity(entries.len());
    if let Some(repeated) = entries.iter().find(|entry| !seen.insert(entry.student_id)) {
        return Err(AppError::Validation(format!(
            "student {} appears more than once in the register",
            repeated.student_id
        )));
    }

    let mut tx = pool.begin().await?;
    let mut outsiders = Vec::new();

    for entry in entries {
        let (member,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM students
                WHERE id = ?1 AND class_id = ?2 AND status = 'active'
                  AND (?3 IS NULL OR section_id = ?3)
            )",
        )
        .bind(entry.student_id)
        .bind(class_id)
        .bind(section_id)
        .fetch_one(&mut *tx)
        .await?;

        if !member {
            outsiders.push(entry.student_id);
        }
    }

    if !outsiders.is_empty() {
        tx.rollback().await?;
        return Err(AppError::Validation(format!(
            "students {:?} are not active members of class {}",
            outsiders, class_id
        )));
    }

    info!("Writing attendance register");
    for entry in entries {
        sqlx::query(
            "INSERT INTO attendance (student_id, date, status, marked_by)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (student_id, date) DO UPDATE
             SET status = excluded.status,
                 marked_by = excluded.marked_by,
                 marked_at = CURRENT_TIMESTAMP",
        )
        .bind(entry.student_id)
        .bind(date)
        .bind(entry.status)
        .bind(marked_by)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(entries.len())
}

#[instrument(skip(pool))]
pub async fn list_attendance(
    pool: &Pool<Sqlite>,
    class_id: i64,
    section_id: Option<i64>,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, AppError> {
    let rows = sqlx::query_as::<_, AttendanceRecord>(
        "SELECT a.id, a.student_id, s.name AS student_name, a.date, a.status, a.marked_by
         FROM attendance a
         JOIN students s ON s.id = a.student_id
         WHERE s.class_id = ?1 AND a.date = ?2 AND (?3 IS NULL OR s.section_id = ?3)
         ORDER BY s.name",
    )
    .bind(class_id)
    .bind(date)
    .bind(section_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn attendance_summary(
    pool: &Pool<Sqlite>,
    student_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<AttendanceSummary, AppError> {
    let summary = sqlx::query_as::<_, AttendanceSummary>(
        "SELECT
            COALESCE(SUM(status = 'present'), 0) AS present,
            COALESCE(SUM(status = 'absent'), 0) AS absent,
            COALESCE(SUM(status = 'late'), 0) AS late,
            COALESCE(SUM(status = 'excused'), 0) AS excused,
            COUNT(*) AS total
         FROM attendance
         WHERE student_id = ?1
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)",
    )
    .bind(student_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(summary)
}

/// Number of attendance rows written for a class on a date.
#[instrument(skip(pool))]
pub async fn count_marked(
    pool: &Pool<Sqlite>,
    class_id: i64,
    date: NaiveDate,
) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM attendance a
         JOIN students s ON s.id = a.student_id
         WHERE s.class_id = ? AND a.date = ?",
    )
    .bind(class_id)
    .bind(date)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
