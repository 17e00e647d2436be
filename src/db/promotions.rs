use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{AcademicSession, Class, Promotion, PromotionOutcome, Student, StudentStatus};

use super::{get_academic_session, get_class, get_student, list_students};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionFailure {
    pub student_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionReport {
    pub promoted: Vec<i64>,
    pub graduated: Vec<i64>,
    pub errors: Vec<PromotionFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub student_id: i64,
    pub from_class_id: i64,
    pub to_class_id: Option<i64>,
    pub from_session_id: i64,
    pub outcome: PromotionOutcome,
}

/// Decides where one student goes. A class without `next_class_id` is the
/// end of the chain: its students graduate and keep their class.
pub fn plan_move(
    student: &Student,
    class: &Class,
    current_session: &AcademicSession,
    target_session: &AcademicSession,
) -> Result<PlannedMove, String> {
    if student.status != StudentStatus::Active {
        return Err(format!("student is {:?}, not active", student.status).to_lowercase());
    }

    if student.session_id == target_session.id {
        return Err("student is already enrolled in the target session".to_string());
    }

    if target_session.start_date <= current_session.start_date {
        return Err(format!(
            "target session '{}' does not follow '{}'",
            target_session.name, current_session.name
        ));
    }

    let (to_class_id, outcome) = if class.is_terminal() {
        (None, PromotionOutcome::Graduated)
    } else {
        (class.next_class_id, PromotionOutcome::Promoted)
    };

    Ok(PlannedMove {
        student_id: student.id,
        from_class_id: class.id,
        to_class_id,
        from_session_id: student.session_id,
        outcome,
    })
}

/// Promotes each listed student along `next_class_id` into
/// `to_session_id`. Students that cannot move are reported in `errors`
/// and skipped; every valid move, with its history row, commits in a
/// single transaction.
#[instrument(skip(pool, student_ids), fields(count = student_ids.len()))]
pub async fn promote_students(
    pool: &Pool<Sqlite>,
    student_ids: &[i64],
    to_session_id: i64,
    promoted_by: i64,
) -> Result<PromotionReport, AppError> {
    if student_ids.is_empty() {
        return Err(AppError::Validation(
            "at least one student is required".to_string(),
        ));
    }

    let target_session = get_academic_session(pool, to_session_id).await?;

    let mut report = PromotionReport::default();
    let mut plans = Vec::new();
    let mut classes: HashMap<i64, Class> = HashMap::new();
    let mut sessions: HashMap<i64, AcademicSession> = HashMap::new();
    let mut seen = HashSet::new();

    for &student_id in student_ids {
        if !seen.insert(student_id) {
            continue;
        }

        let student = match get_student(pool, student_id).await {
            Ok(student) => student,
            Err(AppError::NotFound(_)) => {
                report.errors.push(PromotionFailure {
                    student_id,
                    reason: "student not found".to_string(),
                });
                continue;
            }
            Err(err) => return Err(err),
        };

        if !classes.contains_key(&student.class_id) {
            let class = get_class(pool, student.class_id).await?;
            classes.insert(class.id, class);
        }
        if !sessions.contains_key(&student.session_id) {
            let session = get_academic_session(pool, student.session_id).await?;
            sessions.insert(session.id, session);
        }

        let class = &classes[&student.class_id];
        let current_session = &sessions[&student.session_id];

        match plan_move(&student, class, current_session, &target_session) {
            Ok(plan) => plans.push(plan),
            Err(reason) => {
                warn!(student_id, reason = %reason, "Student skipped for promotion");
                report.errors.push(PromotionFailure { student_id, reason });
            }
        }
    }

    info!(planned = plans.len(), skipped = report.errors.len(), "Applying promotions");
    apply_moves(pool, plans, to_session_id, promoted_by, &mut report).await?;

    Ok(report)
}

/// Writes planned moves and their history rows in one transaction. A plan
/// whose student no longer matches the class and session it was made from
/// is reported in `errors` instead of applied.
#[instrument(skip(pool, plans, report), fields(count = plans.len()))]
pub async fn apply_moves(
    pool: &Pool<Sqlite>,
    plans: Vec<PlannedMove>,
    to_session_id: i64,
    promoted_by: i64,
    report: &mut PromotionReport,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    let mut applied = Vec::with_capacity(plans.len());

    for plan in plans {
        let updated = match plan.outcome {
            PromotionOutcome::Promoted => {
                sqlx::query(
                    "UPDATE students SET class_id = ?, section_id = NULL, session_id = ?
                     WHERE id = ? AND class_id = ? AND session_id = ? AND status = 'active'",
                )
                .bind(plan.to_class_id)
                .bind(to_session_id)
                .bind(plan.student_id)
                .bind(plan.from_class_id)
                .bind(plan.from_session_id)
                .execute(&mut *tx)
                .await?
            }
            PromotionOutcome::Graduated => {
                sqlx::query(
                    "UPDATE students SET status = ?, session_id = ?
                     WHERE id = ? AND class_id = ? AND session_id = ? AND status = 'active'",
                )
                .bind(StudentStatus::Graduated)
                .bind(to_session_id)
                .bind(plan.student_id)
                .bind(plan.from_class_id)
                .bind(plan.from_session_id)
                .execute(&mut *tx)
                .await?
            }
        };

        if updated.rows_affected() == 0 {
            warn!(student_id = plan.student_id, "Student changed before promotion was applied");
            report.errors.push(PromotionFailure {
                student_id: plan.student_id,
                reason: "student record changed during promotion".to_string(),
            });
            continue;
        }

        sqlx::query(
            "INSERT INTO promotions
                (student_id, from_class_id, to_class_id, from_session_id, to_session_id, outcome, promoted_by)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(plan.student_id)
        .bind(plan.from_class_id)
        .bind(plan.to_class_id)
        .bind(plan.from_session_id)
        .bind(to_session_id)
        .bind(plan.outcome)
        .bind(promoted_by)
        .execute(&mut *tx)
        .await?;

        applied.push(plan);
    }

    tx.commit().await?;

    for plan in applied {
        match plan.outcome {
            PromotionOutcome::Promoted => report.promoted.push(plan.student_id),
            PromotionOutcome::Graduated => report.graduated.push(plan.student_id),
        }
    }

    Ok(())
}

/// Promotes every active student of a class.
#[instrument(skip(pool))]
pub async fn promote_class(
    pool: &Pool<Sqlite>,
    class_id: i64,
    to_session_id: i64,
    promoted_by: i64,
) -> Result<PromotionReport, AppError> {
    get_class(pool, class_id).await?;

    let ids: Vec<i64> = list_students(pool, Some(class_id), None, false)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    if ids.is_empty() {
        return Ok(PromotionReport::default());
    }

    promote_students(pool, &ids, to_session_id, promoted_by).await
}

#[instrument(skip(pool))]
pub async fn list_promotions_for_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<Promotion>, AppError> {
    let rows = sqlx::query_as::<_, Promotion>(
        "SELECT id, student_id, from_class_id, to_class_id, from_session_id, to_session_id,
                outcome, promoted_by, promoted_at
         FROM promotions WHERE student_id = ? ORDER BY promoted_at, id",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
