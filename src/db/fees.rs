use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    ClassCollection, FeeLine, FeePayment, FeeStructure, PaymentMethod, StudentFeeSummary,
};

use super::{get_academic_session, get_class, get_student};

#[derive(Debug, Clone)]
pub struct NewFeeStructure {
    pub class_id: i64,
    pub session_id: i64,
    pub name: String,
    pub amount_cents: i64,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub student_id: i64,
    pub fee_structure_id: i64,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
}

fn generate_receipt_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("RCPT-{}", suffix[..12].to_uppercase())
}

#[instrument(skip(pool))]
pub async fn list_fee_structures(
    pool: &Pool<Sqlite>,
    session_id: Option<i64>,
    class_id: Option<i64>,
) -> Result<Vec<FeeStructure>, AppError> {
    let rows = sqlx::query_as::<_, FeeStructure>(
        "SELECT id, class_id, session_id, name, amount_cents, due_date
         FROM fee_structures
         WHERE (?1 IS NULL OR session_id = ?1) AND (?2 IS NULL OR class_id = ?2)
         ORDER BY due_date, name",
    )
    .bind(session_id)
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_fee_structure(pool: &Pool<Sqlite>, id: i64) -> Result<FeeStructure, AppError> {
    let row = sqlx::query_as::<_, FeeStructure>(
        "SELECT id, class_id, session_id, name, amount_cents, due_date FROM fee_structures WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Fee structure {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn create_fee_structure(
    pool: &Pool<Sqlite>,
    fee: &NewFeeStructure,
) -> Result<i64, AppError> {
    if fee.amount_cents <= 0 {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }

    get_class(pool, fee.class_id).await?;
    get_academic_session(pool, fee.session_id).await?;

    info!("Creating fee structure");
    let res = sqlx::query(
        "INSERT INTO fee_structures (class_id, session_id, name, amount_cents, due_date)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(fee.class_id)
    .bind(fee.session_id)
    .bind(&fee.name)
    .bind(fee.amount_cents)
    .bind(fee.due_date)
    .execute(pool)
    .await
    .map_err(|e| {
        AppError::unique_violation(
            e,
            format!("Fee '{}' already exists for this class and session", fee.name),
        )
    })?;

    Ok(res.last_insert_rowid())
}

/// Records a payment against one fee structure. The structure must belong
/// to the student's class and session, and the payment may not exceed what
/// is still owed. Balance check and insert share a transaction.
#[instrument(skip(pool))]
pub async fn record_payment(
    pool: &Pool<Sqlite>,
    payment: &NewPayment,
    collected_by: i64,
) -> Result<FeePayment, AppError> {
    if payment.amount_cents <= 0 {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }

    let student = get_student(pool, payment.student_id).await?;
    let fee = get_fee_structure(pool, payment.fee_structure_id).await?;

    if fee.class_id != student.class_id || fee.session_id != student.session_id {
        return Err(AppError::Validation(format!(
            "fee '{}' does not apply to student {}",
            fee.name, student.id
        )));
    }

    let mut tx = pool.begin().await?;

    let (paid,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM fee_payments
         WHERE student_id = ? AND fee_structure_id = ?",
    )
    .bind(payment.student_id)
    .bind(payment.fee_structure_id)
    .fetch_one(&mut *tx)
    .await?;

    let remaining = fee.amount_cents - paid;
    if payment.amount_cents > remaining {
        tx.rollback().await?;
        return Err(AppError::Validation(format!(
            "payment of {} exceeds remaining balance of {}",
            payment.amount_cents, remaining
        )));
    }

    info!(remaining, "Recording fee payment");
    let receipt_number = generate_receipt_number();
    let id = sqlx::query(
        "INSERT INTO fee_payments
            (student_id, fee_structure_id, amount_cents, method, receipt_number, paid_on, collected_by)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payment.student_id)
    .bind(payment.fee_structure_id)
    .bind(payment.amount_cents)
    .bind(payment.method)
    .bind(&receipt_number)
    .bind(payment.paid_on)
    .bind(collected_by)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(FeePayment {
        id,
        student_id: payment.student_id,
        fee_structure_id: payment.fee_structure_id,
        amount_cents: payment.amount_cents,
        method: payment.method,
        receipt_number,
        paid_on: payment.paid_on,
        collected_by: Some(collected_by),
    })
}

#[instrument(skip(pool))]
pub async fn list_payments_for_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<FeePayment>, AppError> {
    let rows = sqlx::query_as::<_, FeePayment>(
        "SELECT id, student_id, fee_structure_id, amount_cents, method, receipt_number, paid_on, collected_by
         FROM fee_payments WHERE student_id = ? ORDER BY paid_on, id",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fees due for the student's current class and session, with what has
/// been paid against each.
#[instrument(skip(pool))]
pub async fn student_fee_summary(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<StudentFeeSummary, AppError> {
    let student = get_student(pool, student_id).await?;

    let lines = sqlx::query_as::<_, FeeLine>(
        "SELECT f.id AS fee_structure_id, f.name, f.due_date, f.amount_cents AS due_cents,
                COALESCE((SELECT SUM(p.amount_cents) FROM fee_payments p
                          WHERE p.fee_structure_id = f.id AND p.student_id = ?1), 0) AS paid_cents
         FROM fee_structures f
         WHERE f.class_id = ?2 AND f.session_id = ?3
         ORDER BY f.due_date, f.name",
    )
    .bind(student.id)
    .bind(student.class_id)
    .bind(student.session_id)
    .fetch_all(pool)
    .await?;

    Ok(StudentFeeSummary::from_lines(student.id, lines))
}

/// Per-class totals for a session: what active students owe and what has
/// been collected.
#[instrument(skip(pool))]
pub async fn collection_summary(
    pool: &Pool<Sqlite>,
    session_id: i64,
) -> Result<Vec<ClassCollection>, AppError> {
    let rows = sqlx::query_as::<_, ClassCollection>(
        "SELECT c.id AS class_id, c.name AS class_name,
                COALESCE((SELECT SUM(f.amount_cents) FROM fee_structures f
                          WHERE f.class_id = c.id AND f.session_id = ?1), 0)
                  * (SELECT COUNT(*) FROM students s
                     WHERE s.class_id = c.id AND s.session_id = ?1 AND s.status = 'active') AS due_cents,
                COALESCE((SELECT SUM(p.amount_cents) FROM fee_payments p
                          JOIN fee_structures f ON f.id = p.fee_structure_id
                          WHERE f.class_id = c.id AND f.session_id = ?1), 0) AS collected_cents
         FROM classes c
         ORDER BY c.grade_level, c.name",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
