use chrono::{Datelike, NaiveDate};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Certificate, CertificateKind, StudentStatus};

use super::get_student;

const CERTIFICATE_SELECT: &str = "SELECT c.id, c.student_id, s.name AS student_name, c.kind,
        c.serial_number, c.issued_on, c.issued_by, c.remarks
     FROM certificates c
     JOIN students s ON s.id = c.student_id";

fn generate_serial(kind: CertificateKind, issued_on: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        kind.serial_prefix(),
        issued_on.year(),
        suffix[..8].to_uppercase()
    )
}

/// Issues a certificate. A transfer certificate withdraws the student in
/// the same transaction.
#[instrument(skip(pool, remarks))]
pub async fn issue_certificate(
    pool: &Pool<Sqlite>,
    student_id: i64,
    kind: CertificateKind,
    issued_on: NaiveDate,
    remarks: Option<&str>,
    issued_by: i64,
) -> Result<Certificate, AppError> {
    let student = get_student(pool, student_id).await?;

    if kind == CertificateKind::Transfer && student.status == StudentStatus::Withdrawn {
        return Err(AppError::Conflict(format!(
            "Student {} has already been withdrawn",
            student_id
        )));
    }

    let serial_number = generate_serial(kind, issued_on);

    info!(serial = %serial_number, "Issuing certificate");
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        "INSERT INTO certificates (student_id, kind, serial_number, issued_on, issued_by, remarks)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(student_id)
    .bind(kind)
    .bind(&serial_number)
    .bind(issued_on)
    .bind(issued_by)
    .bind(remarks)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    if kind == CertificateKind::Transfer {
        sqlx::query("UPDATE students SET status = ? WHERE id = ?")
            .bind(StudentStatus::Withdrawn)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(Certificate {
        id,
        student_id,
        student_name: student.name,
        kind,
        serial_number,
        issued_on,
        issued_by: Some(issued_by),
        remarks: remarks.map(String::from),
    })
}

#[instrument(skip(pool))]
pub async fn list_certificates_for_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<Certificate>, AppError> {
    let rows = sqlx::query_as::<_, Certificate>(&format!(
        "{} WHERE c.student_id = ? ORDER BY c.issued_on, c.id",
        CERTIFICATE_SELECT
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn find_certificate_by_serial(
    pool: &Pool<Sqlite>,
    serial_number: &str,
) -> Result<Certificate, AppError> {
    let row = sqlx::query_as::<_, Certificate>(&format!(
        "{} WHERE c.serial_number = ?",
        CERTIFICATE_SELECT
    ))
    .bind(serial_number)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Certificate {} not found", serial_number)))
}
