use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AcademicSession {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub grade_level: i64,
    pub next_class_id: Option<i64>,
}

impl Class {
    /// A class with nowhere to promote to; its students graduate.
    pub fn is_terminal(&self) -> bool {
        self.next_class_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Section {
    pub id: i64,
    pub class_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Graduated,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub admission_number: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: i64,
    pub class_name: String, // Denormalized for convenience
    pub section_id: Option<i64>,
    pub section_name: Option<String>,
    pub session_id: i64,
    pub user_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub status: StudentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PromotionOutcome {
    Promoted,
    Graduated,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Promotion {
    pub id: i64,
    pub student_id: i64,
    pub from_class_id: i64,
    pub to_class_id: Option<i64>,
    pub from_session_id: i64,
    pub to_session_id: i64,
    pub outcome: PromotionOutcome,
    pub promoted_by: Option<i64>,
    pub promoted_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeacherAssignment {
    pub id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub class_id: i64,
    pub class_name: String,
    pub section_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub is_class_teacher: bool,
    pub can_mark_attendance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceSummary {
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeeStructure {
    pub id: i64,
    pub class_id: i64,
    pub session_id: i64,
    pub name: String,
    pub amount_cents: i64,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeePayment {
    pub id: i64,
    pub student_id: i64,
    pub fee_structure_id: i64,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub receipt_number: String,
    pub paid_on: NaiveDate,
    pub collected_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeeLine {
    pub fee_structure_id: i64,
    pub name: String,
    pub due_date: Option<NaiveDate>,
    pub due_cents: i64,
    pub paid_cents: i64,
}

impl FeeLine {
    pub fn balance_cents(&self) -> i64 {
        self.due_cents - self.paid_cents
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentFeeSummary {
    pub student_id: i64,
    pub lines: Vec<FeeLine>,
    pub total_due_cents: i64,
    pub total_paid_cents: i64,
    pub balance_cents: i64,
}

impl StudentFeeSummary {
    pub fn from_lines(student_id: i64, lines: Vec<FeeLine>) -> Self {
        let total_due_cents = lines.iter().map(|l| l.due_cents).sum();
        let total_paid_cents = lines.iter().map(|l| l.paid_cents).sum();
        let balance_cents = lines.iter().map(FeeLine::balance_cents).sum();

        Self {
            student_id,
            lines,
            total_due_cents,
            total_paid_cents,
            balance_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClassCollection {
    pub class_id: i64,
    pub class_name: String,
    pub due_cents: i64,
    pub collected_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Open,
    Responded,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: i64,
    pub submitted_by: i64,
    pub submitter_name: String,
    pub subject: String,
    pub message: String,
    pub status: FeedbackStatus,
    pub response: Option<String>,
    pub responded_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub responded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResultDeadline {
    pub id: i64,
    pub session_id: i64,
    pub class_id: Option<i64>,
    pub title: String,
    pub deadline: NaiveDate,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CertificateKind {
    Bonafide,
    Transfer,
    Character,
}

impl CertificateKind {
    pub fn serial_prefix(&self) -> &'static str {
        match self {
            CertificateKind::Bonafide => "BON",
            CertificateKind::Transfer => "TC",
            CertificateKind::Character => "CHR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Certificate {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub kind: CertificateKind,
    pub serial_number: String,
    pub issued_on: NaiveDate,
    pub issued_by: Option<i64>,
    pub remarks: Option<String>,
}
