use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

pub const CURRENT_SCHEMA: &str = r#"
PRAGMA foreign_keys = 1;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('student', 'parent', 'operator', 'teacher', 'accountant', 'admin', 'super_admin')),
    password TEXT NOT NULL DEFAULT '',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    token TEXT NOT NULL UNIQUE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role TEXT NOT NULL CHECK (role IN ('student', 'parent', 'operator', 'teacher', 'accountant')),
    permission TEXT NOT NULL,
    PRIMARY KEY (role, permission)
);

CREATE TABLE IF NOT EXISTS academic_sessions (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT FALSE,
    CHECK (end_date > start_date)
);

CREATE UNIQUE INDEX IF NOT EXISTS academic_sessions_single_active
    ON academic_sessions (is_active) WHERE is_active = 1;

CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    grade_level INTEGER NOT NULL,
    next_class_id INTEGER,
    FOREIGN KEY (next_class_id) REFERENCES classes (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS sections (
    id INTEGER PRIMARY KEY,
    class_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    UNIQUE (class_id, name),
    FOREIGN KEY (class_id) REFERENCES classes (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS subjects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    code TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY,
    admission_number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    date_of_birth DATE,
    class_id INTEGER NOT NULL,
    section_id INTEGER,
    session_id INTEGER NOT NULL,
    user_id INTEGER,
    parent_id INTEGER,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'graduated', 'withdrawn')),
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (class_id) REFERENCES classes (id),
    FOREIGN KEY (section_id) REFERENCES sections (id),
    FOREIGN KEY (session_id) REFERENCES academic_sessions (id),
    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE SET NULL,
    FOREIGN KEY (parent_id) REFERENCES users (id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS students_class ON students (class_id, section_id);

CREATE TABLE IF NOT EXISTS promotions (
    id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL,
    from_class_id INTEGER NOT NULL,
    to_class_id INTEGER,
    from_session_id INTEGER NOT NULL,
    to_session_id INTEGER NOT NULL,
    outcome TEXT NOT NULL CHECK (outcome IN ('promoted', 'graduated')),
    promoted_by INTEGER,
    promoted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (student_id) REFERENCES students (id) ON DELETE CASCADE,
    FOREIGN KEY (from_class_id) REFERENCES classes (id),
    FOREIGN KEY (to_class_id) REFERENCES classes (id),
    FOREIGN KEY (from_session_id) REFERENCES academic_sessions (id),
    FOREIGN KEY (to_session_id) REFERENCES academic_sessions (id),
    FOREIGN KEY (promoted_by) REFERENCES users (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS teacher_assignments (
    id INTEGER PRIMARY KEY,
    teacher_id INTEGER NOT NULL,
    class_id INTEGER NOT NULL,
    section_id INTEGER,
    subject_id INTEGER,
    is_class_teacher BOOLEAN NOT NULL DEFAULT FALSE,
    can_mark_attendance BOOLEAN NOT NULL DEFAULT FALSE,
    FOREIGN KEY (teacher_id) REFERENCES users (id) ON DELETE CASCADE,
    FOREIGN KEY (class_id) REFERENCES classes (id) ON DELETE CASCADE,
    FOREIGN KEY (section_id) REFERENCES sections (id) ON DELETE CASCADE,
    FOREIGN KEY (subject_id) REFERENCES subjects (id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS teacher_assignments_unique
    ON teacher_assignments (teacher_id, class_id, IFNULL(section_id, 0), IFNULL(subject_id, 0));

CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL,
    date DATE NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('present', 'absent', 'late', 'excused')),
    marked_by INTEGER,
    marked_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (student_id, date),
    FOREIGN KEY (student_id) REFERENCES students (id) ON DELETE CASCADE,
    FOREIGN KEY (marked_by) REFERENCES users (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS fee_structures (
    id INTEGER PRIMARY KEY,
    class_id INTEGER NOT NULL,
    session_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
    due_date DATE,
    UNIQUE (class_id, session_id, name),
    FOREIGN KEY (class_id) REFERENCES classes (id) ON DELETE CASCADE,
    FOREIGN KEY (session_id) REFERENCES academic_sessions (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS fee_payments (
    id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL,
    fee_structure_id INTEGER NOT NULL,
    amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
    method TEXT NOT NULL CHECK (method IN ('cash', 'card', 'bank_transfer', 'cheque')),
    receipt_number TEXT NOT NULL UNIQUE,
    paid_on DATE NOT NULL,
    collected_by INTEGER,
    FOREIGN KEY (student_id) REFERENCES students (id) ON DELETE CASCADE,
    FOREIGN KEY (fee_structure_id) REFERENCES fee_structures (id) ON DELETE CASCADE,
    FOREIGN KEY (collected_by) REFERENCES users (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY,
    submitted_by INTEGER NOT NULL,
    subject TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'responded')),
    response TEXT,
    responded_by INTEGER,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    responded_at TIMESTAMP,
    FOREIGN KEY (submitted_by) REFERENCES users (id) ON DELETE CASCADE,
    FOREIGN KEY (responded_by) REFERENCES users (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS result_deadlines (
    id INTEGER PRIMARY KEY,
    session_id INTEGER NOT NULL,
    class_id INTEGER,
    title TEXT NOT NULL,
    deadline DATE NOT NULL,
    created_by INTEGER,
    FOREIGN KEY (session_id) REFERENCES academic_sessions (id) ON DELETE CASCADE,
    FOREIGN KEY (class_id) REFERENCES classes (id) ON DELETE CASCADE,
    FOREIGN KEY (created_by) REFERENCES users (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('bonafide', 'transfer', 'character')),
    serial_number TEXT NOT NULL UNIQUE,
    issued_on DATE NOT NULL,
    issued_by INTEGER,
    remarks TEXT,
    FOREIGN KEY (student_id) REFERENCES students (id) ON DELETE CASCADE,
    FOREIGN KEY (issued_by) REFERENCES users (id) ON DELETE SET NULL
);

INSERT OR IGNORE INTO role_permissions (role, permission) VALUES
    ('operator', 'view_students'),
    ('operator', 'manage_students'),
    ('operator', 'view_attendance'),
    ('operator', 'issue_certificates'),
    ('teacher', 'view_students'),
    ('teacher', 'mark_attendance'),
    ('teacher', 'view_attendance'),
    ('accountant', 'view_students'),
    ('accountant', 'collect_fees'),
    ('accountant', 'view_fees');
"#;

#[instrument(skip(pool))]
pub async fn apply_schema(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Applying database schema");

    sqlx::raw_sql(CURRENT_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to apply schema: {}", e)))?;

    Ok(())
}
