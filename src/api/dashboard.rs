use chrono::Utc;
use rocket::State;
use rocket::serde::{Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::{Role, User};
use crate::db::{
    ClassMarkedToday, FeeTotals, SchoolOverview, attendance_summary, get_active_session,
    list_students_for_user, list_teacher_assignments, school_overview, session_fee_totals,
    student_fee_summary, teacher_marked_on,
};
use crate::error::AppError;
use crate::models::{AcademicSession, AttendanceSummary, Student, TeacherAssignment};
use crate::validation::ApiResult;

#[derive(Debug, Serialize)]
pub struct LinkedStudent {
    pub student: Student,
    pub attendance: AttendanceSummary,
    pub fee_balance_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dashboard {
    School(SchoolOverview),
    Teacher {
        assignments: Vec<TeacherAssignment>,
        marked_today: Vec<ClassMarkedToday>,
    },
    Accountant {
        active_session: Option<AcademicSession>,
        totals: FeeTotals,
    },
    Family {
        students: Vec<LinkedStudent>,
    },
}

async fn family_dashboard(db: &Pool<Sqlite>, user: &User) -> Result<Dashboard, AppError> {
    let mut students = Vec::new();

    for student in list_students_for_user(db, user.id).await? {
        let attendance = attendance_summary(db, student.id, None, None).await?;
        let fees = student_fee_summary(db, student.id).await?;
        students.push(LinkedStudent {
            student,
            attendance,
            fee_balance_cents: fees.balance_cents,
        });
    }

    Ok(Dashboard::Family { students })
}

#[get("/dashboard")]
pub async fn api_dashboard(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Dashboard>> {
    let dashboard = match user.role {
        Role::SuperAdmin | Role::Admin | Role::Operator => {
            Dashboard::School(school_overview(db).await?)
        }
        Role::Teacher => Dashboard::Teacher {
            assignments: list_teacher_assignments(db, Some(user.id), None).await?,
            marked_today: teacher_marked_on(db, user.id, Utc::now().date_naive()).await?,
        },
        Role::Accountant => {
            let active_session = get_active_session(db).await?;
            let totals = match &active_session {
                Some(session) => session_fee_totals(db, session.id).await?,
                None => FeeTotals::default(),
            };
            Dashboard::Accountant {
                active_session,
                totals,
            }
        }
        Role::Student | Role::Parent => family_dashboard(db, &user).await?,
    };

    Ok(Json(dashboard))
}
