use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named capabilities that can be granted to non-admin roles through the
/// `role_permissions` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Permission {
    ViewStudents,
    ManageStudents,
    ManageClasses,
    ManageSessions,
    PromoteStudents,
    CollectFees,
    ViewFees,
    ManageTeacherAssignments,
    MarkAttendance,
    ViewAttendance,
    RespondFeedback,
    ManageResultDeadlines,
    IssueCertificates,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::ViewStudents,
        Permission::ManageStudents,
        Permission::ManageClasses,
        Permission::ManageSessions,
        Permission::PromoteStudents,
        Permission::CollectFees,
        Permission::ViewFees,
        Permission::ManageTeacherAssignments,
        Permission::MarkAttendance,
        Permission::ViewAttendance,
        Permission::RespondFeedback,
        Permission::ManageResultDeadlines,
        Permission::IssueCertificates,
        Permission::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewStudents => "view_students",
            Permission::ManageStudents => "manage_students",
            Permission::ManageClasses => "manage_classes",
            Permission::ManageSessions => "manage_sessions",
            Permission::PromoteStudents => "promote_students",
            Permission::CollectFees => "collect_fees",
            Permission::ViewFees => "view_fees",
            Permission::ManageTeacherAssignments => "manage_teacher_assignments",
            Permission::MarkAttendance => "mark_attendance",
            Permission::ViewAttendance => "view_attendance",
            Permission::RespondFeedback => "respond_feedback",
            Permission::ManageResultDeadlines => "manage_result_deadlines",
            Permission::IssueCertificates => "issue_certificates",
            Permission::ManageUsers => "manage_users",
        }
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::msg(format!("Unknown permission: {}", s)))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Student,
    Parent,
    Operator,
    Teacher,
    Accountant,
    Admin,
    SuperAdmin,
}

/// Fixed ordinal ranking used for coarse access checks.
pub const ROLE_HIERARCHY: [(Role, u8); 7] = [
    (Role::Student, 1),
    (Role::Parent, 2),
    (Role::Operator, 3),
    (Role::Teacher, 4),
    (Role::Accountant, 5),
    (Role::Admin, 6),
    (Role::SuperAdmin, 7),
];

impl Role {
    pub fn level(&self) -> u8 {
        ROLE_HIERARCHY
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, level)| *level)
            .unwrap_or(0)
    }

    /// True when `self` sits at or above `required` in the hierarchy.
    pub fn has_role_level(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    /// Admin roles hold every permission without consulting the table.
    pub fn bypasses_permission_table(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// Super admins may hand out any role; everyone else only roles
    /// strictly below their own.
    pub fn can_assign(&self, target: Role) -> bool {
        match self {
            Role::SuperAdmin => true,
            _ => self.level() > target.level(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Operator => "operator",
            Role::Teacher => "teacher",
            Role::Accountant => "accountant",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ROLE_HIERARCHY
            .iter()
            .map(|(role, _)| *role)
            .find(|role| role.as_str() == s)
            .ok_or_else(|| Error::msg(format!("Unknown role: {}", s)))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
