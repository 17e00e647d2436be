use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::db::role_has_permission;
use crate::error::AppError;

use super::{Permission, Role};

/// An authenticated profile.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
}

impl User {
    /// Admin roles are granted everything; other roles need a matching
    /// `role_permissions` row. Never cached.
    pub async fn has_permission(
        &self,
        pool: &Pool<Sqlite>,
        permission: Permission,
    ) -> Result<bool, AppError> {
        if self.role.bypasses_permission_table() {
            return Ok(true);
        }

        role_has_permission(pool, self.role, permission).await
    }

    pub async fn require_permission(
        &self,
        pool: &Pool<Sqlite>,
        permission: Permission,
    ) -> Result<(), AppError> {
        if self.has_permission(pool, permission).await? {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role,
                permission = %permission,
                "Permission denied"
            );
            Err(AppError::Authorization(format!(
                "role {} lacks permission {}",
                self.role, permission
            )))
        }
    }

    pub fn require_role_level(&self, required: Role) -> Result<(), AppError> {
        if self.role.has_role_level(required) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role,
                required = %required,
                "Role level too low"
            );
            Err(AppError::Authorization(format!(
                "role {} is below {}",
                self.role, required
            )))
        }
    }

    pub fn require_any_role(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role,
                roles = ?roles,
                "Role not in allow-list"
            );
            Err(AppError::Authorization(format!(
                "role {} is not allowed here",
                self.role
            )))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.bypasses_permission_table()
    }
}
