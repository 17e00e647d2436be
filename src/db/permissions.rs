use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{Permission, Role};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RolePermission {
    pub role: Role,
    pub permission: Permission,
}

#[instrument(skip(pool))]
pub async fn role_has_permission(
    pool: &Pool<Sqlite>,
    role: Role,
    permission: Permission,
) -> Result<bool, AppError> {
    let (granted,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM role_permissions WHERE role = ? AND permission = ?)",
    )
    .bind(role)
    .bind(permission)
    .fetch_one(pool)
    .await?;

    Ok(granted)
}

#[instrument(skip(pool))]
pub async fn list_role_permissions(pool: &Pool<Sqlite>) -> Result<Vec<RolePermission>, AppError> {
    info!("Listing role permissions");
    let rows = sqlx::query_as::<_, RolePermission>(
        "SELECT role, permission FROM role_permissions ORDER BY role, permission",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Idempotent; granting to an admin role is rejected because those roles
/// never consult the table.
#[instrument(skip(pool))]
pub async fn grant_permission(
    pool: &Pool<Sqlite>,
    role: Role,
    permission: Permission,
) -> Result<(), AppError> {
    if role.bypasses_permission_table() {
        return Err(AppError::Validation(format!(
            "role {} already holds every permission",
            role
        )));
    }

    info!("Granting permission");
    sqlx::query("INSERT OR IGNORE INTO role_permissions (role, permission) VALUES (?, ?)")
        .bind(role)
        .bind(permission)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn revoke_permission(
    pool: &Pool<Sqlite>,
    role: Role,
    permission: Permission,
) -> Result<bool, AppError> {
    info!("Revoking permission");
    let res = sqlx::query("DELETE FROM role_permissions WHERE role = ? AND permission = ?")
        .bind(role)
        .bind(permission)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}
