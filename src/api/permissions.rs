use rocket::State;
use rocket::http::Status;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Role, User};
use crate::db::{RolePermission, grant_permission, list_role_permissions, revoke_permission};
use crate::error::AppError;
use crate::validation::ApiResult;

use super::parse_param;

#[get("/permissions")]
pub async fn api_list_permissions(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<RolePermission>>> {
    user.require_permission(db, Permission::ManageUsers).await?;

    Ok(Json(list_role_permissions(db).await?))
}

#[derive(Deserialize)]
pub struct PermissionGrant {
    role: Role,
    permission: Permission,
}

#[post("/permissions", data = "<grant>")]
pub async fn api_grant_permission(
    grant: Json<PermissionGrant>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_role_level(Role::Admin)?;

    grant_permission(db, grant.role, grant.permission).await?;

    Ok(Status::Ok)
}

#[delete("/permissions", data = "<grant>")]
pub async fn api_revoke_permission(
    grant: Json<PermissionGrant>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_role_level(Role::Admin)?;

    if revoke_permission(db, grant.role, grant.permission).await? {
        Ok(Status::Ok)
    } else {
        Err(AppError::NotFound(format!(
            "role {} does not hold {}",
            grant.role, grant.permission
        ))
        .into())
    }
}

#[derive(Serialize, Deserialize)]
pub struct PermissionCheck {
    pub permission: Permission,
    pub granted: bool,
}

#[get("/permissions/check?<permission>")]
pub async fn api_check_permission(
    permission: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<PermissionCheck>> {
    let permission = parse_param::<Permission>("permission", permission)?;
    let granted = user.has_permission(db, permission).await?;

    Ok(Json(PermissionCheck {
        permission,
        granted,
    }))
}
