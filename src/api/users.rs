use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Role, User};
use crate::db::{UserUpdate, create_user, get_user, list_users, update_user};
use crate::error::AppError;
use crate::validation::{ApiResult, JsonValidateExt};

use super::auth::UserData;
use super::parse_param;

#[get("/users?<role>")]
pub async fn api_list_users(
    role: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<UserData>>> {
    user.require_permission(db, Permission::ManageUsers).await?;

    let role = role.map(|r| parse_param::<Role>("role", r)).transpose()?;
    let users = list_users(db, role).await?;

    Ok(Json(users.into_iter().map(UserData::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Must be a valid email address"))]
    email: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    role: Role,
}

#[post("/users", data = "<request>")]
pub async fn api_create_user(
    request: Json<CreateUserRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<UserData>>> {
    user.require_permission(db, Permission::ManageUsers).await?;
    let validated = request.validate_custom()?;

    if !user.role.can_assign(validated.role) {
        return Err(AppError::Authorization(format!(
            "role {} cannot assign role {}",
            user.role, validated.role
        ))
        .into());
    }

    let id = create_user(
        db,
        validated.email.trim(),
        validated.name.trim(),
        &validated.password,
        validated.role,
    )
    .await?;

    let created = get_user(db, id).await?;
    Ok(Custom(Status::Created, Json(UserData::from(created))))
}

#[derive(Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: Option<String>,
    role: Option<Role>,
    is_active: Option<bool>,
}

/// Callers may only touch profiles they could have created, and may only
/// hand out roles they can assign.
#[put("/users/<id>", data = "<request>")]
pub async fn api_update_user(
    id: i64,
    request: Json<UpdateUserRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<UserData>> {
    user.require_permission(db, Permission::ManageUsers).await?;
    let validated = request.validate_custom()?;

    let target = get_user(db, id).await?;

    if target.id != user.id && !user.role.can_assign(target.role) {
        return Err(AppError::Authorization(format!(
            "role {} cannot manage a {} profile",
            user.role, target.role
        ))
        .into());
    }

    if let Some(role) = validated.role {
        if target.id == user.id && role != user.role {
            return Err(AppError::Validation("cannot change your own role".to_string()).into());
        }
        if !user.role.can_assign(role) && role != target.role {
            return Err(AppError::Authorization(format!(
                "role {} cannot assign role {}",
                user.role, role
            ))
            .into());
        }
    }

    if validated.is_active == Some(false) && target.id == user.id {
        return Err(AppError::Validation("cannot deactivate your own profile".to_string()).into());
    }

    update_user(
        db,
        id,
        UserUpdate {
            name: validated.name.as_deref().map(str::trim),
            role: validated.role,
            is_active: validated.is_active,
        },
    )
    .await?;

    Ok(Json(UserData::from(get_user(db, id).await?)))
}
