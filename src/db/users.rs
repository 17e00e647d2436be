use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{Role, User};
use crate::error::AppError;

const USER_COLUMNS: &str = "SELECT id, email, name, role, is_active FROM users";

const HASH_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

/// Emails are stored and compared lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, User>(&format!("{} WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| AppError::NotFound(format!("User with id {} not found in database", id)))
}

#[instrument(skip(pool))]
pub async fn find_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
    info!("Finding user by email");
    let row = sqlx::query_as::<_, User>(&format!("{} WHERE email = ?", USER_COLUMNS))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns the profile when the password matches; inactive profiles never
/// authenticate.
#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let email = normalize_email(email);
    let hash: Option<(String,)> = sqlx::query_as("SELECT password FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    let Some((hash,)) = hash else {
        return Ok(None);
    };

    if !bcrypt::verify(password, &hash).unwrap_or(false) {
        return Ok(None);
    }

    match find_user_by_email(pool, &email).await? {
        Some(user) if user.is_active => Ok(Some(user)),
        Some(_) => {
            warn!("Login attempt for inactive profile");
            Ok(None)
        }
        None => Ok(None),
    }
}

#[instrument(skip(pool, password))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    email: &str,
    name: &str,
    password: &str,
    role: Role,
) -> Result<i64, AppError> {
    info!("Creating new user");
    let email = normalize_email(email);

    if find_user_by_email(pool, &email).await?.is_some() {
        return Err(AppError::Conflict(format!("Email '{}' already exists", email)));
    }

    let hashed_password = bcrypt::hash(password, HASH_COST)?;

    let res = sqlx::query("INSERT INTO users (email, name, password, role) VALUES (?, ?, ?, ?)")
        .bind(&email)
        .bind(name)
        .bind(hashed_password)
        .bind(role)
        .execute(pool)
        .await
        .map_err(|e| AppError::unique_violation(e, format!("Email '{}' already exists", email)))?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_users(pool: &Pool<Sqlite>, role: Option<Role>) -> Result<Vec<User>, AppError> {
    info!("Listing users");
    let users = match role {
        Some(role) => {
            sqlx::query_as::<_, User>(&format!("{} WHERE role = ? ORDER BY name", USER_COLUMNS))
                .bind(role)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as::<_, User>(&format!("{} ORDER BY name", USER_COLUMNS))
                .fetch_all(pool)
                .await?
        }
    };

    Ok(users)
}

#[instrument(skip(pool))]
pub async fn update_user_name(pool: &Pool<Sqlite>, user_id: i64, name: &str) -> Result<(), AppError> {
    info!("Updating user name");
    let res = sqlx::query("UPDATE users SET name = ? WHERE id = ?")
        .bind(name)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    Ok(())
}

/// Fields of a profile that management can change. `None` leaves the
/// column as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserUpdate<'a> {
    pub name: Option<&'a str>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Applies a profile update in one transaction. Deactivating a profile also
/// ends every login session it holds.
#[instrument(skip(pool))]
pub async fn update_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
    update: UserUpdate<'_>,
) -> Result<(), AppError> {
    info!("Updating user profile");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "UPDATE users
         SET name = COALESCE(?, name),
             role = COALESCE(?, role),
             is_active = COALESCE(?, is_active)
         WHERE id = ?",
    )
    .bind(update.name)
    .bind(update.role)
    .bind(update.is_active)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    if update.is_active == Some(false) {
        sqlx::query("DELETE FROM user_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, HASH_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Creates a super admin when none exists yet. Returns the new id, if any.
#[instrument(skip(pool, password))]
pub async fn ensure_bootstrap_admin(
    pool: &Pool<Sqlite>,
    email: &str,
    name: &str,
    password: &str,
) -> Result<Option<i64>, AppError> {
    let (existing,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'super_admin'")
            .fetch_one(pool)
            .await?;

    if existing > 0 {
        return Ok(None);
    }

    info!("No super admin found, creating bootstrap account");
    let id = create_user(pool, email, name, password, Role::SuperAdmin).await?;
    Ok(Some(id))
}
