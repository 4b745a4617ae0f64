//! Database operations for the `users` table.

use butcher_core::Role;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const USER_COLUMNS: &str = "id, first_name, last_name, father_name, email, mobile, \
                            password_hash, role, is_banned, created_at, updated_at";

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub father_name: String,
    pub email: String,
    pub mobile: String,
    /// Argon2 PHC string; never leaves the server.
    pub password_hash: String,
    /// `"customer"` or `"admin"`, enforced by a CHECK constraint.
    pub role: String,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Parsed role. Unknown values fall back to the least-privileged role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Customer)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub father_name: &'a str,
    pub email: &'a str,
    pub mobile: &'a str,
    pub password_hash: &'a str,
}

/// Inserts a customer account.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on failure; a duplicate email or mobile surfaces
/// as a unique violation (see [`DbError::is_unique_violation`]).
pub async fn create_user(pool: &PgPool, user: &NewUser<'_>) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (first_name, last_name, father_name, email, mobile, password_hash, role) \
         VALUES ($1, $2, $3, $4, $5, $6, 'customer') \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.father_name)
    .bind(user.email)
    .bind(user.mobile)
    .bind(user.password_hash)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Creates or refreshes an administrator account keyed by email.
///
/// An existing account with the same email is promoted to admin, unbanned and
/// given the new password hash.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_admin(pool: &PgPool, user: &NewUser<'_>) -> Result<UserRow, DbError> {
    let mut tx = pool.begin().await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(user.email)
            .fetch_optional(&mut *tx)
            .await?;

    let row = if let Some(id) = existing {
        sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users \
             SET password_hash = $2, role = 'admin', is_banned = FALSE, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(user.password_hash)
        .fetch_one(&mut *tx)
        .await?
    } else {
        sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (first_name, last_name, father_name, email, mobile, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5, $6, 'admin') \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.father_name)
        .bind(user.email)
        .bind(user.mobile)
        .bind(user.password_hash)
        .fetch_one(&mut *tx)
        .await?
    };

    tx.commit().await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_id(pool: &PgPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Case-insensitive lookup by email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Reports which of `email` / `mobile` already belong to an account, as
/// `(email_taken, mobile_taken)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn email_or_mobile_taken(
    pool: &PgPool,
    email: &str,
    mobile: &str,
) -> Result<(bool, bool), DbError> {
    let taken: (bool, bool) = sqlx::query_as(
        "SELECT \
             EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1)), \
             EXISTS (SELECT 1 FROM users WHERE mobile = $2)",
    )
    .bind(email)
    .bind(mobile)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

/// All customer accounts, newest first. Admins are excluded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_customers(pool: &PgPool) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = 'customer' ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Sets the ban flag and returns the updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no user has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn set_user_banned(pool: &PgPool, id: i64, banned: bool) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET is_banned = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(banned)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
