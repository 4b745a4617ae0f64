//! Database operations for the `categories` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const CATEGORY_COLUMNS: &str =
    "id, name, name_ar, description, description_ar, image, is_active, created_at, updated_at";

/// A row from the `categories` table. Names are stored in English and Arabic.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    /// Image URL; empty string when none was uploaded.
    pub image: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub name_ar: &'a str,
    pub description: Option<&'a str>,
    pub description_ar: Option<&'a str>,
    pub image: Option<&'a str>,
}

/// Patch for [`update_category`]. `None` keeps the stored value.
///
/// The nullable description columns use `Option<Option<_>>` so a caller can
/// distinguish "leave alone" from "clear".
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate<'a> {
    pub name: Option<&'a str>,
    pub name_ar: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub description_ar: Option<Option<&'a str>>,
    pub image: Option<&'a str>,
}

/// Active categories ordered by English name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active ORDER BY name, id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetches a category by id, including inactive ones.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_category(pool: &PgPool, id: i64) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_category(pool: &PgPool, new: &NewCategory<'_>) -> Result<CategoryRow, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "INSERT INTO categories (name, name_ar, description, description_ar, image) \
         VALUES ($1, $2, $3, $4, COALESCE($5, '')) \
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(new.name)
    .bind(new.name_ar)
    .bind(new.description)
    .bind(new.description_ar)
    .bind(new.image)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Applies a partial update.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no category has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn update_category(
    pool: &PgPool,
    id: i64,
    patch: &CategoryUpdate<'_>,
) -> Result<CategoryRow, DbError> {
    sqlx::query_as::<_, CategoryRow>(&format!(
        "UPDATE categories \
         SET name           = COALESCE($2, name), \
             name_ar        = COALESCE($3, name_ar), \
             description    = CASE WHEN $4::BOOL THEN $5 ELSE description END, \
             description_ar = CASE WHEN $6::BOOL THEN $7 ELSE description_ar END, \
             image          = COALESCE($8, image), \
             updated_at     = NOW() \
         WHERE id = $1 \
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id)
    .bind(patch.name)
    .bind(patch.name_ar)
    .bind(patch.description.is_some())
    .bind(patch.description.flatten())
    .bind(patch.description_ar.is_some())
    .bind(patch.description_ar.flatten())
    .bind(patch.image)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Soft-deletes a category. Products keep their reference.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no category has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn deactivate_category(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE categories SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
