//! Database operations for `meat_types`, the priced variants of a product
//! (e.g. "lamb", "veal" for a minced-meat product).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

const MEAT_TYPE_COLUMNS: &str = "id, product_id, name, name_ar, description, description_ar, \
                                 price_usd, price_lbp, is_active, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MeatTypeRow {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub price_usd: Decimal,
    pub price_lbp: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMeatType<'a> {
    pub product_id: i64,
    pub name: &'a str,
    pub name_ar: &'a str,
    pub description: Option<&'a str>,
    pub description_ar: Option<&'a str>,
    pub price_usd: Decimal,
    pub price_lbp: Decimal,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct MeatTypeUpdate<'a> {
    pub name: Option<&'a str>,
    pub name_ar: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub description_ar: Option<Option<&'a str>>,
    pub price_usd: Option<Decimal>,
    pub price_lbp: Option<Decimal>,
}

/// Active meat types of one product, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_meat_types_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<MeatTypeRow>, DbError> {
    let rows = sqlx::query_as::<_, MeatTypeRow>(&format!(
        "SELECT {MEAT_TYPE_COLUMNS} FROM meat_types \
         WHERE product_id = $1 AND is_active \
         ORDER BY created_at, id"
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Active meat types for a batch of products, grouped by caller.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_meat_types_for_products(
    pool: &PgPool,
    product_ids: &[i64],
) -> Result<Vec<MeatTypeRow>, DbError> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, MeatTypeRow>(&format!(
        "SELECT {MEAT_TYPE_COLUMNS} FROM meat_types \
         WHERE product_id = ANY($1) AND is_active \
         ORDER BY product_id, created_at, id"
    ))
    .bind(product_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_meat_type(pool: &PgPool, id: i64) -> Result<Option<MeatTypeRow>, DbError> {
    let row = sqlx::query_as::<_, MeatTypeRow>(&format!(
        "SELECT {MEAT_TYPE_COLUMNS} FROM meat_types WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_active_meat_types(pool: &PgPool, product_id: i64) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM meat_types WHERE product_id = $1 AND is_active",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Inserts a meat type for a product, enforcing `max_per_product` active
/// variants under a row lock on the parent product.
///
/// Returns `Ok(None)` when the product already has the maximum.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist, or
/// [`DbError::Sqlx`] if any statement fails.
pub async fn create_meat_type(
    pool: &PgPool,
    new: &NewMeatType<'_>,
    max_per_product: i64,
) -> Result<Option<MeatTypeRow>, DbError> {
    let mut tx = pool.begin().await?;

    let product: Option<i64> =
        sqlx::query_scalar("SELECT id FROM products WHERE id = $1 AND is_active FOR UPDATE")
            .bind(new.product_id)
            .fetch_optional(&mut *tx)
            .await?;
    if product.is_none() {
        return Err(DbError::NotFound);
    }

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM meat_types WHERE product_id = $1 AND is_active",
    )
    .bind(new.product_id)
    .fetch_one(&mut *tx)
    .await?;
    if active >= max_per_product {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, MeatTypeRow>(&format!(
        "INSERT INTO meat_types \
             (product_id, name, name_ar, description, description_ar, price_usd, price_lbp) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {MEAT_TYPE_COLUMNS}"
    ))
    .bind(new.product_id)
    .bind(new.name)
    .bind(new.name_ar)
    .bind(new.description)
    .bind(new.description_ar)
    .bind(new.price_usd)
    .bind(new.price_lbp)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(row))
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no meat type has `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_meat_type(
    pool: &PgPool,
    id: i64,
    patch: &MeatTypeUpdate<'_>,
) -> Result<MeatTypeRow, DbError> {
    sqlx::query_as::<_, MeatTypeRow>(&format!(
        "UPDATE meat_types \
         SET name           = COALESCE($2, name), \
             name_ar        = COALESCE($3, name_ar), \
             description    = CASE WHEN $4::BOOL THEN $5 ELSE description END, \
             description_ar = CASE WHEN $6::BOOL THEN $7 ELSE description_ar END, \
             price_usd      = COALESCE($8, price_usd), \
             price_lbp      = COALESCE($9, price_lbp), \
             updated_at     = NOW() \
         WHERE id = $1 \
         RETURNING {MEAT_TYPE_COLUMNS}"
    ))
    .bind(id)
    .bind(patch.name)
    .bind(patch.name_ar)
    .bind(patch.description.is_some())
    .bind(patch.description.flatten())
    .bind(patch.description_ar.is_some())
    .bind(patch.description_ar.flatten())
    .bind(patch.price_usd)
    .bind(patch.price_lbp)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Soft-deletes a meat type. Past order items keep their reference.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no meat type has `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_meat_type(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE meat_types SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
