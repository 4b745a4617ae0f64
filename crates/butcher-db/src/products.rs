//! Database operations for `products` and `product_images`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

// Selected from `products p JOIN categories c`. Image URLs are aggregated in
// position order so a product always comes back as a single row.
const PRODUCT_SELECT: &str = "SELECT p.id, p.category_id, c.name AS category_name, \
         c.name_ar AS category_name_ar, p.name, p.name_ar, p.description, p.description_ar, \
         p.price_usd, p.price_lbp, p.is_available, p.is_active, \
         ARRAY(SELECT i.url FROM product_images i WHERE i.product_id = p.id \
               ORDER BY i.position) AS images, \
         p.created_at, p.updated_at \
     FROM products p \
     JOIN categories c ON c.id = p.category_id";

/// A product joined with its category names and image URLs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub category_name_ar: String,
    pub name: String,
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub price_usd: Decimal,
    pub price_lbp: Decimal,
    pub is_available: bool,
    /// `false` once soft-deleted; inactive products are hidden from listings.
    pub is_active: bool,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilters {
    pub category_id: Option<i64>,
    pub available: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub category_id: i64,
    pub name: &'a str,
    pub name_ar: &'a str,
    pub description: Option<&'a str>,
    pub description_ar: Option<&'a str>,
    pub price_usd: Decimal,
    pub price_lbp: Decimal,
    pub images: &'a [String],
}

/// Patch for [`update_product`]. `None` keeps the stored value; `images`
/// replaces the whole image list when present.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate<'a> {
    pub category_id: Option<i64>,
    pub name: Option<&'a str>,
    pub name_ar: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub description_ar: Option<Option<&'a str>>,
    pub price_usd: Option<Decimal>,
    pub price_lbp: Option<Decimal>,
    pub is_available: Option<bool>,
    pub images: Option<&'a [String]>,
}

/// Active products, newest first, optionally filtered by category and availability.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: ProductFilters,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "{PRODUCT_SELECT} \
         WHERE p.is_active \
           AND ($1::BIGINT IS NULL OR p.category_id = $1) \
           AND ($2::BOOL IS NULL OR p.is_available = $2) \
         ORDER BY p.created_at DESC, p.id DESC"
    ))
    .bind(filters.category_id)
    .bind(filters.available)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetches a product by id, including soft-deleted ones.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Image URLs for a product in display order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_images(pool: &PgPool, product_id: i64) -> Result<Vec<String>, DbError> {
    let urls = sqlx::query_scalar::<_, String>(
        "SELECT url FROM product_images WHERE product_id = $1 ORDER BY position",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(urls)
}

async fn replace_images(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    images: &[String],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM product_images WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut **tx)
        .await?;

    for (position, url) in images.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| DbError::InvalidData("too many product images".to_owned()))?;
        sqlx::query("INSERT INTO product_images (product_id, position, url) VALUES ($1, $2, $3)")
            .bind(product_id)
            .bind(position)
            .bind(url)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Inserts a product and its images in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; an unknown
/// `category_id` surfaces as a foreign-key violation.
pub async fn create_product(pool: &PgPool, new: &NewProduct<'_>) -> Result<ProductRow, DbError> {
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products \
             (category_id, name, name_ar, description, description_ar, price_usd, price_lbp) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(new.category_id)
    .bind(new.name)
    .bind(new.name_ar)
    .bind(new.description)
    .bind(new.description_ar)
    .bind(new.price_usd)
    .bind(new.price_lbp)
    .fetch_one(&mut *tx)
    .await?;

    replace_images(&mut tx, id, new.images).await?;
    tx.commit().await?;

    get_product(pool, id).await?.ok_or(DbError::NotFound)
}

/// Applies a partial update, replacing images when `patch.images` is set.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `id`, or [`DbError::Sqlx`]
/// if any statement fails.
pub async fn update_product(
    pool: &PgPool,
    id: i64,
    patch: &ProductUpdate<'_>,
) -> Result<ProductRow, DbError> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE products \
         SET category_id    = COALESCE($2, category_id), \
             name           = COALESCE($3, name), \
             name_ar        = COALESCE($4, name_ar), \
             description    = CASE WHEN $5::BOOL THEN $6 ELSE description END, \
             description_ar = CASE WHEN $7::BOOL THEN $8 ELSE description_ar END, \
             price_usd      = COALESCE($9, price_usd), \
             price_lbp      = COALESCE($10, price_lbp), \
             is_available   = COALESCE($11, is_available), \
             updated_at     = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(patch.category_id)
    .bind(patch.name)
    .bind(patch.name_ar)
    .bind(patch.description.is_some())
    .bind(patch.description.flatten())
    .bind(patch.description_ar.is_some())
    .bind(patch.description_ar.flatten())
    .bind(patch.price_usd)
    .bind(patch.price_lbp)
    .bind(patch.is_available)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    if let Some(images) = patch.images {
        replace_images(&mut tx, id, images).await?;
    }
    tx.commit().await?;

    get_product(pool, id).await?.ok_or(DbError::NotFound)
}

/// Soft-deletes a product and detaches its images.
///
/// Returns the image URLs that were attached so the caller can remove the
/// underlying files.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `id`, or [`DbError::Sqlx`]
/// if any statement fails.
pub async fn soft_delete_product(pool: &PgPool, id: i64) -> Result<Vec<String>, DbError> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    let removed: Vec<String> = sqlx::query_scalar(
        "DELETE FROM product_images WHERE product_id = $1 RETURNING url",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(removed)
}

/// Flips `is_available` and returns the updated product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn toggle_product_availability(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    let updated = sqlx::query(
        "UPDATE products SET is_available = NOT is_available, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    get_product(pool, id).await?.ok_or(DbError::NotFound)
}
