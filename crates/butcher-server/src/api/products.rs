use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use butcher_core::validation::{optional_text, require_text};
use butcher_db::{NewProduct, ProductFilters, ProductRow, ProductUpdate};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::middleware::RequestId;

use super::meat_types::MeatTypeItem;
use super::uploads::remove_uploaded_files;
use super::{
    double_option, map_db_error, map_validation_error, ApiError, ApiResponse, AppState,
    MessageData,
};

const NAME_MAX: usize = 150;
const DESCRIPTION_MAX: usize = 2000;
const MAX_IMAGES_PER_PRODUCT: usize = 10;

#[derive(Debug, Serialize)]
pub(super) struct CategoryRef {
    id: i64,
    name: String,
    name_ar: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    category: CategoryRef,
    name: String,
    name_ar: String,
    description: Option<String>,
    description_ar: Option<String>,
    price_usd: Decimal,
    price_lbp: Decimal,
    is_available: bool,
    images: Vec<String>,
    meat_types: Vec<MeatTypeItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductItem {
    fn from_row(row: ProductRow, meat_types: Vec<MeatTypeItem>) -> Self {
        Self {
            id: row.id,
            category: CategoryRef {
                id: row.category_id,
                name: row.category_name,
                name_ar: row.category_name_ar,
            },
            name: row.name,
            name_ar: row.name_ar,
            description: row.description,
            description_ar: row.description_ar,
            price_usd: row.price_usd,
            price_lbp: row.price_lbp,
            is_available: row.is_available,
            images: row.images,
            meat_types,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub category: Option<i64>,
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateProductRequest {
    pub category_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub price_usd: Decimal,
    pub price_lbp: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdateProductRequest {
    pub category_id: Option<i64>,
    pub name: Option<String>,
    pub name_ar: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description_ar: Option<Option<String>>,
    pub price_usd: Option<Decimal>,
    pub price_lbp: Option<Decimal>,
    pub is_available: Option<bool>,
    pub images: Option<Vec<String>>,
}

pub(super) fn validate_price(rid: &str, field: &str, value: Decimal) -> Result<(), ApiError> {
    if value < Decimal::ZERO {
        return Err(ApiError::validation(
            rid,
            format!("{field} must not be negative"),
        ));
    }
    Ok(())
}

fn validate_images(rid: &str, images: &[String]) -> Result<(), ApiError> {
    if images.len() > MAX_IMAGES_PER_PRODUCT {
        return Err(ApiError::validation(
            rid,
            format!("a product can have at most {MAX_IMAGES_PER_PRODUCT} images"),
        ));
    }
    if images.iter().any(|url| url.trim().is_empty()) {
        return Err(ApiError::validation(rid, "image URLs must not be blank"));
    }
    Ok(())
}

/// Image URLs in `previous` that the product no longer lists.
fn dropped_images(previous: Vec<String>, kept: &[String]) -> Vec<String> {
    previous.into_iter().filter(|url| !kept.contains(url)).collect()
}

async fn ensure_active_category(pool: &PgPool, rid: &str, category_id: i64) -> Result<(), ApiError> {
    let category = butcher_db::get_category(pool, category_id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    match category {
        Some(category) if category.is_active => Ok(()),
        _ => Err(ApiError::validation(rid, "category not found")),
    }
}

/// Attach each product's active meat types with one batched query.
async fn with_meat_types(
    pool: &PgPool,
    rid: &str,
    rows: Vec<ProductRow>,
) -> Result<Vec<ProductItem>, ApiError> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let meat_types = butcher_db::list_meat_types_for_products(pool, &ids)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let mut by_product: HashMap<i64, Vec<MeatTypeItem>> = HashMap::new();
    for meat_type in meat_types {
        by_product
            .entry(meat_type.product_id)
            .or_default()
            .push(MeatTypeItem::from(meat_type));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let variants = by_product.remove(&row.id).unwrap_or_default();
            ProductItem::from_row(row, variants)
        })
        .collect())
}

async fn single_item(pool: &PgPool, rid: &str, row: ProductRow) -> Result<ProductItem, ApiError> {
    let mut items = with_meat_types(pool, rid, vec![row]).await?;
    items
        .pop()
        .ok_or_else(|| ApiError::new(rid, "internal_error", "product lookup failed"))
}

/// GET /api/v1/products?category=&available=: active products, newest first.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rid = &req_id.0;
    let rows = butcher_db::list_products(
        &state.pool,
        ProductFilters {
            category_id: query.category,
            available: query.available,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let data = with_meat_types(&state.pool, rid, rows).await?;
    Ok(ApiResponse::json(req_id.0, data))
}

/// GET /api/v1/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let row = butcher_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .filter(|row| row.is_active)
        .ok_or_else(|| ApiError::not_found(rid, "product"))?;

    let item = single_item(&state.pool, rid, row).await?;
    Ok(ApiResponse::json(req_id.0, item))
}

/// POST /api/v1/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductItem>>), ApiError> {
    let rid = &req_id.0;
    let invalid = |e| map_validation_error(rid, &e);

    let name = require_text("name", &body.name, NAME_MAX).map_err(invalid)?;
    let name_ar = require_text("name_ar", &body.name_ar, NAME_MAX).map_err(invalid)?;
    let description =
        optional_text("description", body.description.as_deref(), DESCRIPTION_MAX)
            .map_err(invalid)?;
    let description_ar =
        optional_text("description_ar", body.description_ar.as_deref(), DESCRIPTION_MAX)
            .map_err(invalid)?;
    validate_price(rid, "price_usd", body.price_usd)?;
    validate_price(rid, "price_lbp", body.price_lbp)?;
    validate_images(rid, &body.images)?;
    ensure_active_category(&state.pool, rid, body.category_id).await?;

    let row = butcher_db::create_product(
        &state.pool,
        &NewProduct {
            category_id: body.category_id,
            name: &name,
            name_ar: &name_ar,
            description: description.as_deref(),
            description_ar: description_ar.as_deref(),
            price_usd: body.price_usd,
            price_lbp: body.price_lbp,
            images: &body.images,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(product_id = row.id, "product created");

    let item = single_item(&state.pool, rid, row).await?;
    Ok((StatusCode::CREATED, ApiResponse::json(req_id.0, item)))
}

/// PUT /api/v1/products/{id}: sparse update; `images` replaces the set.
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let invalid = |e| map_validation_error(rid, &e);

    let name = body
        .name
        .as_deref()
        .map(|v| require_text("name", v, NAME_MAX))
        .transpose()
        .map_err(invalid)?;
    let name_ar = body
        .name_ar
        .as_deref()
        .map(|v| require_text("name_ar", v, NAME_MAX))
        .transpose()
        .map_err(invalid)?;
    let description = body
        .description
        .as_ref()
        .map(|v| optional_text("description", v.as_deref(), DESCRIPTION_MAX))
        .transpose()
        .map_err(invalid)?;
    let description_ar = body
        .description_ar
        .as_ref()
        .map(|v| optional_text("description_ar", v.as_deref(), DESCRIPTION_MAX))
        .transpose()
        .map_err(invalid)?;
    if let Some(price) = body.price_usd {
        validate_price(rid, "price_usd", price)?;
    }
    if let Some(price) = body.price_lbp {
        validate_price(rid, "price_lbp", price)?;
    }
    if let Some(images) = &body.images {
        validate_images(rid, images)?;
    }
    if let Some(category_id) = body.category_id {
        ensure_active_category(&state.pool, rid, category_id).await?;
    }

    let previous_images = match body.images {
        Some(_) => butcher_db::get_product(&state.pool, id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .map(|row| row.images)
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let row = butcher_db::update_product(
        &state.pool,
        id,
        &ProductUpdate {
            category_id: body.category_id,
            name: name.as_deref(),
            name_ar: name_ar.as_deref(),
            description: description.as_ref().map(Option::as_deref),
            description_ar: description_ar.as_ref().map(Option::as_deref),
            price_usd: body.price_usd,
            price_lbp: body.price_lbp,
            is_available: body.is_available,
            images: body.images.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let dropped = dropped_images(previous_images, &row.images);
    if !dropped.is_empty() {
        let deleted_files = remove_uploaded_files(&state.uploads, &dropped).await;
        tracing::info!(product_id = id, images = dropped.len(), deleted_files, "replaced product images");
    }

    let item = single_item(&state.pool, rid, row).await?;
    Ok(ApiResponse::json(req_id.0, item))
}

/// DELETE /api/v1/products/{id}: soft delete and remove uploaded images.
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageData>>, ApiError> {
    let removed = butcher_db::soft_delete_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let deleted_files = remove_uploaded_files(&state.uploads, &removed).await;
    tracing::info!(product_id = id, images = removed.len(), deleted_files, "product deleted");

    Ok(ApiResponse::json(
        req_id.0,
        MessageData {
            message: "product deleted".to_owned(),
        },
    ))
}

/// PATCH /api/v1/products/{id}/toggle-availability
pub(super) async fn toggle_availability(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let row = butcher_db::toggle_product_availability(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(product_id = id, available = row.is_available, "availability toggled");

    let item = single_item(&state.pool, rid, row).await?;
    Ok(ApiResponse::json(req_id.0, item))
}
