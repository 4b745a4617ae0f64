//! Meat-type variants: alternative cuts of a product with their own prices.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use butcher_core::validation::{optional_text, require_text};
use butcher_db::{DbError, MeatTypeRow, MeatTypeUpdate, NewMeatType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    double_option, map_db_error, map_validation_error, products::validate_price, ApiError,
    ApiResponse, AppState, MessageData,
};

/// Active variants allowed per product.
pub(crate) const MAX_MEAT_TYPES_PER_PRODUCT: i64 = 3;

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 1000;

#[derive(Debug, Serialize)]
pub(super) struct MeatTypeItem {
    id: i64,
    product_id: i64,
    name: String,
    name_ar: String,
    description: Option<String>,
    description_ar: Option<String>,
    price_usd: Decimal,
    price_lbp: Decimal,
}

impl From<MeatTypeRow> for MeatTypeItem {
    fn from(row: MeatTypeRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            name_ar: row.name_ar,
            description: row.description,
            description_ar: row.description_ar,
            price_usd: row.price_usd,
            price_lbp: row.price_lbp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateMeatTypeRequest {
    pub product_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub price_usd: Decimal,
    pub price_lbp: Decimal,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdateMeatTypeRequest {
    pub name: Option<String>,
    pub name_ar: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description_ar: Option<Option<String>>,
    pub price_usd: Option<Decimal>,
    pub price_lbp: Option<Decimal>,
}

/// GET /api/v1/products/{id}/meat-types: active variants, oldest first.
pub(in crate::api) async fn list_for_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<MeatTypeItem>>>, ApiError> {
    let rows = butcher_db::list_meat_types_for_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::json(
        req_id.0,
        rows.into_iter().map(MeatTypeItem::from).collect(),
    ))
}

/// POST /api/v1/meat-types
pub(in crate::api) async fn create_meat_type(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateMeatTypeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MeatTypeItem>>), ApiError> {
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

    let created = butcher_db::create_meat_type(
        &state.pool,
        &NewMeatType {
            product_id: body.product_id,
            name: &name,
            name_ar: &name_ar,
            description: description.as_deref(),
            description_ar: description_ar.as_deref(),
            price_usd: body.price_usd,
            price_lbp: body.price_lbp,
        },
        MAX_MEAT_TYPES_PER_PRODUCT,
    )
    .await
    .map_err(|e| match e {
        DbError::NotFound => ApiError::validation(rid, "product not found"),
        other => map_db_error(rid.clone(), &other),
    })?;

    let Some(row) = created else {
        return Err(ApiError::validation(
            rid,
            format!("product can have at most {MAX_MEAT_TYPES_PER_PRODUCT} meat types"),
        ));
    };
    tracing::info!(meat_type_id = row.id, product_id = row.product_id, "meat type created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::json(req_id.0, MeatTypeItem::from(row)),
    ))
}

/// PUT /api/v1/meat-types/{id}: sparse update.
pub(in crate::api) async fn update_meat_type(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateMeatTypeRequest>,
) -> Result<Json<ApiResponse<MeatTypeItem>>, ApiError> {
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

    let row = butcher_db::update_meat_type(
        &state.pool,
        id,
        &MeatTypeUpdate {
            name: name.as_deref(),
            name_ar: name_ar.as_deref(),
            description: description.as_ref().map(Option::as_deref),
            description_ar: description_ar.as_ref().map(Option::as_deref),
            price_usd: body.price_usd,
            price_lbp: body.price_lbp,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ApiResponse::json(req_id.0, MeatTypeItem::from(row)))
}

/// DELETE /api/v1/meat-types/{id}: soft delete.
pub(in crate::api) async fn delete_meat_type(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageData>>, ApiError> {
    butcher_db::deactivate_meat_type(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::json(
        req_id.0,
        MessageData {
            message: "meat type deleted".to_owned(),
        },
    ))
}
