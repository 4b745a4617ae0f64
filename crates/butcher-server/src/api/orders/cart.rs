//! Cart pricing shared by quotes and order placement.

use axum::{extract::State, Extension, Json};
use butcher_core::{
    compute_totals, price_item, ItemRequest, OrderTotals, PricedItem, PricingPolicy, UnitPrice,
};
use butcher_db::{MeatTypeRow, ProductRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::middleware::RequestId;

use super::super::{map_db_error, ApiError, ApiResponse, AppState};

pub(super) const MAX_ITEMS_PER_ORDER: usize = 50;

/// One cart line as clients send it. Exactly one of the amount fields is
/// used: `amount_usd`, then `amount_lbp`, then `quantity`.
#[derive(Debug, Clone, Deserialize)]
pub(in crate::api) struct CartItemRequest {
    pub product_id: i64,
    pub meat_type_id: Option<i64>,
    pub quantity: Option<Decimal>,
    pub amount_usd: Option<Decimal>,
    pub amount_lbp: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PricedLine {
    pub product_id: i64,
    pub meat_type_id: Option<i64>,
    /// Set only for lines requested by quantity.
    pub quantity: Option<Decimal>,
    pub priced: PricedItem,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct QuoteRequest {
    #[serde(default)]
    pub items: Vec<CartItemRequest>,
    #[serde(default)]
    pub delivery_applied: bool,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct QuoteLine {
    product_id: i64,
    meat_type_id: Option<i64>,
    quantity: Option<Decimal>,
    amount_usd: Decimal,
    amount_lbp: Decimal,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct QuoteData {
    items: Vec<QuoteLine>,
    #[serde(flatten)]
    totals: OrderTotals,
}

/// Decide how a line is priced against the catalog rows it references.
fn line_request(
    item: &CartItemRequest,
    product: &ProductRow,
    meat_type: Option<&MeatTypeRow>,
) -> Result<ItemRequest, String> {
    if !product.is_active {
        return Err(format!("product {} not found", product.id));
    }
    if !product.is_available {
        return Err(format!("product '{}' is not available", product.name));
    }

    let unit_price = match meat_type {
        Some(variant) if variant.is_active && variant.product_id == product.id => UnitPrice {
            usd: variant.price_usd,
            lbp: variant.price_lbp,
        },
        Some(variant) => {
            return Err(format!(
                "meat type {} is not offered for product '{}'",
                variant.id, product.name
            ))
        }
        None => UnitPrice {
            usd: product.price_usd,
            lbp: product.price_lbp,
        },
    };

    ItemRequest::from_fields(item.amount_usd, item.amount_lbp, item.quantity, unit_price)
        .map_err(|e| e.to_string())
}

pub(super) async fn load_policy(pool: &PgPool, rid: &str) -> Result<PricingPolicy, ApiError> {
    butcher_db::get_settings(pool)
        .await
        .and_then(|settings| settings.pricing_policy())
        .map_err(|e| map_db_error(rid.to_owned(), &e))
}

/// Price every line of a cart against the live catalog.
///
/// Errors name the offending line by its 1-based position.
pub(super) async fn price_cart(
    pool: &PgPool,
    rid: &str,
    policy: &PricingPolicy,
    items: &[CartItemRequest],
) -> Result<Vec<PricedLine>, ApiError> {
    if items.len() > MAX_ITEMS_PER_ORDER {
        return Err(ApiError::validation(
            rid,
            format!("an order can have at most {MAX_ITEMS_PER_ORDER} items"),
        ));
    }

    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        let invalid = |message: String| ApiError::validation(rid, format!("item {position}: {message}"));

        let product = butcher_db::get_product(pool, item.product_id)
            .await
            .map_err(|e| map_db_error(rid.to_owned(), &e))?
            .ok_or_else(|| invalid(format!("product {} not found", item.product_id)))?;

        let meat_type = match item.meat_type_id {
            Some(id) => Some(
                butcher_db::get_meat_type(pool, id)
                    .await
                    .map_err(|e| map_db_error(rid.to_owned(), &e))?
                    .ok_or_else(|| invalid(format!("meat type {id} not found")))?,
            ),
            None => None,
        };

        let request = line_request(item, &product, meat_type.as_ref()).map_err(invalid)?;
        let priced = price_item(policy, request).map_err(|e| invalid(e.to_string()))?;
        let quantity = match request {
            ItemRequest::Quantity { quantity, .. } => Some(quantity),
            ItemRequest::AmountUsd(_) | ItemRequest::AmountLbp(_) => None,
        };

        lines.push(PricedLine {
            product_id: product.id,
            meat_type_id: meat_type.map(|variant| variant.id),
            quantity,
            priced,
        });
    }
    Ok(lines)
}

pub(super) fn totals_for(policy: &PricingPolicy, lines: &[PricedLine], delivery_applied: bool) -> OrderTotals {
    let priced: Vec<PricedItem> = lines.iter().map(|line| line.priced).collect();
    compute_totals(policy, &priced, delivery_applied)
}

/// POST /api/v1/orders/quote: price a cart with the current settings.
pub(in crate::api) async fn quote_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<ApiResponse<QuoteData>>, ApiError> {
    let rid = &req_id.0;
    let policy = load_policy(&state.pool, rid).await?;
    let lines = price_cart(&state.pool, rid, &policy, &body.items).await?;
    let totals = totals_for(&policy, &lines, body.delivery_applied);

    let items = lines
        .into_iter()
        .map(|line| QuoteLine {
            product_id: line.product_id,
            meat_type_id: line.meat_type_id,
            quantity: line.quantity,
            amount_usd: line.priced.amount_usd,
            amount_lbp: line.priced.amount_lbp,
        })
        .collect();

    Ok(ApiResponse::json(req_id.0, QuoteData { items, totals }))
}
