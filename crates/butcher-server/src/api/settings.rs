use axum::{extract::State, Extension, Json};
use butcher_db::SettingsRow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SettingsItem {
    usd_to_lbp: Decimal,
    lbp_to_usd: Decimal,
    exchange_rate: Decimal,
    min_order_usd: Decimal,
    min_order_lbp: Decimal,
    delivery_fee_lbp: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for SettingsItem {
    fn from(row: SettingsRow) -> Self {
        Self {
            usd_to_lbp: row.usd_to_lbp,
            lbp_to_usd: row.lbp_to_usd,
            exchange_rate: row.legacy_exchange_rate,
            min_order_usd: row.min_order_usd,
            min_order_lbp: row.min_order_lbp,
            delivery_fee_lbp: row.delivery_fee_lbp,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct LegacyRateRequest {
    pub exchange_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct ExchangeRatesRequest {
    pub usd_to_lbp: Option<Decimal>,
    pub lbp_to_usd: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct MinOrderRequest {
    pub min_order_usd: Option<Decimal>,
    pub min_order_lbp: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct DeliveryFeeRequest {
    pub delivery_fee_lbp: Option<Decimal>,
}

fn positive(rid: &str, field: &str, value: Option<Decimal>) -> Result<Decimal, ApiError> {
    match value {
        Some(v) if v > Decimal::ZERO => Ok(v),
        _ => Err(ApiError::validation(
            rid,
            format!("a valid {field} greater than zero is required"),
        )),
    }
}

fn non_negative(rid: &str, field: &str, value: Option<Decimal>) -> Result<Option<Decimal>, ApiError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(ApiError::validation(
            rid,
            format!("{field} must not be negative"),
        )),
        other => Ok(other),
    }
}

fn settings_response(
    req_id: RequestId,
    result: Result<SettingsRow, butcher_db::DbError>,
) -> Result<Json<ApiResponse<SettingsItem>>, ApiError> {
    let row = result.map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::json(req_id.0, SettingsItem::from(row)))
}

/// GET /api/v1/settings
pub(in crate::api) async fn get_settings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SettingsItem>>, ApiError> {
    settings_response(req_id, butcher_db::get_settings(&state.pool).await)
}

/// PUT /api/v1/settings/exchange-rate: the single rate older clients use.
pub(in crate::api) async fn update_legacy_rate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<LegacyRateRequest>,
) -> Result<Json<ApiResponse<SettingsItem>>, ApiError> {
    let rate = positive(&req_id.0, "exchange_rate", body.exchange_rate)?;
    let result = butcher_db::update_legacy_exchange_rate(&state.pool, rate).await;
    if result.is_ok() {
        tracing::info!(%rate, "legacy exchange rate updated");
    }
    settings_response(req_id, result)
}

/// PUT /api/v1/settings/exchange-rates
pub(in crate::api) async fn update_exchange_rates(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ExchangeRatesRequest>,
) -> Result<Json<ApiResponse<SettingsItem>>, ApiError> {
    let usd_to_lbp = positive(&req_id.0, "usd_to_lbp", body.usd_to_lbp)?;
    let lbp_to_usd = positive(&req_id.0, "lbp_to_usd", body.lbp_to_usd)?;
    let result = butcher_db::update_exchange_rates(&state.pool, usd_to_lbp, lbp_to_usd).await;
    if result.is_ok() {
        tracing::info!(%usd_to_lbp, %lbp_to_usd, "exchange rates updated");
    }
    settings_response(req_id, result)
}

/// PUT /api/v1/settings/min-order-amount: either minimum may be omitted.
pub(in crate::api) async fn update_min_order_amounts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<MinOrderRequest>,
) -> Result<Json<ApiResponse<SettingsItem>>, ApiError> {
    let min_usd = non_negative(&req_id.0, "min_order_usd", body.min_order_usd)?;
    let min_lbp = non_negative(&req_id.0, "min_order_lbp", body.min_order_lbp)?;
    let result = butcher_db::update_min_order_amounts(&state.pool, min_usd, min_lbp).await;
    settings_response(req_id, result)
}

/// PUT /api/v1/settings/delivery-fee
pub(in crate::api) async fn update_delivery_fee(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<DeliveryFeeRequest>,
) -> Result<Json<ApiResponse<SettingsItem>>, ApiError> {
    let fee = non_negative(&req_id.0, "delivery_fee_lbp", body.delivery_fee_lbp)?
        .ok_or_else(|| ApiError::validation(&req_id.0, "delivery_fee_lbp is required"))?;
    let result = butcher_db::update_delivery_fee(&state.pool, fee).await;
    settings_response(req_id, result)
}
