use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use butcher_core::OrderStatus;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::super::{map_db_error, ApiError, ApiResponse, AppState};
use super::{load_order, parse_status, single_order, with_items, OrderItem};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct OrderListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct PendingCountData {
    count: i64,
}

/// GET /api/v1/orders/mine: newest first.
pub(in crate::api) async fn list_my_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<OrderItem>>>, ApiError> {
    let rid = &req_id.0;
    let rows = butcher_db::list_orders_for_customer(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let data = with_items(&state.pool, rid, rows).await?;
    Ok(ApiResponse::json(req_id.0, data))
}

/// GET /api/v1/orders/{id}: visible to the customer who placed it and to admins.
pub(in crate::api) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OrderItem>>, ApiError> {
    let rid = &req_id.0;
    let row = load_order(&state.pool, rid, id).await?;
    if row.customer_id != user.id && !user.is_admin() {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "not authorized to view this order",
        ));
    }

    let order = single_order(&state.pool, rid, row).await?;
    Ok(ApiResponse::json(req_id.0, order))
}

/// GET /api/v1/orders?status=: every customer's orders, newest first.
pub(in crate::api) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<OrderItem>>>, ApiError> {
    let rid = &req_id.0;
    let status = query
        .status
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| parse_status(rid, raw))
        .transpose()?;

    let rows = butcher_db::list_orders(&state.pool, status)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let data = with_items(&state.pool, rid, rows).await?;
    Ok(ApiResponse::json(req_id.0, data))
}

/// GET /api/v1/orders/pending-count
pub(in crate::api) async fn pending_count(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<PendingCountData>>, ApiError> {
    let count = butcher_db::count_orders_by_status(&state.pool, OrderStatus::Pending)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::json(req_id.0, PendingCountData { count }))
}
