use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use butcher_core::{
    validation::{optional_text, require_text},
    OrderType,
};
use butcher_db::{DbError, NewOrder, NewOrderItem, OrderStatusUpdate};
use butcher_notify::NotificationPlan;
use serde::Deserialize;

use crate::middleware::{CurrentUser, RequestId};
use crate::notifications::spawn_status_notifications;

use super::super::{map_db_error, map_validation_error, ApiError, ApiResponse, AppState, MessageData};
use super::cart::{load_policy, price_cart, totals_for, CartItemRequest};
use super::{load_order, parse_status, single_order, OrderItem};

const CUSTOM_MESSAGE_MAX: usize = 2000;
const NOTES_MAX: usize = 1000;
const REJECTION_REASON_MAX: usize = 1000;
const ADDRESS_MAX: usize = 500;
const PHONE_MAX: usize = 30;
const PREFERRED_TIME_MAX: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub(in crate::api) struct DeliveryInfoRequest {
    pub address: Option<String>,
    pub phone: Option<String>,
    pub preferred_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateOrderRequest {
    /// Defaults to a catalog order.
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub items: Vec<CartItemRequest>,
    pub custom_message: Option<String>,
    #[serde(default)]
    pub delivery_applied: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub delivery_info: DeliveryInfoRequest,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
    pub notes: Option<String>,
    pub is_delivery_assigned: Option<bool>,
    pub rejection_reason: Option<String>,
}

/// POST /api/v1/orders: prices the cart server-side; client totals are ignored.
pub(in crate::api) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderItem>>), ApiError> {
    let rid = &req_id.0;
    let invalid = |e| map_validation_error(rid, &e);
    let order_type = body.order_type.unwrap_or(OrderType::Product);

    let notes = optional_text("notes", body.notes.as_deref(), NOTES_MAX).map_err(invalid)?;
    let delivery = &body.delivery_info;
    let address = optional_text("delivery_info.address", delivery.address.as_deref(), ADDRESS_MAX)
        .map_err(invalid)?;
    let phone = optional_text("delivery_info.phone", delivery.phone.as_deref(), PHONE_MAX)
        .map_err(invalid)?;
    let preferred_time = optional_text(
        "delivery_info.preferred_time",
        delivery.preferred_time.as_deref(),
        PREFERRED_TIME_MAX,
    )
    .map_err(invalid)?;

    let policy = load_policy(&state.pool, rid).await?;
    let (custom_message, lines) = match order_type {
        OrderType::Custom => {
            if !body.items.is_empty() {
                return Err(ApiError::validation(
                    rid,
                    "custom orders cannot include catalog items",
                ));
            }
            let message = require_text(
                "custom_message",
                body.custom_message.as_deref().unwrap_or_default(),
                CUSTOM_MESSAGE_MAX,
            )
            .map_err(invalid)?;
            (Some(message), Vec::new())
        }
        OrderType::Product => {
            if body.items.is_empty() {
                return Err(ApiError::validation(
                    rid,
                    "order must contain at least one item",
                ));
            }
            (None, price_cart(&state.pool, rid, &policy, &body.items).await?)
        }
    };
    let totals = totals_for(&policy, &lines, body.delivery_applied);

    let items: Vec<NewOrderItem<'_>> = lines
        .iter()
        .map(|line| NewOrderItem {
            product_id: Some(line.product_id),
            meat_type_id: line.meat_type_id,
            quantity: line.quantity,
            amount_usd: line.priced.amount_usd,
            amount_lbp: line.priced.amount_lbp,
            custom_description: None,
        })
        .collect();

    let row = butcher_db::insert_order(
        &state.pool,
        &NewOrder {
            customer_id: user.id,
            order_type,
            custom_message: custom_message.as_deref(),
            total_usd: totals.total_usd,
            total_lbp: totals.total_lbp,
            delivery_applied: totals.delivery_applied,
            delivery_fee_lbp: totals.delivery_fee_lbp,
            notes: notes.as_deref(),
            delivery_address: address.as_deref(),
            delivery_phone: phone.as_deref(),
            delivery_preferred_time: preferred_time.as_deref(),
            items: &items,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        order_id = row.id,
        customer_id = user.id,
        %order_type,
        items = items.len(),
        total_usd = %row.total_usd,
        total_lbp = %row.total_lbp,
        "order placed"
    );

    let order = single_order(&state.pool, rid, row).await?;
    Ok((StatusCode::CREATED, ApiResponse::json(req_id.0, order)))
}

/// PUT /api/v1/orders/{id}/status: customer notifications go out in the background.
pub(in crate::api) async fn update_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderItem>>, ApiError> {
    let rid = &req_id.0;
    let invalid = |e| map_validation_error(rid, &e);

    if body.status.trim().is_empty() {
        return Err(ApiError::validation(rid, "status is required"));
    }
    let next = parse_status(rid, &body.status)?;
    let notes = optional_text("notes", body.notes.as_deref(), NOTES_MAX).map_err(invalid)?;
    let rejection_reason = optional_text(
        "rejection_reason",
        body.rejection_reason.as_deref(),
        REJECTION_REASON_MAX,
    )
    .map_err(invalid)?;

    let current = load_order(&state.pool, rid, id).await?;
    let previous = current
        .status()
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !previous.can_transition_to(next) {
        return Err(ApiError::validation(
            rid,
            format!("cannot change order status from {previous} to {next}"),
        ));
    }

    let updated = butcher_db::update_order_status(
        &state.pool,
        id,
        &OrderStatusUpdate {
            from: previous,
            to: next,
            notes: notes.as_deref(),
            is_delivery_assigned: body.is_delivery_assigned,
            rejection_reason: rejection_reason.as_deref(),
        },
    )
    .await
    .map_err(|e| match e {
        DbError::NotFound => ApiError::not_found(rid, "order"),
        other => map_db_error(rid.clone(), &other),
    })?
    .ok_or_else(|| {
        ApiError::new(
            rid,
            "conflict",
            "order status was changed by someone else; reload and try again",
        )
    })?;
    tracing::info!(order_id = id, from = %previous, to = %next, "order status updated");

    let plan = NotificationPlan::for_transition(
        previous,
        next,
        current.is_email_sent,
        current.is_whatsapp_sent,
    );
    if !plan.is_empty() {
        spawn_status_notifications(
            state.pool.clone(),
            state.notifier.clone(),
            updated.clone(),
            next,
            plan,
        );
    }

    let order = single_order(&state.pool, rid, updated).await?;
    Ok(ApiResponse::json(req_id.0, order))
}

/// DELETE /api/v1/orders/{id}: only rejected orders can be removed.
pub(in crate::api) async fn delete_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageData>>, ApiError> {
    let rid = &req_id.0;
    let deleted = butcher_db::delete_order(&state.pool, id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => ApiError::not_found(rid, "order"),
            other => map_db_error(rid.clone(), &other),
        })?;

    if !deleted {
        return Err(ApiError::validation(rid, "only rejected orders can be deleted"));
    }
    tracing::info!(order_id = id, "rejected order deleted");

    Ok(ApiResponse::json(
        req_id.0,
        MessageData {
            message: "order deleted".to_owned(),
        },
    ))
}
