//! Order API handlers.
//!
//! - `POST   /api/v1/orders/quote`         : price a cart without saving it
//! - `POST   /api/v1/orders`               : place a product or custom order
//! - `GET    /api/v1/orders/mine`          : the caller's orders
//! - `GET    /api/v1/orders/{id}`          : one order (owner or admin)
//! - `GET    /api/v1/orders?status=`       : admin order book
//! - `GET    /api/v1/orders/pending-count` : admin polling counter
//! - `PUT    /api/v1/orders/{id}/status`   : admin status change
//! - `DELETE /api/v1/orders/{id}`          : remove a rejected order

mod cart;
mod read;
mod write;

pub(super) use cart::quote_order;
pub(super) use read::{get_order, list_my_orders, list_orders, pending_count};
pub(super) use write::{create_order, delete_order, update_status};

use std::collections::HashMap;

use butcher_core::{OrderStatus, OrderType};
use butcher_db::{OrderItemRow, OrderRow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::{map_db_error, ApiError};

#[derive(Debug, Serialize)]
pub(super) struct CustomerRef {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    mobile: String,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderLine {
    id: i64,
    product_id: Option<i64>,
    product_name: Option<String>,
    product_name_ar: Option<String>,
    meat_type_id: Option<i64>,
    meat_type_name: Option<String>,
    quantity: Option<Decimal>,
    amount_usd: Decimal,
    amount_lbp: Decimal,
    custom_description: Option<String>,
}

impl From<OrderItemRow> for OrderLine {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_name_ar: row.product_name_ar,
            meat_type_id: row.meat_type_id,
            meat_type_name: row.meat_type_name,
            quantity: row.quantity,
            amount_usd: row.amount_usd,
            amount_lbp: row.amount_lbp,
            custom_description: row.custom_description,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct DeliveryInfo {
    address: Option<String>,
    phone: Option<String>,
    preferred_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderItem {
    id: i64,
    customer: CustomerRef,
    order_type: OrderType,
    status: OrderStatus,
    custom_message: Option<String>,
    items: Vec<OrderLine>,
    total_usd: Decimal,
    total_lbp: Decimal,
    delivery_applied: bool,
    delivery_fee_lbp: Decimal,
    delivery_info: DeliveryInfo,
    notes: Option<String>,
    rejection_reason: Option<String>,
    is_delivery_assigned: bool,
    is_email_sent: bool,
    is_whatsapp_sent: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderItem {
    fn from_row(row: OrderRow, items: Vec<OrderLine>) -> Result<Self, butcher_db::DbError> {
        let status = row.status()?;
        let order_type = row.order_type()?;
        Ok(Self {
            id: row.id,
            customer: CustomerRef {
                id: row.customer_id,
                first_name: row.customer_first_name,
                last_name: row.customer_last_name,
                email: row.customer_email,
                mobile: row.customer_mobile,
            },
            order_type,
            status,
            custom_message: row.custom_message,
            items,
            total_usd: row.total_usd,
            total_lbp: row.total_lbp,
            delivery_applied: row.delivery_applied,
            delivery_fee_lbp: row.delivery_fee_lbp,
            delivery_info: DeliveryInfo {
                address: row.delivery_address,
                phone: row.delivery_phone,
                preferred_time: row.delivery_preferred_time,
            },
            notes: row.notes,
            rejection_reason: row.rejection_reason,
            is_delivery_assigned: row.is_delivery_assigned,
            is_email_sent: row.is_email_sent,
            is_whatsapp_sent: row.is_whatsapp_sent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Attach items to a page of orders with one batched query.
async fn with_items(pool: &PgPool, rid: &str, rows: Vec<OrderRow>) -> Result<Vec<OrderItem>, ApiError> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let items = butcher_db::list_order_items(pool, &ids)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let mut by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
    for item in items {
        by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderLine::from(item));
    }

    rows.into_iter()
        .map(|row| {
            let lines = by_order.remove(&row.id).unwrap_or_default();
            OrderItem::from_row(row, lines).map_err(|e| map_db_error(rid.to_owned(), &e))
        })
        .collect()
}

async fn single_order(pool: &PgPool, rid: &str, row: OrderRow) -> Result<OrderItem, ApiError> {
    let mut orders = with_items(pool, rid, vec![row]).await?;
    orders
        .pop()
        .ok_or_else(|| ApiError::new(rid, "internal_error", "order lookup failed"))
}

async fn load_order(pool: &PgPool, rid: &str, id: i64) -> Result<OrderRow, ApiError> {
    butcher_db::get_order(pool, id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "order"))
}

fn parse_status(rid: &str, raw: &str) -> Result<OrderStatus, ApiError> {
    raw.trim().parse::<OrderStatus>().map_err(|_| {
        let allowed: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();
        ApiError::validation(
            rid,
            format!("invalid status '{raw}'; expected one of: {}", allowed.join(", ")),
        )
    })
}
