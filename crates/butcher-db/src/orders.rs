//! Database operations for `orders` and `order_items`.
//!
//! Money columns are written exactly as priced by `butcher_core::pricing`;
//! nothing here recomputes totals.

use butcher_core::{OrderStatus, OrderType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

const ORDER_SELECT: &str = "SELECT o.id, o.customer_id, u.first_name AS customer_first_name, \
         u.last_name AS customer_last_name, u.email AS customer_email, \
         u.mobile AS customer_mobile, o.order_type, o.custom_message, o.total_usd, \
         o.total_lbp, o.status, o.notes, o.rejection_reason, o.delivery_applied, \
         o.delivery_fee_lbp, o.delivery_address, o.delivery_phone, \
         o.delivery_preferred_time, o.is_delivery_assigned, o.is_email_sent, \
         o.is_whatsapp_sent, o.created_at, o.updated_at \
     FROM orders o \
     JOIN users u ON u.id = o.customer_id";

/// An order joined with the contact details of the customer who placed it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub customer_id: i64,
    pub customer_first_name: String,
    pub customer_last_name: String,
    pub customer_email: String,
    pub customer_mobile: String,
    pub order_type: String,
    pub custom_message: Option<String>,
    pub total_usd: Decimal,
    pub total_lbp: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub delivery_applied: bool,
    pub delivery_fee_lbp: Decimal,
    pub delivery_address: Option<String>,
    pub delivery_phone: Option<String>,
    pub delivery_preferred_time: Option<String>,
    pub is_delivery_assigned: bool,
    pub is_email_sent: bool,
    pub is_whatsapp_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// # Errors
    ///
    /// Returns [`DbError::InvalidData`] if the stored status is unknown.
    pub fn status(&self) -> Result<OrderStatus, DbError> {
        self.status
            .parse()
            .map_err(|e: butcher_core::ParseEnumError| DbError::InvalidData(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns [`DbError::InvalidData`] if the stored order type is unknown.
    pub fn order_type(&self) -> Result<OrderType, DbError> {
        self.order_type
            .parse()
            .map_err(|e: butcher_core::ParseEnumError| DbError::InvalidData(e.to_string()))
    }

    #[must_use]
    pub fn customer_name(&self) -> String {
        format!("{} {}", self.customer_first_name, self.customer_last_name)
    }
}

/// A line of an order with the catalog names it referenced.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub position: i32,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub product_name_ar: Option<String>,
    pub meat_type_id: Option<i64>,
    pub meat_type_name: Option<String>,
    pub quantity: Option<Decimal>,
    pub amount_usd: Decimal,
    pub amount_lbp: Decimal,
    pub custom_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem<'a> {
    pub product_id: Option<i64>,
    pub meat_type_id: Option<i64>,
    pub quantity: Option<Decimal>,
    pub amount_usd: Decimal,
    pub amount_lbp: Decimal,
    pub custom_description: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub customer_id: i64,
    pub order_type: OrderType,
    pub custom_message: Option<&'a str>,
    pub total_usd: Decimal,
    pub total_lbp: Decimal,
    pub delivery_applied: bool,
    pub delivery_fee_lbp: Decimal,
    pub notes: Option<&'a str>,
    pub delivery_address: Option<&'a str>,
    pub delivery_phone: Option<&'a str>,
    pub delivery_preferred_time: Option<&'a str>,
    pub items: &'a [NewOrderItem<'a>],
}

/// An admin status change. The update only applies while the order is still
/// in `from`, so two admins racing on the same order cannot both win.
#[derive(Debug, Clone)]
pub struct OrderStatusUpdate<'a> {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// `None` keeps the stored notes.
    pub notes: Option<&'a str>,
    /// `None` keeps the stored flag.
    pub is_delivery_assigned: Option<bool>,
    /// Stored only when `to` is [`OrderStatus::Rejected`]; `None` keeps the
    /// stored reason there. Any other status clears it.
    pub rejection_reason: Option<&'a str>,
}

/// Inserts an order and its items in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn insert_order(pool: &PgPool, order: &NewOrder<'_>) -> Result<OrderRow, DbError> {
    let mut tx = pool.begin().await?;

    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders \
             (customer_id, order_type, custom_message, total_usd, total_lbp, \
              delivery_applied, delivery_fee_lbp, notes, delivery_address, \
              delivery_phone, delivery_preferred_time) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING id",
    )
    .bind(order.customer_id)
    .bind(order.order_type.as_str())
    .bind(order.custom_message)
    .bind(order.total_usd)
    .bind(order.total_lbp)
    .bind(order.delivery_applied)
    .bind(order.delivery_fee_lbp)
    .bind(order.notes)
    .bind(order.delivery_address)
    .bind(order.delivery_phone)
    .bind(order.delivery_preferred_time)
    .fetch_one(&mut *tx)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| DbError::InvalidData("too many order items".to_owned()))?;
        sqlx::query(
            "INSERT INTO order_items \
                 (order_id, position, product_id, meat_type_id, quantity, \
                  amount_usd, amount_lbp, custom_description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order_id)
        .bind(position)
        .bind(item.product_id)
        .bind(item.meat_type_id)
        .bind(item.quantity)
        .bind(item.amount_usd)
        .bind(item.amount_lbp)
        .bind(item.custom_description)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::debug!(order_id, items = order.items.len(), "order inserted");

    get_order(pool, order_id).await?.ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &PgPool, id: i64) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Items for a batch of orders, in order then position order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_items(
    pool: &PgPool,
    order_ids: &[i64],
) -> Result<Vec<OrderItemRow>, DbError> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT i.id, i.order_id, i.position, i.product_id, p.name AS product_name, \
                p.name_ar AS product_name_ar, i.meat_type_id, m.name AS meat_type_name, \
                i.quantity, i.amount_usd, i.amount_lbp, i.custom_description \
         FROM order_items i \
         LEFT JOIN products p ON p.id = i.product_id \
         LEFT JOIN meat_types m ON m.id = i.meat_type_id \
         WHERE i.order_id = ANY($1) \
         ORDER BY i.order_id, i.position",
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A customer's orders, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_for_customer(
    pool: &PgPool,
    customer_id: i64,
) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{ORDER_SELECT} WHERE o.customer_id = $1 ORDER BY o.created_at DESC, o.id DESC"
    ))
    .bind(customer_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All orders, newest first, optionally restricted to one status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders(
    pool: &PgPool,
    status: Option<OrderStatus>,
) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{ORDER_SELECT} \
         WHERE ($1::TEXT IS NULL OR o.status = $1) \
         ORDER BY o.created_at DESC, o.id DESC"
    ))
    .bind(status.map(OrderStatus::as_str))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_orders_by_status(pool: &PgPool, status: OrderStatus) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
        .bind(status.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Applies a status change guarded on the current status.
///
/// Returns `Ok(None)` when the order exists but is no longer in
/// `update.from`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no order has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn update_order_status(
    pool: &PgPool,
    id: i64,
    update: &OrderStatusUpdate<'_>,
) -> Result<Option<OrderRow>, DbError> {
    let result = sqlx::query(
        "UPDATE orders \
         SET status               = $3, \
             notes                = COALESCE($4, notes), \
             is_delivery_assigned = COALESCE($5, is_delivery_assigned), \
             rejection_reason     = CASE WHEN $3 = 'rejected' \
                                         THEN COALESCE($6, rejection_reason) \
                                         ELSE NULL END, \
             updated_at           = NOW() \
         WHERE id = $1 AND status = $2",
    )
    .bind(id)
    .bind(update.from.as_str())
    .bind(update.to.as_str())
    .bind(update.notes)
    .bind(update.is_delivery_assigned)
    .bind(update.rejection_reason)
    .execute(pool)
    .await?;

    let order = get_order(pool, id).await?.ok_or(DbError::NotFound)?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(order))
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_email_sent(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query("UPDATE orders SET is_email_sent = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_whatsapp_sent(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query("UPDATE orders SET is_whatsapp_sent = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Deletes a rejected order and its items.
///
/// Returns `false` when the order exists but is not rejected.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no order has `id`, or [`DbError::Sqlx`]
/// if the delete fails.
pub async fn delete_order(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = 'rejected'")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 1 {
        return Ok(true);
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(false)
    } else {
        Err(DbError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_row(status: &str, order_type: &str) -> OrderRow {
        OrderRow {
            id: 1,
            customer_id: 7,
            customer_first_name: "Rami".to_owned(),
            customer_last_name: "Haddad".to_owned(),
            customer_email: "rami@example.com".to_owned(),
            customer_mobile: "70123456".to_owned(),
            order_type: order_type.to_owned(),
            custom_message: None,
            total_usd: Decimal::from(10),
            total_lbp: Decimal::from(900_000),
            status: status.to_owned(),
            notes: None,
            rejection_reason: None,
            delivery_applied: false,
            delivery_fee_lbp: Decimal::ZERO,
            delivery_address: None,
            delivery_phone: None,
            delivery_preferred_time: None,
            is_delivery_assigned: false,
            is_email_sent: false,
            is_whatsapp_sent: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn parses_stored_enums() {
        let row = order_row("out_for_delivery", "custom");
        assert_eq!(row.status().unwrap(), OrderStatus::OutForDelivery);
        assert_eq!(row.order_type().unwrap(), OrderType::Custom);
        assert_eq!(row.customer_name(), "Rami Haddad");
    }

    #[test]
    fn unknown_status_is_invalid_data() {
        let row = order_row("shipped", "product");
        assert!(matches!(row.status(), Err(DbError::InvalidData(_))));
    }
}
