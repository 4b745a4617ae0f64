//! Customer-facing message bodies for order status changes.

use butcher_core::{Currency, OrderStatus};
use rust_decimal::Decimal;

/// The order facts every template interpolates.
#[derive(Debug, Clone)]
pub struct OrderSummary<'a> {
    pub order_id: i64,
    pub customer_name: &'a str,
    pub total_usd: Decimal,
    pub total_lbp: Decimal,
    pub delivery_applied: bool,
    pub rejection_reason: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
}

const NO_REASON: &str = "No reason provided by the admin.";

fn usd(amount: Decimal) -> String {
    format!("${} USD", amount.normalize())
}

fn lbp(amount: Decimal) -> String {
    Currency::Lbp.format_amount(amount)
}

fn totals_block(order: &OrderSummary<'_>, show_delivery: bool) -> String {
    let mut block = format!(
        "💰 *Total Amount:*\n• {}\n• {}",
        usd(order.total_usd),
        lbp(order.total_lbp)
    );
    if show_delivery && order.delivery_applied {
        block.push_str("\n• Delivery fee included");
    }
    block
}

/// WhatsApp text for an order entering `status`.
#[must_use]
pub fn whatsapp_status_message(status: OrderStatus, order: &OrderSummary<'_>) -> String {
    let name = order.customer_name;
    let id = order.order_id;

    match status {
        OrderStatus::Confirmed => format!(
            "🍖 *Order Confirmed!* 🍖\n\n\
             Hello {name}!\n\n\
             Your order #{id} has been confirmed and is being prepared.\n\n\
             {totals}\n\n\
             ⏰ We'll notify you when your order is ready for pickup.\n\n\
             Thank you for choosing our butcher shop! 🥩",
            totals = totals_block(order, true),
        ),
        OrderStatus::Ready => format!(
            "✅ *Order Ready for Pickup!* ✅\n\n\
             Hello {name}!\n\n\
             Your order #{id} is ready for pickup.\n\n\
             {totals}\n\n\
             📍 Please come to our shop to collect your order.\n\n\
             Thank you for your patience! 🥩",
            totals = totals_block(order, true),
        ),
        OrderStatus::OutForDelivery => format!(
            "🚚 *Out for Delivery!* 🚚\n\n\
             Hello {name}!\n\n\
             Your order #{id} is now out for delivery and on its way to you.\n\n\
             {totals}\n\n\
             📱 Our delivery person will contact you shortly.\n\n\
             Thank you for choosing our butcher shop! 🥩",
            totals = totals_block(order, false),
        ),
        OrderStatus::Completed => format!(
            "🎉 *Order Delivered!* 🎉\n\n\
             Hello {name}!\n\n\
             Your order #{id} has been successfully delivered.\n\n\
             {totals}\n\n\
             We hope you enjoy your fresh meat! Please rate our service.\n\n\
             Thank you for choosing our butcher shop! 🥩",
            totals = totals_block(order, false),
        ),
        OrderStatus::Rejected => format!(
            "❌ *Order Rejected!* ❌\n\n\
             Hello {name}!\n\n\
             Unfortunately, your order #{id} has been rejected.\n\n\
             Reason: {reason}\n\n\
             {totals}\n\n\
             We apologize for any inconvenience. Please contact us for more details.",
            reason = order.rejection_reason.unwrap_or(NO_REASON),
            totals = totals_block(order, true),
        ),
        OrderStatus::Pending => format!("Order #{id} status updated to: {status}"),
    }
}

/// Escape text for interpolation into HTML element content or attributes.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[must_use]
pub fn confirmation_email(order: &OrderSummary<'_>) -> EmailMessage {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #333;">Order Confirmed!</h2>
  <p>Dear {name},</p>
  <p>Your order has been confirmed and is being prepared.</p>
  <div style="background-color: #f5f5f5; padding: 20px; border-radius: 4px; margin: 20px 0;">
    <h3>Order Details:</h3>
    <p><strong>Order ID:</strong> {id}</p>
    <p><strong>Total Amount:</strong> {usd} / {lbp}</p>
    <p><strong>Status:</strong> {status}</p>
  </div>
  <p>We'll notify you when your order is ready for pickup.</p>
  <p>Thank you for choosing our butcher shop!</p>
</div>"#,
        name = escape_html(order.customer_name),
        id = order.order_id,
        usd = usd(order.total_usd),
        lbp = lbp(order.total_lbp),
        status = OrderStatus::Confirmed,
    );

    EmailMessage {
        subject: "Order Confirmation - Butcher Shop".to_owned(),
        html,
    }
}

#[must_use]
pub fn rejection_email(order: &OrderSummary<'_>) -> EmailMessage {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #dc2626;">Order Rejected!</h2>
  <p>Dear {name},</p>
  <p>Unfortunately, your order <strong>#{id}</strong> has been rejected.</p>
  <div style="background-color: #fef2f2; padding: 20px; border-radius: 4px; margin: 20px 0; border: 1px solid #fecaca;">
    <h3>Rejection Details:</h3>
    <p><strong>Order ID:</strong> {id}</p>
    <p><strong>Reason:</strong> {reason}</p>
    <p><strong>Total Amount:</strong> {usd} / {lbp}</p>
  </div>
  <p>We apologize for any inconvenience. Please contact us for more details.</p>
  <p>Thank you for your understanding.</p>
</div>"#,
        name = escape_html(order.customer_name),
        id = order.order_id,
        reason = escape_html(order.rejection_reason.unwrap_or(NO_REASON)),
        usd = usd(order.total_usd),
        lbp = lbp(order.total_lbp),
    );

    EmailMessage {
        subject: "Order Rejected - Butcher Shop".to_owned(),
        html,
    }
}
