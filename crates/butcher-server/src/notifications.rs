//! Customer notifications after an admin changes an order's status.
//!
//! Delivery runs on a background task so the status update never waits on
//! SMTP or Twilio, and a failed send never fails the update.

use std::sync::Arc;

use butcher_core::OrderStatus;
use butcher_db::OrderRow;
use butcher_notify::{
    confirmation_email, rejection_email, whatsapp_status_message, EmailKind, NotificationPlan,
    Notifier, OrderSummary,
};
use sqlx::PgPool;
use tokio::task::JoinHandle;

/// What actually went out for one status change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DeliveryReport {
    pub email_sent: bool,
    pub whatsapp_sent: bool,
}

pub(crate) fn spawn_status_notifications(
    pool: PgPool,
    notifier: Arc<dyn Notifier>,
    order: OrderRow,
    status: OrderStatus,
    plan: NotificationPlan,
) -> JoinHandle<DeliveryReport> {
    tokio::spawn(async move {
        deliver_status_notifications(&pool, notifier.as_ref(), &order, status, plan).await
    })
}

/// Sends what `plan` asks for and records the once-only confirmation flags.
pub(crate) async fn deliver_status_notifications(
    pool: &PgPool,
    notifier: &dyn Notifier,
    order: &OrderRow,
    status: OrderStatus,
    plan: NotificationPlan,
) -> DeliveryReport {
    let customer_name = order.customer_name();
    let summary = OrderSummary {
        order_id: order.id,
        customer_name: &customer_name,
        total_usd: order.total_usd,
        total_lbp: order.total_lbp,
        delivery_applied: order.delivery_applied,
        rejection_reason: order.rejection_reason.as_deref(),
    };
    let mut report = DeliveryReport::default();

    if let Some(kind) = plan.email {
        let message = match kind {
            EmailKind::Confirmation => confirmation_email(&summary),
            EmailKind::Rejection => rejection_email(&summary),
        };
        match notifier.send_email(&order.customer_email, &message).await {
            Ok(()) => {
                report.email_sent = true;
                if kind == EmailKind::Confirmation {
                    if let Err(e) = butcher_db::mark_email_sent(pool, order.id).await {
                        tracing::error!(order_id = order.id, error = %e, "failed to flag email as sent");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(order_id = order.id, ?kind, error = %e, "order email not sent");
            }
        }
    }

    if plan.whatsapp {
        let body = whatsapp_status_message(status, &summary);
        match notifier.send_whatsapp(&order.customer_mobile, &body).await {
            Ok(delivery) => {
                report.whatsapp_sent = true;
                tracing::debug!(order_id = order.id, ?delivery, "order WhatsApp delivered");
                if status == OrderStatus::Confirmed {
                    if let Err(e) = butcher_db::mark_whatsapp_sent(pool, order.id).await {
                        tracing::error!(order_id = order.id, error = %e, "failed to flag WhatsApp as sent");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(order_id = order.id, %status, error = %e, "order WhatsApp not sent");
            }
        }
    }

    tracing::info!(
        order_id = order.id,
        %status,
        email_sent = report.email_sent,
        whatsapp_sent = report.whatsapp_sent,
        "status notifications processed"
    );
    report
}
