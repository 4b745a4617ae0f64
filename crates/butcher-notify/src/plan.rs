use butcher_core::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Confirmation,
    Rejection,
}

/// Which messages to send after an order enters a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationPlan {
    pub email: Option<EmailKind>,
    pub whatsapp: bool,
}

impl NotificationPlan {
    /// Decide the notifications for a move from `previous` to `next`.
    ///
    /// Nothing is sent when the status did not change. Confirmation email and
    /// WhatsApp are each sent once per order, tracked by the stored flags.
    #[must_use]
    pub fn for_transition(
        previous: OrderStatus,
        next: OrderStatus,
        email_sent: bool,
        whatsapp_sent: bool,
    ) -> Self {
        if previous == next {
            return Self::default();
        }
        match next {
            OrderStatus::Confirmed => Self {
                email: (!email_sent).then_some(EmailKind::Confirmation),
                whatsapp: !whatsapp_sent,
            },
            OrderStatus::Rejected => Self {
                email: Some(EmailKind::Rejection),
                whatsapp: true,
            },
            OrderStatus::Ready | OrderStatus::OutForDelivery | OrderStatus::Completed => Self {
                email: None,
                whatsapp: true,
            },
            OrderStatus::Pending => Self::default(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && !self.whatsapp
    }
}
