use std::fmt::Display;

/// Webhook topics, accepted in either the REST form (`orders/paid`) or the GraphQL enum form (`ORDERS_PAID`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WebhookTopic {
    OrdersCreate,
    OrdersPaid,
    OrdersUpdated,
    OrdersCancelled,
    RefundsCreate,
    Other(String),
}

impl WebhookTopic {
    pub fn as_str(&self) -> &str {
        match self {
            Self::OrdersCreate => "orders/create",
            Self::OrdersPaid => "orders/paid",
            Self::OrdersUpdated => "orders/updated",
            Self::OrdersCancelled => "orders/cancelled",
            Self::RefundsCreate => "refunds/create",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn is_refund(&self) -> bool {
        matches!(self, Self::RefundsCreate)
    }
}

impl From<&str> for WebhookTopic {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "/");
        match normalized.as_str() {
            "orders/create" => Self::OrdersCreate,
            "orders/paid" => Self::OrdersPaid,
            "orders/updated" => Self::OrdersUpdated,
            "orders/cancelled" => Self::OrdersCancelled,
            "refunds/create" => Self::RefundsCreate,
            _ => Self::Other(value.trim().to_string()),
        }
    }
}

impl Display for WebhookTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
