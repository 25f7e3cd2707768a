//! Parsing of inbound Shopify webhook deliveries.
//!
//! A delivery is turned into a [`WebhookEvent`] in one step: the topic header selects the variant, and the order
//! identity is extracted while the event is built. An event that exists therefore always carries a canonical
//! [`OrderId`](crate::db_types::OrderId). Everything else about the payload is read lazily, through `Option`-returning
//! accessors on [`OrderPayload`].
mod identity;
mod payload;
mod topics;

pub use identity::{best_effort_order_id, order_identity};
pub use payload::OrderPayload;
use serde_json::Value;
use thiserror::Error;
pub use topics::WebhookTopic;

use crate::db_types::IdentityError;

#[derive(Debug, Clone, Error)]
pub enum WebhookParseError {
    #[error("The webhook body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
    OrderCreated(OrderPayload),
    OrderPaid(OrderPayload),
    OrderUpdated(OrderPayload),
    OrderCancelled(OrderPayload),
    RefundCreated(OrderPayload),
    /// A topic this service does not act on. The delivery is acknowledged and dropped.
    Ignored(String),
}

impl WebhookEvent {
    pub fn parse(topic: &WebhookTopic, body: &[u8]) -> Result<Self, WebhookParseError> {
        if let WebhookTopic::Other(name) = topic {
            return Ok(Self::Ignored(name.clone()));
        }
        let raw = serde_json::from_slice::<Value>(body).map_err(|e| WebhookParseError::InvalidJson(e.to_string()))?;
        Self::from_value(topic, raw)
    }

    pub fn from_value(topic: &WebhookTopic, raw: Value) -> Result<Self, WebhookParseError> {
        let wrap = |raw: Value| -> Result<OrderPayload, WebhookParseError> {
            let order_id = order_identity(topic, &raw)?;
            Ok(OrderPayload::new(order_id, raw))
        };
        let event = match topic {
            WebhookTopic::OrdersCreate => Self::OrderCreated(wrap(raw)?),
            WebhookTopic::OrdersPaid => Self::OrderPaid(wrap(raw)?),
            WebhookTopic::OrdersUpdated => Self::OrderUpdated(wrap(raw)?),
            WebhookTopic::OrdersCancelled => Self::OrderCancelled(wrap(raw)?),
            WebhookTopic::RefundsCreate => Self::RefundCreated(wrap(raw)?),
            WebhookTopic::Other(name) => Self::Ignored(name.clone()),
        };
        Ok(event)
    }

    pub fn payload(&self) -> Option<&OrderPayload> {
        match self {
            Self::OrderCreated(p)
            | Self::OrderPaid(p)
            | Self::OrderUpdated(p)
            | Self::OrderCancelled(p)
            | Self::RefundCreated(p) => Some(p),
            Self::Ignored(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_paid_event() {
        let body = br##"{"id": 1001, "admin_graphql_api_id": "gid://shopify/Order/1001", "name": "#1001"}"##;
        let event = WebhookEvent::parse(&WebhookTopic::OrdersPaid, body).unwrap();
        let WebhookEvent::OrderPaid(p) = event else { panic!("expected a paid event") };
        assert_eq!(p.order_id().as_str(), "1001");
        assert_eq!(p.name().as_deref(), Some("#1001"));
    }

    #[test]
    fn unknown_topics_are_ignored_without_parsing() {
        let topic = WebhookTopic::from("products/update");
        let event = WebhookEvent::parse(&topic, b"not json").unwrap();
        assert!(matches!(event, WebhookEvent::Ignored(t) if t == "products/update"));
    }

    #[test]
    fn missing_identity_is_fatal() {
        let err = WebhookEvent::parse(&WebhookTopic::OrdersCreate, br##"{"name": "#1"}"##).unwrap_err();
        assert!(matches!(err, WebhookParseError::Identity(IdentityError::Missing)));
        let err = WebhookEvent::parse(&WebhookTopic::OrdersCreate, b"{").unwrap_err();
        assert!(matches!(err, WebhookParseError::InvalidJson(_)));
    }
}
