use chrono::{DateTime, Utc};
use credit_common::Amount;

use crate::{db_types::OrderId, traits::GatewayError};

/// The store's own view of an order, which takes precedence over the webhook payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthoritativeOrder {
    pub name: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub currency: Option<String>,
    pub subtotal: Option<Amount>,
    pub total: Option<Amount>,
    /// The raw display status, e.g. `PAID`
    pub financial_status: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    /// Order metafields in the reward namespace, as (key, value) pairs
    pub metafields: Vec<(String, String)>,
    pub custom_attributes: Vec<(String, String)>,
}

impl AuthoritativeOrder {
    pub fn metafield(&self, key: &str) -> Option<&str> {
        self.metafields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn custom_attribute(&self, key: &str) -> Option<&str> {
        self.custom_attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[allow(async_fn_in_trait)]
pub trait OrderSource: Clone {
    /// `Ok(None)` means the store does not know the order. Transport failures are errors, so that the caller can
    /// ask for the delivery to be retried.
    async fn fetch_order(&self, shop_id: &str, order_id: &OrderId) -> Result<Option<AuthoritativeOrder>, GatewayError>;
}

/// An [`OrderSource`] that never knows anything. Ingestion falls back to the webhook payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOrderSource;

impl OrderSource for NoOrderSource {
    async fn fetch_order(&self, _: &str, _: &OrderId) -> Result<Option<AuthoritativeOrder>, GatewayError> {
        Ok(None)
    }
}
