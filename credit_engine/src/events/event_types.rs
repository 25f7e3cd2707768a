use chrono::{DateTime, Utc};
use credit_common::Amount;
use serde::Serialize;

use crate::db_types::{CreditMode, OrderId, OrphanRecord};

/// Raised once per orphaned (shop, order): the first time an order is seen for a shop that is not active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanOrderEvent {
    pub shop_id: String,
    pub order_id: String,
    pub topic: String,
    pub delivery_id: String,
    pub first_seen_at: DateTime<Utc>,
}

impl OrphanOrderEvent {
    pub fn new(record: &OrphanRecord, topic: &str) -> Self {
        Self {
            shop_id: record.shop_id.clone(),
            order_id: record.order_id.clone(),
            topic: topic.to_string(),
            delivery_id: record.first_delivery_id.clone(),
            first_seen_at: record.first_seen_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditIssuedEvent {
    pub shop_id: String,
    pub order_id: OrderId,
    pub amount: Amount,
    pub currency: String,
    pub mode: CreditMode,
    pub external_ref: String,
}
