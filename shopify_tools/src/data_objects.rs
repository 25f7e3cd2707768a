use chrono::{DateTime, Utc};
use credit_common::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoneyV2 {
    pub amount: Amount,
    pub currency_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoneyBag {
    pub shop_money: MoneyV2,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerRef {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

/// The authoritative view of an order, as returned by the `order(id:)` query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub subtotal_price_set: Option<MoneyBag>,
    #[serde(default)]
    pub total_price_set: Option<MoneyBag>,
    #[serde(default)]
    pub display_financial_status: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metafields: Connection<KeyValue>,
    #[serde(default)]
    pub custom_attributes: Vec<KeyValue>,
}

impl OrderDetails {
    pub fn metafield(&self, key: &str) -> Option<&str> {
        self.metafields.edges.iter().find(|e| e.node.key == key).and_then(|e| e.node.value.as_deref())
    }

    pub fn custom_attribute(&self, key: &str) -> Option<&str> {
        self.custom_attributes.iter().find(|a| a.key == key).and_then(|a| a.value.as_deref())
    }

    pub fn subtotal(&self) -> Option<Amount> {
        self.subtotal_price_set.as_ref().map(|m| m.shop_money.amount)
    }

    pub fn total(&self) -> Option<Amount> {
        self.total_price_set.as_ref().map(|m| m.shop_money.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreCreditTransaction {
    pub id: String,
    #[serde(default)]
    pub amount: Option<MoneyV2>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GiftCard {
    pub id: String,
    #[serde(default)]
    pub code_masked: Option<String>,
    #[serde(default)]
    pub balance: Option<MoneyV2>,
}

#[derive(Debug, Clone)]
pub struct GiftCardRequest {
    pub initial_value: Amount,
    pub currency: String,
    pub customer_email: String,
    pub note: String,
    /// Passed through to Shopify so that a replayed request never creates a second card.
    pub idempotency_key: String,
}
